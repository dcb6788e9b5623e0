use std::fmt;

use fble_common::Loc;

/// A type error. Like [`fble_syntax::error::ParseError`], the Checker has no
/// error-recovery strategy: the first ill-typed expression aborts checking
/// of the module.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckError {
    pub loc: Loc,
    pub message: String,
}

impl CheckError {
    pub fn new(loc: Loc, message: impl Into<String>) -> Self {
        Self {
            loc,
            message: message.into(),
        }
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            fble_common::format_diagnostic(&self.loc, fble_common::Severity::Error, &self.message)
        )
    }
}

impl std::error::Error for CheckError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn check_error_display_matches_diagnostic_format() {
        let loc = Loc::new(Rc::from("Foo.fble"), 3, 5);
        let err = CheckError::new(loc, "expected type Bool@, but found Unit@");
        assert_eq!(
            err.to_string(),
            "Foo.fble:3:5: error: expected type Bool@, but found Unit@\n"
        );
    }
}
