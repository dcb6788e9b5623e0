use std::fmt;

use fble_common::Loc;

/// A parse error. The parser has no error-recovery strategy (section 4.2):
/// the first syntax error aborts parsing of the module.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub loc: Loc,
    pub message: String,
}

impl ParseError {
    pub fn new(loc: Loc, message: impl Into<String>) -> Self {
        Self {
            loc,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            fble_common::format_diagnostic(&self.loc, fble_common::Severity::Error, &self.message)
        )
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn parse_error_display_matches_diagnostic_format() {
        let loc = Loc::new(Rc::from("Foo.fble"), 3, 5);
        let err = ParseError::new(loc, "expected ';'");
        assert_eq!(err.to_string(), "Foo.fble:3:5: error: expected ';'\n");
    }
}
