use std::fmt;
use std::rc::Rc;

/// A source location: the file it came from plus a 1-based line/column.
///
/// Attached to every AST node, every `Tc` node, and every error. Cloning a
/// `Loc` is cheap -- `source` is an `Rc<str>` shared by every location in the
/// same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Loc {
    pub source: Rc<str>,
    pub line: u32,
    pub col: u32,
}

impl Loc {
    pub fn new(source: Rc<str>, line: u32, col: u32) -> Self {
        Self { source, line, col }
    }

    /// A location used for synthetic nodes that have no real source position
    /// (e.g. builtin intrinsics). Never produced by the lexer.
    pub fn synthetic() -> Self {
        Self {
            source: Rc::from("<synthetic>"),
            line: 0,
            col: 0,
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.col)
    }
}

/// Severity of a reported diagnostic. Both share the same message shape
/// (spec.md section 7): `<source>:<line>:<col>: <severity>: <text>\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Render a diagnostic message in the pinned core format. Every error type
/// in the core formats itself through this helper so the textual contract
/// in spec.md section 7 has exactly one implementation (spec.md section 9
/// notes two near-duplicate formatters existed upstream; the port keeps one).
pub fn format_diagnostic(loc: &Loc, severity: Severity, text: &str) -> String {
    format!("{loc}: {severity}: {text}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_pinned_format() {
        let loc = Loc::new(Rc::from("foo.fble"), 3, 7);
        assert_eq!(loc.to_string(), "foo.fble:3:7");
    }

    #[test]
    fn format_diagnostic_matches_spec_shape() {
        let loc = Loc::new(Rc::from("foo.fble"), 1, 1);
        let msg = format_diagnostic(&loc, Severity::Error, "expected expression");
        assert_eq!(msg, "foo.fble:1:1: error: expected expression\n");
    }

    #[test]
    fn warning_shape() {
        let loc = Loc::new(Rc::from("foo.fble"), 2, 4);
        let msg = format_diagnostic(&loc, Severity::Warning, "unused variable 'x'");
        assert_eq!(msg, "foo.fble:2:4: warning: unused variable 'x'\n");
    }
}
