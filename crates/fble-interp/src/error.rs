//! Runtime errors the interpreter can raise (spec.md section 7's bottom
//! three rows): the only two *dynamic* failures a well-typed program can
//! still hit at run time, plus a native call's own reported failure and the
//! interpreter's own "nobody can unblock this" terminal case.
//!
//! Grounded on `fble-check::error::CheckError`'s shape (a `Loc` plus a
//! message, rendered through the one shared [`fble_common::format_diagnostic`]
//! so every stage's errors share spec.md section 7's exact wire format).

use std::fmt;

use fble_common::{format_diagnostic, Loc, Severity};

#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// A `UnionAccess` found a different tag stored than the one it asked
    /// for (spec.md section 4.6.2).
    UndefinedUnionAccess { expected: u32, actual: u32, loc: Loc },
    /// A `Ref` cell was read before `RefDef` installed its value (spec.md
    /// section 3.6/4.6.2: a `let rec` fixpoint that was forced too early).
    UndefinedRefRead { loc: Loc },
    /// A native callback (port get/put, or any other native `Executable`)
    /// reported failure.
    Native { message: String, loc: Loc },
    /// The program blocked on a port and the host had no way to make
    /// further progress (spec.md section 4.6.3's "yields to host IO
    /// callback" has nowhere left to yield to). Not one of spec.md section
    /// 7's named kinds -- a process front end with a live IO loop would
    /// never see this, only a harness (like `fblec`) that runs a program
    /// with no IO driver wired up at all.
    Deadlock,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (loc, message) = match self {
            RuntimeError::UndefinedUnionAccess { expected, actual, loc } => {
                (loc.clone(), format!("undefined union access: expected tag {expected} but found {actual}"))
            }
            RuntimeError::UndefinedRefRead { loc } => {
                (loc.clone(), "undefined ref read: recursive value forced before it was defined".to_string())
            }
            RuntimeError::Native { message, loc } => (loc.clone(), message.clone()),
            RuntimeError::Deadlock => (Loc::synthetic(), "process blocked with no I/O driver able to make progress".to_string()),
        };
        write!(f, "{}", format_diagnostic(&loc, Severity::Error, &message))
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn undefined_union_access_matches_pinned_format() {
        let loc = Loc::new(Rc::from("Foo.fble"), 4, 2);
        let err = RuntimeError::UndefinedUnionAccess { expected: 0, actual: 1, loc: loc.clone() };
        assert_eq!(err.to_string(), format!("{loc}: error: undefined union access: expected tag 0 but found 1\n"));
    }
}
