//! Shared types used by every stage of the Fble pipeline: source locations,
//! names and module paths, kinds, and the `VarIndex` contract between the
//! Checker and the Lowerer.

pub mod kind;
pub mod loc;
pub mod name;
pub mod var_index;

pub use kind::Kind;
pub use loc::{format_diagnostic, Loc, Severity};
pub use name::{ModulePath, Name, NameSpace};
pub use var_index::{VarIndex, VarSource};
