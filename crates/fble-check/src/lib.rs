//! Checker: single-pass kind+type checking over the AST (spec.md section
//! 4.3), producing a [`Tc`] typed tree per module with every name already
//! resolved to a [`fble_common::VarIndex`].

pub mod error;
pub mod infer;
pub mod scope;
pub mod tc;

pub use error::CheckError;
pub use infer::{check_program, CheckOutput, CheckWarning, CheckedModule};
pub use scope::{LocalStats, Scope, VarName};
pub use tc::{Binding, Choice, Tc};
