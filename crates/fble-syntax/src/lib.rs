//! Untyped AST and parser for Fble source files (spec.md section 4.2).
//!
//! Produces an [`Expr`] tree straight from tokens -- there is no lossless
//! concrete syntax tree stage, since nothing downstream of the checker
//! needs one back.

pub mod ast;
pub mod error;
pub mod parser;

pub use ast::{DataKind, Expr, ExprKind, FuncArg, LetBinding, SelectChoice};
pub use error::ParseError;
pub use parser::{parse_module, ParsedModule, Parser};
