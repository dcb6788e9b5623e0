//! Flat register bytecode (spec.md section 3.5): [`CodeBlock`]/[`Instr`],
//! the `Tc`-to-bytecode lowerer, and the [`PreloadedModule`] descriptor
//! (spec.md section 3.7) used to plug pre-compiled modules into the core.

pub mod instr;
pub mod lower;
pub mod module;

pub use instr::{BlockRef, CodeBlock, Instr, Local, Src, Static};
pub use lower::{lower_module, lower_program};
pub use module::{Executable, Module, PreloadedModule};
