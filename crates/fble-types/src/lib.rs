//! Type representation and `TypeHeap` for the Fble checker (spec.md
//! section 3.3).

pub mod heap;
pub mod ty;

pub use heap::{TypeHeap, TypeHeapError};
pub use ty::{DataKind, TypeData, TypeId, VarKey};
