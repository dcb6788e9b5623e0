//! Managed runtime value heap (spec.md section 4.5): refcounted allocation
//! with cycle collection and generational frame scoping, sitting between
//! the lowerer's flat bytecode (`fble-bc`) and the interpreter that walks
//! it.

mod cycle;
mod heap;
mod value;

pub use heap::Heap;
pub use value::{Executable, NativeDestructor, NativeOutcome, Value, ValueId};
