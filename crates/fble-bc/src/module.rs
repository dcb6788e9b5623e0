//! A lowered module's bytecode, and the [`PreloadedModule`] descriptor used
//! to plug pre-compiled modules into the core without re-parsing (spec.md
//! section 3.7). This lives here rather than in `fble-loader` specifically to
//! avoid a circular dependency: a preloaded module's `executable` is bytecode,
//! and `fble-loader` has no reason to depend on `fble-bc`.

use std::rc::Rc;

use fble_common::{ModulePath, Name};

use crate::instr::CodeBlock;

/// An entry point into executable code: either this core's own bytecode
/// interpreter running a [`CodeBlock`], or (for ahead-of-time compiled /
/// builtin modules) an opaque native run callback over the interpreter's
/// own value type `V`. Consuming the latter is in scope (spec.md's
/// Non-goals exclude *generating* AOT modules, not *running* them); no
/// native flavour is constructed by this crate, only the shape needed to
/// describe one. Generic over `V` so this crate need not depend on
/// `fble-heap` for its value representation.
#[derive(Clone)]
pub enum Executable<V> {
    Interpreted(Rc<CodeBlock>),
    Native(Rc<dyn Fn(&[V], &[V]) -> Result<V, String>>),
}

impl<V> std::fmt::Debug for Executable<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Executable::Interpreted(block) => f.debug_tuple("Interpreted").field(block).finish(),
            Executable::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// One module's lowered bytecode: its own top-level code block plus every
/// nested `FuncValue`'s block, flattened into one table and referenced by
/// index (spec.md section 4.4's `BlockRef`).
#[derive(Debug, Clone)]
pub struct Module {
    pub path: ModulePath,
    pub deps: Vec<ModulePath>,
    pub blocks: Vec<CodeBlock>,
    /// One name per block in `blocks`, in the same order, for profiler
    /// reports (spec.md section 3.7's `profile_blocks`).
    pub profile_blocks: Vec<Name>,
}

/// A data-only value plugging a pre-compiled module into the core without
/// re-parsing it (spec.md section 3.7).
#[derive(Debug, Clone)]
pub struct PreloadedModule<V> {
    pub path: ModulePath,
    /// Topologically ordered: every dependency appears before any module
    /// that depends on it.
    pub deps: Vec<Rc<PreloadedModule<V>>>,
    pub executable: Executable<V>,
    pub profile_blocks: Vec<Name>,
}
