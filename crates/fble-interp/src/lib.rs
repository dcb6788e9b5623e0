//! Bytecode interpreter and process/port runtime (spec.md section 4.6):
//! the layer that actually runs a [`fble_bc::Module`]'s lowered bytecode
//! against a [`fble_heap::Heap`], plus the linking glue that turns a
//! dependency-ordered list of modules into one evaluated program (spec.md
//! section 4.1's load order feeding straight into execution).

mod error;
mod frame;
mod interp;
mod process;

pub use error::RuntimeError;
pub use interp::Interpreter;
pub use process::{NoIo, ProcessIo};

use std::rc::Rc;

use fble_bc::{CodeBlock, Module};
use fble_common::ModulePath;
use fble_heap::{Executable, Heap, ValueId};
use fble_profile::ProfileThread;
use rustc_hash::FxHashMap;

/// Build the zero-static closure value over a module's own top-level block
/// (spec.md section 4.4: a module's block takes its dependencies' values as
/// plain call arguments, `num_args == deps.len()`, never as captured
/// statics -- there is nothing to capture until the module is actually
/// called).
pub fn link_module(heap: &mut Heap, module: &Module) -> ValueId {
    let table: Rc<Vec<Rc<CodeBlock>>> = Rc::new(module.blocks.iter().cloned().map(Rc::new).collect());
    let entry = Rc::clone(&table[0]);
    let profile_block_id = entry.profile_block_id;
    heap.new_func(Executable::Interpreted { block: entry, table }, profile_block_id, Vec::new())
}

/// Run every module in `modules` (already in dependency order, leaf-first
/// -- spec.md section 4.1), feeding each module's already-computed
/// dependency values in as its call arguments, and return the root
/// module's (the last one's) result.
pub fn eval_program(
    heap: &mut Heap,
    mut profile: Option<&mut ProfileThread>,
    io: &mut dyn ProcessIo,
    modules: &[Module],
) -> Result<ValueId, RuntimeError> {
    let mut results: FxHashMap<ModulePath, ValueId> = FxHashMap::default();
    let mut interp = Interpreter::new();
    let mut last = None;

    for module in modules {
        let func = link_module(heap, module);
        let dep_values: Vec<ValueId> = module.deps.iter().map(|d| results[d]).collect();
        let result = interp.run(heap, profile.as_deref_mut(), io, func, dep_values)?;
        results.insert(module.path.clone(), result);
        last = Some(result);
    }

    Ok(last.expect("eval_program requires at least one module"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fble_bc::{Instr, Src};
    use fble_common::{Name, NameSpace};

    fn leaf_module() -> Module {
        let mut block = CodeBlock::new(0, 0, 0);
        block.num_locals = 1;
        block.instructions = vec![Instr::StructValue { dst: 0, fields: Vec::new() }, Instr::Return { src: Src::Local(0) }];
        Module {
            path: ModulePath::new(vec![Name::new("Leaf%", NameSpace::Normal, fble_common::Loc::synthetic())]),
            deps: Vec::new(),
            blocks: vec![block],
            profile_blocks: vec![Name::new("<root>", NameSpace::Normal, fble_common::Loc::synthetic())],
        }
    }

    fn main_module(leaf: &ModulePath) -> Module {
        // Main's top-level block takes the already-evaluated Leaf value as
        // its sole argument and returns it unchanged.
        let mut block = CodeBlock::new(1, 0, 0);
        block.num_locals = 1;
        block.instructions = vec![Instr::Return { src: Src::Local(0) }];
        Module {
            path: ModulePath::new(vec![Name::new("Main%", NameSpace::Normal, fble_common::Loc::synthetic())]),
            deps: vec![leaf.clone()],
            blocks: vec![block],
            profile_blocks: vec![Name::new("<root>", NameSpace::Normal, fble_common::Loc::synthetic())],
        }
    }

    #[test]
    fn eval_program_threads_dependency_values_into_the_root_module() {
        let mut heap = Heap::new();
        let leaf = leaf_module();
        let main = main_module(&leaf.path);
        let modules = vec![leaf, main];

        let result = eval_program(&mut heap, None, &mut NoIo, &modules).unwrap();
        match heap.get(result) {
            fble_heap::Value::Struct(fields) => assert!(fields.is_empty()),
            _ => panic!("expected a struct"),
        }
    }
}
