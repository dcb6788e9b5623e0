//! A single call's execution state: the [`CodeBlock`] it is running, its
//! register file, and where it is in that block (spec.md section 4.6.1).
//!
//! Grounded on `snow-rt/src/actor/stack.rs`'s per-actor call frame (a
//! code pointer, a local register file, a program counter), generalized
//! from a closure-captured environment to this core's two-part
//! locals/statics register split (spec.md section 4.4: "function args
//! first, then let-bound locals, then temporaries" in one array, captured
//! values in a separate `statics` array).

use std::rc::Rc;

use fble_bc::{CodeBlock, Local, Src, Static};
use fble_heap::ValueId;

/// One open call (spec.md section 4.6.1). Lives on the [`crate::interp::Interpreter`]'s
/// frame stack; a tail call rewrites one of these in place instead of
/// pushing a new one.
pub struct Frame {
    /// The whole module's block table, kept alongside `code` so a nested
    /// `Instr::FuncValue`'s `BlockRef` can be resolved however many calls
    /// removed this frame is from the module's own top-level block.
    pub blocks: Rc<Vec<Rc<CodeBlock>>>,
    pub code: Rc<CodeBlock>,
    /// Register file: `locals[0..num_args]` are the call's arguments,
    /// `locals[num_args..]` are let-bound locals and temporaries, filled in
    /// as instructions execute. `None` marks a register not yet written
    /// (reading one is a lowerer bug, never reachable from well-formed
    /// bytecode).
    locals: Vec<Option<ValueId>>,
    pub statics: Vec<ValueId>,
    pub pc: usize,
    /// Where this call's result should go once it returns into its
    /// caller's frame -- `None` for the outermost (entry-point) frame,
    /// whose result is the interpreter's own return value.
    pub return_dst: Option<Local>,
}

impl Frame {
    pub fn new(
        code: Rc<CodeBlock>,
        blocks: Rc<Vec<Rc<CodeBlock>>>,
        statics: Vec<ValueId>,
        args: Vec<ValueId>,
        return_dst: Option<Local>,
    ) -> Self {
        let mut locals = vec![None; code.num_locals as usize];
        for (i, arg) in args.into_iter().enumerate() {
            locals[i] = Some(arg);
        }
        Frame { blocks, code, locals, statics, pc: 0, return_dst }
    }

    /// Rewrite this frame in place for a tail call (spec.md section
    /// 4.6.2): same frame slot, new block/statics/args, `pc` reset to the
    /// callee's start. `return_dst` is unchanged -- a tail call's result
    /// still lands wherever the original (non-tail) call into this frame's
    /// chain was headed.
    pub fn replace(&mut self, code: Rc<CodeBlock>, blocks: Rc<Vec<Rc<CodeBlock>>>, statics: Vec<ValueId>, args: Vec<ValueId>) {
        let mut locals = vec![None; code.num_locals as usize];
        for (i, arg) in args.into_iter().enumerate() {
            locals[i] = Some(arg);
        }
        self.blocks = blocks;
        self.code = code;
        self.locals = locals;
        self.statics = statics;
        self.pc = 0;
    }

    pub fn read(&self, src: Src) -> ValueId {
        match src {
            Src::Local(i) => self.locals[i as usize].expect("read of an unset local"),
            Src::Static(i) => self.statics[i as usize],
        }
    }

    pub fn write(&mut self, dst: Local, value: ValueId) {
        self.locals[dst as usize] = Some(value);
    }

    pub fn block_for(&self, r: fble_bc::BlockRef) -> Rc<CodeBlock> {
        Rc::clone(&self.blocks[r.0 as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fble_bc::CodeBlock;
    use fble_heap::Heap;

    fn block(num_args: u32, num_locals: u32) -> Rc<CodeBlock> {
        let mut b = CodeBlock::new(num_args, 0, 0);
        b.num_locals = num_locals;
        Rc::new(b)
    }

    #[test]
    fn new_frame_prefills_args_into_the_front_locals() {
        let mut heap = Heap::new();
        let a = heap.new_struct(Vec::new());
        let b = heap.new_struct(Vec::new());
        let code = block(2, 4);
        let frame = Frame::new(code, Rc::new(Vec::new()), Vec::new(), vec![a, b], None);
        assert_eq!(frame.read(Src::Local(0)), a);
        assert_eq!(frame.read(Src::Local(1)), b);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut heap = Heap::new();
        let v = heap.new_struct(Vec::new());
        let code = block(0, 2);
        let mut frame = Frame::new(code, Rc::new(Vec::new()), Vec::new(), Vec::new(), None);
        frame.write(0, v);
        assert_eq!(frame.read(Src::Local(0)), v);
    }
}
