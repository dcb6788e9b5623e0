//! The bytecode interpreter itself (spec.md section 4.6): a frame stack plus
//! a fetch/dispatch loop over [`Instr`].
//!
//! Grounded on `snow-rt/src/actor/scheduler.rs`'s single-stepping dispatch
//! loop (one instruction per `step`, looping until a return empties the
//! call stack), generalized from the scheduler's OS-thread-per-actor model
//! to one `Vec<Frame>` per program run, since spec.md section 5's process
//! model is cooperative and single-threaded rather than preemptively
//! scheduled.

use std::rc::Rc;

use fble_bc::{Instr, Local, Src};
use fble_common::Loc;
use fble_heap::{Executable, Heap, NativeOutcome, Value, ValueId};
use fble_profile::ProfileThread;

use crate::error::RuntimeError;
use crate::frame::Frame;
use crate::process::{self, ProcessIo};

/// Tag conventions for the cons/nil chain `List`/`Literal` build (spec.md
/// section 3.5's `Instr::List`/`Instr::Literal` doc comment): `cons{head,
/// tail}` is tag 0, `nil{}` is tag 1, and the chain's own union is always a
/// two-tag union regardless of how wide the element type's real union is.
const CONS_TAG: u32 = 0;
const NIL_TAG: u32 = 1;
const LIST_TAGWIDTH: u32 = 1;

/// Placeholder tagwidth used for `Instr::UnionValue` and for `Literal`'s
/// per-character union (spec.md section 3.6 gives every union a `tagwidth`,
/// but `Instr::UnionValue`/`Literal` carry no such field -- the lowerer
/// erases kind/type information before bytecode, and threading the real
/// tagwidth through would mean widening the instruction format solely to
/// satisfy `Heap::new_union`'s own debug assertion). 31 comfortably covers
/// any union this core can express without tripping `1u32 << tagwidth`.
const GENERIC_TAGWIDTH: u32 = 31;

/// The bytecode interpreter's call-frame stack (spec.md section 4.6.1). One
/// per program run; `run` drives it to completion (or a runtime error).
pub struct Interpreter {
    frames: Vec<Frame>,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter { frames: Vec::new() }
    }

    /// Call `func` with `args` and run it to completion, including every
    /// nested non-tail call it makes, stepping instruction by instruction
    /// until the entry call itself returns. `func` must be an interpreted
    /// closure (every module's top-level value is; this is never a native
    /// at the entry point).
    pub fn run(
        &mut self,
        heap: &mut Heap,
        mut profile: Option<&mut ProfileThread>,
        io: &mut dyn ProcessIo,
        func: ValueId,
        args: Vec<ValueId>,
    ) -> Result<ValueId, RuntimeError> {
        self.frames.clear();
        let resolved = resolve(heap, func, &Loc::synthetic())?;
        let (executable, _profile_block_id, statics) = match heap.get(resolved) {
            Value::Func { executable, profile_block_id, statics } => (executable.clone(), *profile_block_id, statics.clone()),
            _ => panic!("Interpreter::run called on a non-Func value"),
        };
        let (block, table) = match executable {
            Executable::Interpreted { block, table } => (block, table),
            Executable::Native(_) => panic!("Interpreter::run requires an interpreted entry point"),
        };

        heap.push_frame();
        self.frames.push(Frame::new(block, table, statics, args, None));

        loop {
            if let Some(result) = self.step(heap, profile.as_deref_mut(), io)? {
                return Ok(result);
            }
        }
    }

    /// Execute exactly one instruction at the top frame's program counter.
    /// Returns `Some(value)` only once the whole frame stack has drained
    /// (the entry call finally returned); otherwise `None`, meaning "keep
    /// stepping".
    fn step(
        &mut self,
        heap: &mut Heap,
        mut profile: Option<&mut ProfileThread>,
        io: &mut dyn ProcessIo,
    ) -> Result<Option<ValueId>, RuntimeError> {
        let top = self.frames.len() - 1;
        let pc = self.frames[top].pc;
        let instr = self.frames[top].code.instructions[pc].clone();
        self.frames[top].pc = pc + 1;

        match instr {
            Instr::Copy { dst, src } => {
                let v = self.frames[top].read(src);
                self.frames[top].write(dst, v);
            }
            Instr::StructValue { dst, fields } => {
                let ids: Vec<ValueId> = fields.iter().map(|s| self.frames[top].read(*s)).collect();
                let v = heap.new_struct(ids);
                self.frames[top].write(dst, v);
            }
            Instr::UnionValue { dst, tag, arg } => {
                let a = self.frames[top].read(arg);
                let v = heap.new_union(GENERIC_TAGWIDTH, tag, a);
                self.frames[top].write(dst, v);
            }
            Instr::StructAccess { dst, obj, tag, loc } => {
                let raw = self.frames[top].read(obj);
                let resolved = resolve(heap, raw, &loc)?;
                let v = heap.struct_field(resolved, tag);
                self.frames[top].write(dst, v);
            }
            Instr::UnionAccess { dst, obj, tag, loc } => {
                let raw = self.frames[top].read(obj);
                let resolved = resolve(heap, raw, &loc)?;
                let actual = heap.union_tag(resolved);
                if actual != tag {
                    return Err(RuntimeError::UndefinedUnionAccess { expected: tag, actual, loc });
                }
                let v = heap.union_arg(resolved);
                self.frames[top].write(dst, v);
            }
            Instr::UnionSelect { condition, targets } => {
                let cond = self.frames[top].read(condition);
                let tag = heap.union_tag(cond);
                self.frames[top].pc = targets[tag as usize] as usize;
            }
            Instr::Jump { offset } => {
                let base = self.frames[top].pc as i64;
                self.frames[top].pc = (base + offset as i64) as usize;
            }
            Instr::FuncValue { dst, code, captures } => {
                let capture_ids: Vec<ValueId> = captures.iter().map(|s| self.frames[top].read(*s)).collect();
                let block = self.frames[top].block_for(code);
                let table = Rc::clone(&self.frames[top].blocks);
                let profile_block_id = block.profile_block_id;
                let v = heap.new_func(Executable::Interpreted { block, table }, profile_block_id, capture_ids);
                self.frames[top].write(dst, v);
            }
            Instr::Call { dst, func, args, tail, loc } => {
                self.dispatch_call(heap, profile.as_deref_mut(), io, top, dst, func, &args, tail, &loc)?;
            }
            Instr::Ref { dst } => {
                let v = heap.new_ref();
                self.frames[top].write(dst, v);
            }
            Instr::RefDef { r, value } => {
                let r_id = self.frames[top].read(Src::Local(r));
                let v = self.frames[top].read(value);
                heap.ref_define(r_id, v);
            }
            Instr::Return { src } => {
                let value = self.frames[top].read(src);
                heap.pop_frame(Some(value));
                let finished = self.frames.pop().expect("step only runs on a live top frame");
                match self.frames.last_mut() {
                    Some(caller) => {
                        if let Some(dst) = finished.return_dst {
                            caller.write(dst, value);
                        }
                    }
                    None => return Ok(Some(value)),
                }
            }
            Instr::Type { dst } => {
                let v = heap.new_struct(Vec::new());
                self.frames[top].write(dst, v);
            }
            Instr::Release { src } => {
                let v = self.frames[top].read(Src::Local(src));
                heap.release(v);
            }
            Instr::List { dst, elements } => {
                let elems: Vec<ValueId> = elements.iter().map(|s| self.frames[top].read(*s)).collect();
                let v = build_cons_chain(heap, &elems);
                self.frames[top].write(dst, v);
            }
            Instr::Literal { dst, tags } => {
                let v = build_literal_chain(heap, &tags);
                self.frames[top].write(dst, v);
            }
            Instr::Link { get, put } => {
                let (g, p) = process::new_port_pair(heap);
                self.frames[top].write(get, g);
                self.frames[top].write(put, p);
            }
            Instr::ProfileEnter { block_id } => {
                if let Some(p) = profile.as_deref_mut() {
                    p.enter_block(block_id);
                }
            }
            Instr::ProfileReplace { block_id } => {
                if let Some(p) = profile.as_deref_mut() {
                    p.replace_block(block_id);
                }
            }
            Instr::ProfileExit => {
                if let Some(p) = profile.as_deref_mut() {
                    p.exit_block();
                }
            }
        }
        Ok(None)
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_call(
        &mut self,
        heap: &mut Heap,
        mut profile: Option<&mut ProfileThread>,
        io: &mut dyn ProcessIo,
        top: usize,
        dst: Local,
        func: Src,
        args: &[Src],
        tail: bool,
        loc: &Loc,
    ) -> Result<(), RuntimeError> {
        let func_raw = self.frames[top].read(func);
        let arg_ids: Vec<ValueId> = args.iter().map(|s| self.frames[top].read(*s)).collect();
        let resolved = resolve(heap, func_raw, loc)?;
        let (executable, callee_block_id, statics) = match heap.get(resolved) {
            Value::Func { executable, profile_block_id, statics } => (executable.clone(), *profile_block_id, statics.clone()),
            _ => panic!("Call target is not a Func value"),
        };

        match executable {
            Executable::Native(f) => {
                let value = call_native_blocking(&f, heap, &arg_ids, &statics, io, loc)?;
                self.frames[top].write(dst, value);
            }
            Executable::Interpreted { block, table } => {
                if tail {
                    if let Some(p) = profile.as_deref_mut() {
                        p.replace_block(callee_block_id);
                    }
                    self.frames[top].replace(block, table, statics, arg_ids);
                    // Skip the callee's own leading `ProfileEnter`: we just
                    // accounted for entering it via `replace_block` above.
                    self.frames[top].pc = 1;
                } else {
                    heap.push_frame();
                    self.frames.push(Frame::new(block, table, statics, arg_ids, Some(dst)));
                }
            }
        }
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Transparently resolve through a `Ref` cell (spec.md section 4.6.2).
/// Loops in case a `let rec` chain forwards through more than one cell;
/// terminates as soon as `deref` reports a non-`Ref` (or the same id back).
fn resolve(heap: &Heap, mut id: ValueId, loc: &Loc) -> Result<ValueId, RuntimeError> {
    loop {
        match heap.deref(id) {
            Some(v) if v == id => return Ok(v),
            Some(v) => id = v,
            None => return Err(RuntimeError::UndefinedRefRead { loc: loc.clone() }),
        }
    }
}

#[allow(clippy::type_complexity)]
fn call_native_blocking(
    f: &Rc<dyn Fn(&mut Heap, &[ValueId], &[ValueId]) -> Result<NativeOutcome, String>>,
    heap: &mut Heap,
    args: &[ValueId],
    statics: &[ValueId],
    io: &mut dyn ProcessIo,
    loc: &Loc,
) -> Result<ValueId, RuntimeError> {
    loop {
        let outcome = f(heap, args, statics).map_err(|message| RuntimeError::Native { message, loc: loc.clone() })?;
        match outcome {
            NativeOutcome::Existing(id) => return Ok(id),
            NativeOutcome::Value(v) => return Ok(alloc_native_value(heap, v)),
            NativeOutcome::Blocked => {
                if !io.poll() {
                    return Err(RuntimeError::Deadlock);
                }
            }
        }
    }
}

/// Dispatch a freshly-built [`Value`] to whichever `Heap` constructor mints
/// its `ValueId`, since only `Heap` itself can allocate a slot.
fn alloc_native_value(heap: &mut Heap, v: Value) -> ValueId {
    match v {
        Value::Struct(fields) => heap.new_struct(fields),
        Value::Union { tagwidth, tag, arg } => heap.new_union(tagwidth, tag, arg),
        Value::Func { executable, profile_block_id, statics } => heap.new_func(executable, profile_block_id, statics),
        Value::Native { data, on_free } => heap.new_native(data, on_free),
        Value::Ref(_) => panic!("a native call must not produce a bare Ref value"),
    }
}

/// Build a right-folded cons/nil chain over already-lowered element values
/// (spec.md section 3.5's `Instr::List`). Each intermediate `pair`/`acc`
/// link is retained once by its parent, then released here once that
/// parent ownership is established, so the finished chain carries exactly
/// one refcount per link, owned by `dst`.
fn build_cons_chain(heap: &mut Heap, elems: &[ValueId]) -> ValueId {
    let mut acc = heap.new_enum(LIST_TAGWIDTH, NIL_TAG);
    for &elem in elems.iter().rev() {
        let pair = heap.new_struct(vec![elem, acc]);
        let next = heap.new_union(LIST_TAGWIDTH, CONS_TAG, pair);
        heap.release(acc);
        heap.release(pair);
        acc = next;
    }
    acc
}

/// Build the same cons/nil chain as [`build_cons_chain`], but over a fresh
/// per-character union value for each tag (spec.md section 3.5's
/// `Instr::Literal`).
fn build_literal_chain(heap: &mut Heap, tags: &[u32]) -> ValueId {
    let mut acc = heap.new_enum(LIST_TAGWIDTH, NIL_TAG);
    for &tag in tags.iter().rev() {
        let ch = heap.new_enum(GENERIC_TAGWIDTH, tag);
        let pair = heap.new_struct(vec![ch, acc]);
        let next = heap.new_union(LIST_TAGWIDTH, CONS_TAG, pair);
        heap.release(ch);
        heap.release(acc);
        heap.release(pair);
        acc = next;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::NoIo;
    use fble_bc::CodeBlock;
    use fble_common::Loc;

    /// Build a block the way the real lowerer would: a leading
    /// `ProfileEnter` (matching every real `CodeBlock`'s shape) followed by
    /// the instructions under test. A tail `Call` skips straight to index 1
    /// to avoid re-entering profiling for the block it replaces, so any
    /// hand-built block a tail call can land on must carry this leading
    /// instruction too.
    fn block(num_args: u32, num_locals: u32, instrs: Vec<Instr>) -> Rc<CodeBlock> {
        let mut b = CodeBlock::new(num_args, 0, 0);
        b.num_locals = num_locals;
        b.instructions = std::iter::once(Instr::ProfileEnter { block_id: 0 }).chain(instrs).collect();
        Rc::new(b)
    }

    fn entry_func(heap: &mut Heap, instrs: Vec<Instr>, num_args: u32, num_locals: u32) -> ValueId {
        let blk = block(num_args, num_locals, instrs);
        let table = Rc::new(vec![Rc::clone(&blk)]);
        heap.new_func(Executable::Interpreted { block: blk, table }, 0, Vec::new())
    }

    #[test]
    fn evaluates_a_unit_struct() {
        let mut heap = Heap::new();
        let func = entry_func(
            &mut heap,
            vec![Instr::StructValue { dst: 0, fields: Vec::new() }, Instr::Return { src: Src::Local(0) }],
            0,
            1,
        );
        let mut interp = Interpreter::new();
        let result = interp.run(&mut heap, None, &mut NoIo, func, Vec::new()).unwrap();
        match heap.get(result) {
            Value::Struct(fields) => assert!(fields.is_empty()),
            _ => panic!("expected a struct"),
        }
    }

    #[test]
    fn union_access_mismatch_is_a_runtime_error() {
        let mut heap = Heap::new();
        // locals: 0 = arg (a tag-0 union), 1 = wrong-tag access attempt.
        let loc = Loc::new(Rc::from("t.fble"), 1, 1);
        let func = entry_func(
            &mut heap,
            vec![
                Instr::UnionAccess { dst: 1, obj: Src::Local(0), tag: 1, loc: loc.clone() },
                Instr::Return { src: Src::Local(1) },
            ],
            1,
            2,
        );
        let unit = heap.new_struct(Vec::new());
        let arg = heap.new_union(2, 0, unit);
        let mut interp = Interpreter::new();
        let err = interp.run(&mut heap, None, &mut NoIo, func, vec![arg]).unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedUnionAccess { expected: 1, actual: 0, .. }));
    }

    #[test]
    fn tail_call_rewrites_the_frame_instead_of_pushing_a_new_one() {
        let mut heap = Heap::new();
        let loc = Loc::synthetic();

        // callee(n) { return n; }
        let callee_block = block(1, 1, vec![Instr::Return { src: Src::Local(0) }]);
        let callee_table = Rc::new(vec![Rc::clone(&callee_block)]);
        let callee = heap.new_func(Executable::Interpreted { block: callee_block, table: callee_table }, 0, Vec::new());

        // caller(n) { return callee(n); } -- a tail call, captured as a static.
        let caller_block = block(
            1,
            2,
            vec![Instr::Call { dst: 1, func: Src::Static(0), args: vec![Src::Local(0)], tail: true, loc }, Instr::Return { src: Src::Local(1) }],
        );
        let caller_table = Rc::new(vec![Rc::clone(&caller_block)]);
        let caller = heap.new_func(Executable::Interpreted { block: caller_block, table: caller_table }, 0, vec![callee]);

        let arg = heap.new_struct(Vec::new());
        let mut interp = Interpreter::new();
        let result = interp.run(&mut heap, None, &mut NoIo, caller, vec![arg]).unwrap();
        assert_eq!(result, arg);
    }

    #[test]
    fn list_instruction_builds_a_two_element_cons_chain() {
        let mut heap = Heap::new();
        let func = entry_func(
            &mut heap,
            vec![
                Instr::List { dst: 2, elements: vec![Src::Local(0), Src::Local(1)] },
                Instr::Return { src: Src::Local(2) },
            ],
            2,
            3,
        );
        let a = heap.new_struct(Vec::new());
        let b = heap.new_struct(Vec::new());
        let mut interp = Interpreter::new();
        let result = interp.run(&mut heap, None, &mut NoIo, func, vec![a, b]).unwrap();
        assert_eq!(heap.union_tag(result), CONS_TAG);
        let head = heap.struct_field(heap.union_arg(result), 0);
        assert_eq!(head, a);
        let tail = heap.struct_field(heap.union_arg(result), 1);
        assert_eq!(heap.union_tag(tail), CONS_TAG);
        let tail_head = heap.struct_field(heap.union_arg(tail), 0);
        assert_eq!(tail_head, b);
        let nil = heap.struct_field(heap.union_arg(tail), 1);
        assert_eq!(heap.union_tag(nil), NIL_TAG);
    }

    #[test]
    fn link_allocates_a_working_get_put_pair() {
        let mut heap = Heap::new();
        let func = entry_func(
            &mut heap,
            vec![
                Instr::Link { get: 0, put: 1 },
                Instr::StructValue { dst: 2, fields: vec![Src::Local(0), Src::Local(1)] },
                Instr::Return { src: Src::Local(2) },
            ],
            0,
            3,
        );
        let mut interp = Interpreter::new();
        let result = interp.run(&mut heap, None, &mut NoIo, func, Vec::new()).unwrap();
        let get = heap.struct_field(result, 0);
        match heap.get(get) {
            Value::Func { executable: Executable::Native(_), .. } => {}
            _ => panic!("expected a native get closure"),
        }
    }
}
