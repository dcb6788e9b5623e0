//! The bytecode format itself (spec.md section 3.5): a flat, register-based
//! instruction set with one [`CodeBlock`] per function or module body. No SSA,
//! no basic-block graph structure -- `Instr::Jump` offsets and `UnionSelect`
//! targets are plain instruction-index jumps into the same flat `Vec<Instr>`.

use serde::Serialize;

use fble_common::Loc;

/// A local register index within a [`CodeBlock`]'s `locals` array. Function
/// arguments live at the front of this same index space (registers
/// `0..num_args`), exactly mirroring [`fble_common::VarIndex`]'s own
/// numbering -- the Checker never distinguishes "argument" from "local"
/// (spec.md section 4.4's register allocation strategy: "function args
/// first, then let-bound locals, then temporaries").
pub type Local = u32;

/// A static (captured) register index within a `Frame`'s `statics` slice.
pub type Static = u32;

/// Where one instruction operand's value comes from. Mirrors
/// [`fble_common::VarSource`] one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Src {
    Local(Local),
    Static(Static),
}

/// Index of a [`CodeBlock`] within a [`Module`]'s flat `blocks` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockRef(pub u32);

/// One bytecode instruction. Most read their source operands, compute, and
/// write `dst`; see spec.md section 4.6.2 for execution semantics.
#[derive(Debug, Clone, Serialize)]
pub enum Instr {
    /// Copy a value into a fresh (or existing) local -- used for plain `Var`
    /// references and to materialize `Src::Static`/`Src::Arg` reads into a
    /// local before they can be used as another instruction's operand.
    Copy { dst: Local, src: Src },
    /// Construct a struct value from its already-lowered field locals.
    StructValue { dst: Local, fields: Vec<Src> },
    /// Construct a union value with a known tag.
    UnionValue { dst: Local, tag: u32, arg: Src },
    /// Read a struct field by tag index. Never fails for well-typed programs.
    StructAccess { dst: Local, obj: Src, tag: u32, loc: Loc },
    /// Read a union's payload, checking the stored tag matches. Raises
    /// `UndefinedUnionAccess` at `loc` on mismatch (spec.md section 4.6.2).
    UnionAccess { dst: Local, obj: Src, tag: u32, loc: Loc },
    /// Branch on a union's tag. `targets[i]` is the instruction index to jump
    /// to for tag `i`; every tag has an explicit target (the lowerer resolves
    /// `default` branches by repeating the default's target for each
    /// unhandled tag, so the interpreter never needs to special-case it).
    UnionSelect { condition: Src, targets: Vec<u32> },
    /// Unconditional jump, relative to the instruction after this one (spec.md
    /// section 3.5: "relative PC jump (signed)").
    Jump { offset: i32 },
    /// Build a closure value over `code`, capturing the given locals/statics
    /// as the new function's statics array, in declared order.
    FuncValue { dst: Local, code: BlockRef, captures: Vec<Src> },
    /// Call a function value. `tail == true` rewrites the current frame in
    /// place instead of pushing a new one (spec.md section 4.6.2).
    Call { dst: Local, func: Src, args: Vec<Src>, tail: bool, loc: Loc },
    /// Allocate an undefined `Ref` cell (the `let rec` fixpoint).
    Ref { dst: Local },
    /// Install a `Ref` cell's value. One-shot; later `RefDef`s on the same
    /// cell are a lowerer bug, never reachable from well-formed `Tc`.
    RefDef { r: Local, value: Src },
    /// Return a value from the current block, popping the frame.
    Return { src: Src },
    /// Produce the canonical erased "type witness" value (spec.md section
    /// 3.6): the runtime representation of a first-class type value, once
    /// kind/type information has been erased by the checker.
    Type { dst: Local },
    /// Release a local's reference early. The local must not be read again;
    /// the lowerer only emits this once a `Tc` subtree's last use is known.
    Release { src: Local },
    /// Build a list value: a right-folded cons/nil union chain over the
    /// already-lowered element locals (tag 0 `cons{head,tail}`, tag 1
    /// `nil{}`, the convention every Fble list-shaped type follows). The
    /// Checker wraps the enclosing `Tc::FuncApply` around this so the
    /// surface `List` expression's constructor function runs exactly once,
    /// over the whole chain -- this instruction only ever builds its
    /// argument.
    List { dst: Local, elements: Vec<Src> },
    /// Build a literal value: the same cons/nil chain as `List`, over a
    /// union value per tag index rather than over already-lowered element
    /// locals.
    Literal { dst: Local, tags: Vec<u32> },
    /// Allocate a linked port pair sharing a one-slot FIFO (spec.md section
    /// 4.6.3): `get` reads it, `put` writes it. Inlined into the enclosing
    /// block rather than a separate call, matching `Tc::Link`'s checking
    /// rule of pushing `get`/`put` as plain locals with no new function
    /// frame. Not part of spec.md section 3.5's instruction table (that
    /// table is introduced as "selected lowering rules", not exhaustive);
    /// grounded in section 4.6.3's port semantics, which has no other home.
    Link { get: Local, put: Local },
    /// Profiling hooks (spec.md section 4.7): entering a block, a tail call
    /// replacing the current block on the call stack, and leaving a block.
    ProfileEnter { block_id: u32 },
    ProfileReplace { block_id: u32 },
    ProfileExit,
}

/// One function or module body's worth of bytecode (spec.md section 3.5).
#[derive(Debug, Clone, Serialize)]
pub struct CodeBlock {
    pub num_args: u32,
    pub num_statics: u32,
    pub num_locals: u32,
    pub profile_block_id: u32,
    pub instructions: Vec<Instr>,
}

impl CodeBlock {
    pub fn new(num_args: u32, num_statics: u32, profile_block_id: u32) -> Self {
        CodeBlock {
            num_args,
            num_statics,
            num_locals: 0,
            profile_block_id,
            instructions: Vec::new(),
        }
    }
}
