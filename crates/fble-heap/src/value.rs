//! Runtime value representation (spec.md section 3.6): the tagged variants
//! every heap-managed object can be, plus the handle type ([`ValueId`]) used
//! to name one.
//!
//! Grounded on `fble-types/src/ty.rs`'s `TypeId`/`TypeData` split (a `Copy`
//! handle into an arena, plus the data it names as a separate enum) --
//! generalized from compile-time types to run-time values, and from a
//! bump arena to a real refcounted, freeable one (see `heap.rs`).

use std::any::Any;
use std::rc::Rc;

use fble_bc::CodeBlock;

use crate::heap::Heap;

/// A handle into a [`crate::heap::Heap`]'s value table. Cheap to copy;
/// stays valid until the value it names is freed (retain/release discipline
/// is the caller's job, same as `fble-types`'s `TypeId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub(crate) u32);

/// What a native call produced. Distinct from a plain `Result<Value, _>`
/// because a port's `get`/`put` native (spec.md section 4.6.3) is the one
/// native call that can legitimately decline to produce a value at all --
/// "blocks if empty"/"blocks if full" is not a failure, it is "come back
/// later once the host IO callback has made progress".
pub enum NativeOutcome {
    /// A freshly-built value the caller must allocate (by dispatching to
    /// the matching `Heap::new_*` constructor for whichever variant this
    /// is, since only `Heap` itself can mint a fresh [`ValueId`]).
    Value(Value),
    /// A value that already lives in the heap under its own `ValueId` --
    /// a port's `get` handing back whatever `put` stored, unchanged. No
    /// fresh allocation, no extra retain: ownership transfers from
    /// wherever it was held (here, the port's one-slot cell) to the call's
    /// result, the same way reading a struct field aliases rather than
    /// copies (spec.md section 4.5.1).
    Existing(ValueId),
    Blocked,
}

/// An entry point into executable code bound into a [`Value::Func`]: either
/// this crate's own bytecode interpreter running a [`CodeBlock`], or an
/// opaque native callback (spec.md section 3.6: "`Func` supports both
/// interpreted... and preloaded/native-run flavours via the `Executable`
/// indirection"). Natives receive the heap (so they can allocate their
/// result) alongside their args and captured statics.
///
/// `Interpreted` carries the whole module's block table alongside the one
/// block this closure runs, not just a bare `Rc<CodeBlock>`: a nested
/// `Instr::FuncValue` inside `block` names its own callee by `BlockRef`, an
/// index into that same per-module table (spec.md section 4.4), so building
/// *that* closure later needs the table back, however many calls removed
/// this `Value::Func` is from the module's own top-level block.
#[derive(Clone)]
pub enum Executable {
    Interpreted {
        block: Rc<CodeBlock>,
        table: Rc<Vec<Rc<CodeBlock>>>,
    },
    Native(Rc<dyn Fn(&mut Heap, &[ValueId], &[ValueId]) -> Result<NativeOutcome, String>>),
}

impl std::fmt::Debug for Executable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Executable::Interpreted { block, .. } => f.debug_tuple("Interpreted").field(block).finish(),
            Executable::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// A native value's one-shot destructor, run exactly once when the value's
/// refcount reaches zero (spec.md section 4.5.4).
pub type NativeDestructor = Box<dyn FnOnce(Box<dyn Any>)>;

/// The shape stored at a [`ValueId`] slot (spec.md section 3.6's value-kind
/// table). One variant per runtime tag; every `ValueId` field is an internal
/// edge the owning [`crate::heap::Heap`] tracks for cycle collection.
pub enum Value {
    /// `fieldc` is implicit in `fields.len()`.
    Struct(Vec<ValueId>),
    Union {
        tagwidth: u32,
        tag: u32,
        arg: ValueId,
    },
    Func {
        executable: Executable,
        /// The block this closure runs, for profiler attribution -- `0` for
        /// a native executable with no bytecode block of its own.
        profile_block_id: u32,
        statics: Vec<ValueId>,
    },
    /// Opaque host data (SDL windows, file handles, OS state) plus an
    /// optional one-shot destructor (spec.md section 4.5.4). No movement is
    /// permitted while any reference exists -- enforced here simply by
    /// never exposing a way to relocate a `Native`'s payload.
    Native {
        data: Box<dyn Any>,
        on_free: Option<NativeDestructor>,
    },
    /// A single mutable cell used for `let rec` fixpoints (spec.md section
    /// 3.6). `None` until `ref_define` installs a value; reading an
    /// undefined `Ref` is the `UndefinedRefRead` runtime error (spec.md
    /// section 7), never a type-check bug the checker could have caught --
    /// Fble's checker accepts `let rec` groups structurally and leaves
    /// genuine fixpoint non-termination to run time.
    Ref(Option<ValueId>),
}

impl Value {
    /// Whether this value can hold edges to other values, and therefore
    /// needs to participate in cycle collection (spec.md section 4.5.2).
    /// `Native` carries no `ValueId` children, so it can never be part of a
    /// reference cycle.
    pub fn is_container(&self) -> bool {
        !matches!(self, Value::Native { .. })
    }

    /// The internal edges this value directly holds, in a fixed order
    /// (field/capture order; `Ref`'s single slot last). Used by both the
    /// cycle collector's DFS and the iterative free cascade.
    pub fn children(&self) -> Vec<ValueId> {
        match self {
            Value::Struct(fields) => fields.clone(),
            Value::Union { arg, .. } => vec![*arg],
            Value::Func { statics, .. } => statics.clone(),
            Value::Native { .. } => Vec::new(),
            Value::Ref(slot) => slot.iter().copied().collect(),
        }
    }
}
