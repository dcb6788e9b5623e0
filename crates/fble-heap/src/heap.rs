//! [`Heap`]: the managed store for every runtime [`Value`] (spec.md section
//! 4.5). Owns allocation, the retain/release/add_ref refcounting contract,
//! the value constructors and field readers (section 4.5.5), and the
//! generational frame-stack scoping API (section 4.5.3). Cycle collection
//! itself lives in `cycle.rs`.
//!
//! Grounded structurally on `fble-types/src/heap.rs`'s `TypeHeap` (a `Vec`
//! arena indexed by a newtype handle, `&self`/`&mut self` split the same
//! way), generalized from a whole-program bump arena with no-op
//! retain/release to a real single-counter refcounted heap: spec.md section
//! 3.6 gives every value header exactly one refcount field (no separate
//! external/internal counters), so `retain` and `add_ref` both increment
//! that same counter here -- the distinction the spec draws between them is
//! about *who* bumps it (an outside caller vs. a value's own constructor
//! wiring up a child edge), not a second counter to maintain.

use rustc_hash::FxHashMap;

use crate::value::{NativeDestructor, Value, ValueId};
use std::any::Any;

struct Slot {
    /// `None` once freed; the slot is then eligible for reuse via
    /// `free_list`.
    data: Option<Value>,
    refcount: u32,
}

/// The managed runtime value heap (spec.md section 4.5). One `Heap` per
/// interpreter; two heaps never share values (spec.md section 5).
pub struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    /// Every `ValueId` allocated, in order, since the heap (or the
    /// innermost open frame) started -- `pop_frame` uses this to know
    /// exactly which allocations belong to the frame it is closing.
    alloc_log: Vec<ValueId>,
    /// Stack of marks into `alloc_log`, one per open `push_frame` (spec.md
    /// section 4.5.3).
    frame_marks: Vec<usize>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            slots: Vec::new(),
            free_list: Vec::new(),
            alloc_log: Vec::new(),
            frame_marks: Vec::new(),
        }
    }

    fn alloc(&mut self, data: Value) -> ValueId {
        let id = if let Some(reused) = self.free_list.pop() {
            self.slots[reused as usize] = Slot { data: Some(data), refcount: 1 };
            ValueId(reused)
        } else {
            let id = ValueId(self.slots.len() as u32);
            self.slots.push(Slot { data: Some(data), refcount: 1 });
            id
        };
        self.alloc_log.push(id);
        id
    }

    fn slot(&self, id: ValueId) -> &Slot {
        self.slots[id.0 as usize]
            .data
            .as_ref()
            .expect("use of a freed ValueId");
        &self.slots[id.0 as usize]
    }

    pub fn get(&self, id: ValueId) -> &Value {
        self.slots[id.0 as usize]
            .data
            .as_ref()
            .expect("use of a freed ValueId")
    }

    pub(crate) fn children_of(&self, id: ValueId) -> Vec<ValueId> {
        match &self.slots[id.0 as usize].data {
            Some(v) => v.children(),
            None => Vec::new(),
        }
    }

    pub(crate) fn is_container(&self, id: ValueId) -> bool {
        match &self.slots[id.0 as usize].data {
            Some(v) => v.is_container(),
            None => false,
        }
    }

    pub(crate) fn refcount(&self, id: ValueId) -> u32 {
        self.slot(id).refcount
    }

    pub(crate) fn take_data(&mut self, id: ValueId) -> Option<Value> {
        self.slots[id.0 as usize].data.take()
    }

    pub(crate) fn decrement(&mut self, id: ValueId) -> u32 {
        let slot = &mut self.slots[id.0 as usize];
        slot.refcount = slot.refcount.saturating_sub(1);
        slot.refcount
    }

    pub(crate) fn recycle(&mut self, id: ValueId) {
        self.free_list.push(id.0);
    }

    // ---- spec.md section 4.5.1: ownership ----

    /// Bump a value's refcount on behalf of an external (outside-the-heap)
    /// holder -- a new local variable, a captured closure static, a return
    /// value bubbling up a call.
    pub fn retain(&mut self, id: ValueId) -> ValueId {
        self.slots[id.0 as usize].refcount += 1;
        id
    }

    /// Register an internal edge from `src` to `dst`. `src` is unused here
    /// (the edge itself is recorded in `src`'s `Value::children()`, not in
    /// `Heap` bookkeeping) -- kept as a parameter so call sites read the
    /// same as spec.md section 4.5.1's `add_ref(src, dst)` and so a reader
    /// can tell an internal-edge bump apart from an external `retain` at the
    /// call site, even though both increment the one refcount.
    pub fn add_ref(&mut self, _src: ValueId, dst: ValueId) {
        self.slots[dst.0 as usize].refcount += 1;
    }

    /// Drop a reference. Frees immediately (iteratively, never recursively
    /// -- spec.md section 4.5.2's "chunked worklist") once the refcount
    /// reaches zero; otherwise, if `id` can hold edges to other values,
    /// attempts a cycle collection scan rooted at it, since dropping this
    /// reference may have orphaned a cycle it was keeping alive from
    /// outside (spec.md section 4.5.2: "triggered at each release of a
    /// potentially-cyclic parent").
    pub fn release(&mut self, id: ValueId) {
        let remaining = self.decrement(id);
        if remaining == 0 {
            self.free_cascade(id);
        } else if self.is_container(id) {
            self.collect_cycle(id);
        }
    }

    // ---- spec.md section 4.5.5: value constructors ----

    pub fn new_struct(&mut self, fields: Vec<ValueId>) -> ValueId {
        for &f in &fields {
            self.retain(f);
        }
        self.alloc(Value::Struct(fields))
    }

    pub fn new_union(&mut self, tagwidth: u32, tag: u32, arg: ValueId) -> ValueId {
        debug_assert!(tag < (1u32 << tagwidth), "tag must fit tagwidth (spec.md section 3.6)");
        self.retain(arg);
        self.alloc(Value::Union { tagwidth, tag, arg })
    }

    /// Shorthand for [`Self::new_union`] over a shared unit struct -- used
    /// for nullary tags (e.g. an enum's `true`/`false`).
    pub fn new_enum(&mut self, tagwidth: u32, tag: u32) -> ValueId {
        let unit = self.alloc(Value::Struct(Vec::new()));
        self.new_union(tagwidth, tag, unit)
    }

    pub fn new_func(&mut self, executable: crate::value::Executable, profile_block_id: u32, statics: Vec<ValueId>) -> ValueId {
        for &s in &statics {
            self.retain(s);
        }
        self.alloc(Value::Func { executable, profile_block_id, statics })
    }

    pub fn new_native(&mut self, data: Box<dyn Any>, on_free: Option<NativeDestructor>) -> ValueId {
        self.alloc(Value::Native { data, on_free })
    }

    pub fn new_ref(&mut self) -> ValueId {
        self.alloc(Value::Ref(None))
    }

    /// Install a `Ref` cell's value. One-shot: installing twice is a
    /// lowerer bug (spec.md section 3.5's `RefDef`), never reachable from
    /// well-formed bytecode, so this panics rather than returning a
    /// recoverable error.
    pub fn ref_define(&mut self, r: ValueId, value: ValueId) {
        self.retain(value);
        let slot = self.slots[r.0 as usize]
            .data
            .as_mut()
            .expect("use of a freed ValueId");
        match slot {
            Value::Ref(cell @ None) => *cell = Some(value),
            Value::Ref(Some(_)) => panic!("RefDef on an already-defined Ref"),
            _ => panic!("ref_define called on a non-Ref value"),
        }
    }

    // ---- spec.md section 4.5.5: readers ----

    pub fn struct_field(&self, v: ValueId, i: u32) -> ValueId {
        match self.get(v) {
            Value::Struct(fields) => fields[i as usize],
            _ => panic!("struct_field called on a non-Struct value"),
        }
    }

    pub fn union_tag(&self, v: ValueId) -> u32 {
        match self.get(v) {
            Value::Union { tag, .. } => *tag,
            _ => panic!("union_tag called on a non-Union value"),
        }
    }

    pub fn union_arg(&self, v: ValueId) -> ValueId {
        match self.get(v) {
            Value::Union { arg, .. } => *arg,
            _ => panic!("union_arg called on a non-Union value"),
        }
    }

    pub fn native_data(&self, v: ValueId) -> &dyn Any {
        match self.get(v) {
            Value::Native { data, .. } => data.as_ref(),
            _ => panic!("native_data called on a non-Native value"),
        }
    }

    /// Transparently resolve through a `Ref` cell (spec.md section 4.6.2:
    /// "Reading a `Ref` transparently yields its stored value"). Returns
    /// `None` for an undefined `Ref` -- the caller raises
    /// `UndefinedRefRead` with whatever `Loc` it has in hand.
    pub fn deref(&self, v: ValueId) -> Option<ValueId> {
        match self.get(v) {
            Value::Ref(cell) => *cell,
            _ => Some(v),
        }
    }

    // ---- spec.md section 4.5.3: frame stack ----

    pub fn push_frame(&mut self) {
        self.frame_marks.push(self.alloc_log.len());
    }

    /// Close the innermost open frame: every value allocated since the
    /// matching `push_frame` is released, except whatever is reachable
    /// (through internal edges) from `retain_value` -- which survives into
    /// the surrounding frame untouched (spec.md section 4.5.3: "promoted").
    /// `retain_value` itself is not a fresh allocation this call owns; the
    /// caller already holds whatever reference it needs to it.
    pub fn pop_frame(&mut self, retain_value: Option<ValueId>) {
        let mark = self
            .frame_marks
            .pop()
            .expect("pop_frame called without a matching push_frame");
        let allocated: Vec<ValueId> = self.alloc_log.split_off(mark);

        let mut keep: FxHashMap<ValueId, ()> = FxHashMap::default();
        if let Some(root) = retain_value {
            let mut stack = vec![root];
            while let Some(v) = stack.pop() {
                if keep.insert(v, ()).is_some() {
                    continue;
                }
                stack.extend(self.children_of(v));
            }
        }

        for v in allocated {
            if !keep.contains_key(&v) && self.slots[v.0 as usize].data.is_some() {
                self.release(v);
            }
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
