//! The two reclamation paths `Heap::release` can take (spec.md section
//! 4.5.2): an immediate, worklist-driven free cascade when a refcount hits
//! zero outright, and a DFS-based cycle collector for the case where a
//! container value's refcount is still positive but every remaining
//! reference turns out to originate from within its own reachable set.
//!
//! Both walks are iterative, never recursive -- a naive recursive free of a
//! million-deep acyclic chain would blow the native stack, and spec.md's
//! boundary tests call that out explicitly.

use rustc_hash::FxHashMap;

use crate::heap::Heap;
use crate::value::{Value, ValueId};

impl Heap {
    /// Free `root` and anything its refcount decrements bring to zero in
    /// turn, as a flat worklist rather than a call stack.
    pub(crate) fn free_cascade(&mut self, root: ValueId) {
        let mut worklist = vec![root];
        while let Some(id) = worklist.pop() {
            let Some(data) = self.take_data(id) else {
                // already freed -- can happen if the same child appears
                // under two different parents both hitting zero this pass.
                continue;
            };
            self.recycle(id);
            let children = data.children();
            run_native_destructor(data);
            for child in children {
                if self.decrement(child) == 0 {
                    worklist.push(child);
                }
            }
        }
    }

    /// `root` is a container whose refcount didn't reach zero on its own.
    /// Walk the set of values reachable from `root` through internal edges;
    /// if, for every member, the edges *within that set* account for its
    /// entire refcount, the whole set is an unreachable cycle and gets
    /// freed together. A single member with even one reference from outside
    /// the set keeps the whole set alive -- freeing part of a cycle while a
    /// live reference still expects its neighbours to exist would be
    /// unsound, so this is all-or-nothing.
    pub(crate) fn collect_cycle(&mut self, root: ValueId) {
        let mut members: FxHashMap<ValueId, ()> = FxHashMap::default();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if members.insert(id, ()).is_some() {
                continue;
            }
            order.push(id);
            for child in self.children_of(id) {
                if !members.contains_key(&child) {
                    stack.push(child);
                }
            }
        }

        let mut internal_incoming: FxHashMap<ValueId, u32> = FxHashMap::default();
        for &id in &order {
            for child in self.children_of(id) {
                if members.contains_key(&child) {
                    *internal_incoming.entry(child).or_insert(0) += 1;
                }
            }
        }

        let is_garbage = order.iter().all(|&id| {
            let internal = *internal_incoming.get(&id).unwrap_or(&0);
            self.refcount(id) <= internal
        });
        if !is_garbage {
            return;
        }

        for &id in &order {
            let data = self
                .take_data(id)
                .expect("cycle member vanished mid-collection");
            self.recycle(id);
            let children = data.children();
            run_native_destructor(data);
            // Edges leaving the garbage set still need a real release --
            // the neighbour outside the cycle may now itself be unreferenced,
            // or may be the root of a different cycle.
            for child in children {
                if !members.contains_key(&child) {
                    self.release(child);
                }
            }
        }
    }
}

fn run_native_destructor(data: Value) {
    if let Value::Native { data: payload, on_free: Some(destructor) } = data {
        destructor(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    #[test]
    fn acyclic_chain_of_a_million_is_freed_without_overflowing_the_stack() {
        let mut heap = Heap::new();
        let mut tail = heap.new_struct(Vec::new());
        for _ in 0..1_000_000 {
            tail = heap.new_struct(vec![tail]);
        }
        heap.release(tail);
    }

    #[test]
    fn a_two_cycle_is_reclaimed_only_once_the_last_external_reference_drops() {
        let mut heap = Heap::new();
        let a_ref = heap.new_ref();
        let b = heap.new_struct(vec![a_ref]);
        heap.ref_define(a_ref, b);
        // Each of `a_ref` and `b` now carries one internal edge from the
        // other plus one external reference from whoever originally
        // allocated it. Releasing just `a_ref`'s external holder leaves
        // `b` still externally referenced, so nothing should be freed yet.
        heap.release(a_ref);
        assert_eq!(heap.refcount(a_ref), 1);
        assert_eq!(heap.refcount(b), 2);
        // Releasing `b`'s external holder removes the last reference from
        // outside the pair -- both should be collected together now.
        heap.release(b);
    }
}
