//! Typed-channel ports (spec.md section 4.6.3/section 5): a one-slot FIFO
//! shared between a `get` and a `put` native function value.
//!
//! Grounded on `snow-rt/src/actor/mailbox.rs`'s bounded-queue backpressure,
//! narrowed from an N-deep mailbox to the single slot spec.md section
//! 4.6.3 specifies: `put` blocks while the slot is occupied, `get` blocks
//! while it is empty, and neither ever loses or duplicates a value.

use std::cell::RefCell;
use std::rc::Rc;

use fble_heap::{Executable, Heap, NativeOutcome, ValueId};

/// Lets the interpreter hand control back to a host loop while a process is
/// blocked on a port (spec.md section 4.6.3: "yields to a host IO callback
/// until the port can make progress"). [`NoIo`] never makes progress,
/// matching a harness that runs a program with no external IO source at
/// all.
pub trait ProcessIo {
    /// Give the host one chance to unblock something (deliver external
    /// input, drain external output). Returns whether it did anything --
    /// `false` across every live port means the program has deadlocked.
    fn poll(&mut self) -> bool;
}

/// The "no host IO" driver: every blocked port stays blocked forever. Used
/// by `fblec` and by tests that only exercise in-process `Link` pairs.
pub struct NoIo;

impl ProcessIo for NoIo {
    fn poll(&mut self) -> bool {
        false
    }
}

type Slot = Rc<RefCell<Option<ValueId>>>;

/// Allocate a linked `get`/`put` pair over a fresh shared slot (spec.md
/// section 4.6.3's `Link`). Both are ordinary `Value::Func`s with a native
/// `Executable` -- from the interpreter's point of view a port is just
/// another callable value, never a distinct runtime kind.
pub fn new_port_pair(heap: &mut Heap) -> (ValueId, ValueId) {
    let slot: Slot = Rc::new(RefCell::new(None));

    let get_slot = Rc::clone(&slot);
    let get = Executable::Native(Rc::new(move |_heap: &mut Heap, _args: &[ValueId], _statics: &[ValueId]| {
        match get_slot.borrow_mut().take() {
            // Ownership transfers straight from the slot to the call's
            // result; `put` already retained it on the way in, so no
            // further retain is owed here (spec.md section 4.5.1).
            Some(v) => Ok(NativeOutcome::Existing(v)),
            None => Ok(NativeOutcome::Blocked),
        }
    }));

    let put_slot = Rc::clone(&slot);
    let put = Executable::Native(Rc::new(move |heap: &mut Heap, args: &[ValueId], _statics: &[ValueId]| {
        if put_slot.borrow().is_some() {
            return Ok(NativeOutcome::Blocked);
        }
        let value = args[0];
        heap.retain(value);
        *put_slot.borrow_mut() = Some(value);
        let unit = heap.new_struct(Vec::new());
        Ok(NativeOutcome::Existing(unit))
    }));

    let get_value = heap.new_func(get, 0, Vec::new());
    let put_value = heap.new_func(put, 0, Vec::new());
    (get_value, put_value)
}

/// Call a port's native `get` or `put` closure directly, without going
/// through the bytecode interpreter -- used by unit tests in this crate and
/// by `interp.rs`'s `Call` dispatch for native `Executable`s generally.
pub fn call_native(heap: &mut Heap, func: ValueId, args: &[ValueId]) -> Result<NativeOutcome, String> {
    match heap.get(func) {
        fble_heap::Value::Func { executable: Executable::Native(f), statics, .. } => {
            let f = Rc::clone(f);
            let statics = statics.clone();
            f(heap, args, &statics)
        }
        _ => panic!("call_native called on a non-native Func value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_blocks_on_an_empty_slot() {
        let mut heap = Heap::new();
        let (get, _put) = new_port_pair(&mut heap);
        let outcome = call_native(&mut heap, get, &[]).unwrap();
        assert!(matches!(outcome, NativeOutcome::Blocked));
    }

    #[test]
    fn put_then_get_round_trips_the_value() {
        let mut heap = Heap::new();
        let (get, put) = new_port_pair(&mut heap);
        let payload = heap.new_struct(Vec::new());

        let put_outcome = call_native(&mut heap, put, &[payload]).unwrap();
        assert!(matches!(put_outcome, NativeOutcome::Existing(_)));

        let get_outcome = call_native(&mut heap, get, &[]).unwrap();
        match get_outcome {
            NativeOutcome::Existing(v) => assert_eq!(v, payload),
            other => panic!("expected Existing, got a different outcome: {:?}", matches!(other, NativeOutcome::Blocked)),
        }
    }

    #[test]
    fn put_blocks_while_the_slot_is_still_occupied() {
        let mut heap = Heap::new();
        let (_get, put) = new_port_pair(&mut heap);
        let a = heap.new_struct(Vec::new());
        let b = heap.new_struct(Vec::new());

        call_native(&mut heap, put, &[a]).unwrap();
        let second = call_native(&mut heap, put, &[b]).unwrap();
        assert!(matches!(second, NativeOutcome::Blocked));
    }
}
