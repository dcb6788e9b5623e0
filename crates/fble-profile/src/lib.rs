//! Sampling call-graph profiler (spec.md section 4.7): a per-block call
//! table shared by every [`ProfileThread`], text reports, and pprof export
//! (`pprof` module, section 6.3).
//!
//! Grounded on `examples/original_source/lib/profile.c`'s `FbleProfile`/
//! `FbleProfileThread` structures (chunked call stack, deduplicated sample
//! stack, `EnterBlock`/`FbleProfileSample`'s self-time/call-time accounting)
//! -- ported to a `Vec`-backed call table since Rust's `Vec` already
//! amortizes the growth the original's hand-rolled chunk list exists for.
//! A disabled profile makes every thread operation a no-op, matching
//! `FbleNewProfileThread` returning `NULL` when `profile->enabled` is false.
//!
//! The table itself lives behind a `RefCell` so that a forked thread
//! (spec.md section 5: a process forks with its own call stack, onward)
//! can hold the same shared `&Profile` as its parent rather than needing
//! a `&mut` each -- there is never more than one thread actually stepping
//! at a time (spec.md section 5's single-threaded cooperative model), but
//! several can be alive (a parent suspended mid-call while a child runs).

pub mod pprof;
pub mod report;

use std::cell::{Cell, RefCell};

use fble_common::Name;

/// One outgoing call edge from a block: how many times it was taken, and
/// how much time (sample ticks) was attributed to it (spec.md section 4.7:
/// "self-time/block-time/call-time accounting that avoids double-counting
/// recursion").
#[derive(Debug, Clone)]
pub struct CallEdge {
    pub callee: u32,
    pub count: u64,
    pub time: u64,
}

#[derive(Debug, Clone)]
struct BlockData {
    name: Name,
    /// Number of times this block was entered, across every caller.
    count: u64,
    /// Self time: ticks attributed while this block was the running one.
    time: u64,
    calls: Vec<CallEdge>,
}

/// Two counters attached to one distinct call stack (root to leaf, by
/// block id): how many times that exact stack was live when a call was
/// made, and how many times it was live when a statistical sample landed
/// (spec.md section 6.3's `(calls, count)`/`(samples, count)` sample
/// types, which this table stores per-stack rather than per-edge so
/// `pprof::encode` can emit one `sample` record per distinct call stack
/// rather than per adjacent edge).
#[derive(Debug, Clone, Default)]
pub(crate) struct StackCounts {
    pub(crate) calls: u64,
    pub(crate) samples: u64,
}

/// The aggregate call-graph table. One per program run; every
/// [`ProfileThread`] writes into the same table.
#[derive(Debug)]
pub struct Profile {
    enabled: bool,
    blocks: RefCell<Vec<BlockData>>,
    /// Every distinct full call stack observed, in first-visit order, with
    /// its own `(calls, samples)` counters. Keyed by the stack itself (a
    /// sequence of block ids, root first) rather than by adjacent edge, so
    /// a 4-deep chain produces one 4-location sample rather than three
    /// 2-location ones (spec.md section 6.3).
    stacks: RefCell<Vec<(Vec<u32>, StackCounts)>>,
    tick: Cell<u64>,
}

/// Every 1024th sampling opportunity is charged, mirroring the original's
/// `rand() % 1024 == 0` -- made a deterministic counter here rather than
/// reaching for a `rand` crate the teacher never depends on, since
/// reproducible profiles are strictly more useful for this port's own
/// tests than the original's randomized cadence.
const SAMPLE_PERIOD: u64 = 1024;

impl Profile {
    /// `block_names` is spec.md section 3.7's `profile_blocks` table,
    /// already flattened across every linked module, in the same order
    /// their bytecode `profile_block_id`s index into. Block `0` is the
    /// reserved root frame every call stack starts beneath.
    pub fn new(enabled: bool, block_names: Vec<Name>) -> Self {
        let blocks = block_names
            .into_iter()
            .map(|name| BlockData { name, count: 0, time: 0, calls: Vec::new() })
            .collect();
        Profile { enabled, blocks: RefCell::new(blocks), stacks: RefCell::new(Vec::new()), tick: Cell::new(0) }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    /// Total number of times `block` was entered, across every caller
    /// (spec.md section 4.7's per-block `count`).
    pub fn count(&self, block: u32) -> u64 {
        self.blocks.borrow()[block as usize].count
    }

    /// How many times `to` was called directly from `from`, or `0` if no
    /// such edge was ever taken.
    pub fn calls(&self, from: u32, to: u32) -> u64 {
        self.blocks.borrow()[from as usize]
            .calls
            .iter()
            .find(|c| c.callee == to)
            .map_or(0, |c| c.count)
    }

    fn bump_call(&self, from: u32, to: u32) {
        let mut blocks = self.blocks.borrow_mut();
        let calls = &mut blocks[from as usize].calls;
        match calls.iter_mut().find(|c| c.callee == to) {
            Some(edge) => edge.count += 1,
            None => calls.push(CallEdge { callee: to, count: 1, time: 0 }),
        }
    }

    fn charge_call_time(&self, from: u32, to: u32, time: u64) {
        let mut blocks = self.blocks.borrow_mut();
        let calls = &mut blocks[from as usize].calls;
        match calls.iter_mut().find(|c| c.callee == to) {
            Some(edge) => edge.time += time,
            None => calls.push(CallEdge { callee: to, count: 0, time }),
        }
    }

    /// Bump `stack`'s `calls` or `samples` counter, creating its entry (in
    /// first-visit order) if this is the first time it was observed.
    fn record_stack(&self, stack: &[u32], calls: u64, samples: u64) {
        let mut stacks = self.stacks.borrow_mut();
        match stacks.iter_mut().find(|(s, _)| s.as_slice() == stack) {
            Some((_, counts)) => {
                counts.calls += calls;
                counts.samples += samples;
            }
            None => stacks.push((stack.to_vec(), StackCounts { calls, samples })),
        }
    }

    /// Every distinct call stack observed so far, in first-visit order
    /// (`pprof::encode`'s one-`sample`-per-stack source of truth).
    pub(crate) fn stacks(&self) -> std::cell::Ref<'_, Vec<(Vec<u32>, StackCounts)>> {
        self.stacks.borrow()
    }

    /// A fresh execution thread over this table. `None` when profiling is
    /// disabled, matching `FbleNewProfileThread`'s no-op contract -- callers
    /// skip every `ProfileEnter`/`ProfileExit` hook rather than paying for a
    /// thread that would do nothing.
    pub fn new_thread(&self) -> Option<ProfileThread<'_>> {
        if !self.enabled {
            return None;
        }
        Some(ProfileThread { profile: self, calls: vec![Call { block: 0, edges_opened: 0 }], sample_stack: Vec::new() })
    }
}

struct Call {
    block: u32,
    /// How many `sample_stack` entries this call frame opened -- popped
    /// off on exit (spec.md section 4.7, grounded on `profile.c`'s
    /// `Call.exit`).
    edges_opened: usize,
}

/// One thread's execution-order view into a [`Profile`]'s call table:
/// current call stack plus the deduplicated (caller, callee) sample stack
/// used to avoid double-charging recursive edges (spec.md section 4.7).
pub struct ProfileThread<'p> {
    profile: &'p Profile,
    calls: Vec<Call>,
    sample_stack: Vec<(u32, u32)>,
}

impl<'p> ProfileThread<'p> {
    fn current_block(&self) -> u32 {
        self.calls.last().expect("a thread always has at least the root call").block
    }

    /// The full live call stack, root first, by block id -- the key
    /// `pprof::encode`'s per-stack `sample` records are aggregated under.
    fn stack_snapshot(&self) -> Vec<u32> {
        self.calls.iter().map(|c| c.block).collect()
    }

    /// Enter `block` as a call from the current top of the call stack
    /// (spec.md section 4.7's `EnterBlock`). Pushes a new call frame.
    pub fn enter_block(&mut self, block: u32) {
        self.push_call(block, false);
    }

    /// Tail call: replace the current frame's block rather than pushing a
    /// new one (spec.md section 4.6.2's `ProfileReplace`/4.7's call-stack
    /// accounting for tail calls, which must not grow the profiler's own
    /// stack any more than the interpreter's does).
    pub fn replace_block(&mut self, block: u32) {
        self.push_call(block, true);
    }

    fn push_call(&mut self, block: u32, replace: bool) {
        let caller = self.current_block();
        let already_open = self.sample_stack.iter().any(|&(c, callee)| c == caller && callee == block);
        self.profile.bump_call(caller, block);
        self.profile.blocks.borrow_mut()[block as usize].count += 1;

        if replace {
            let top = self.calls.last_mut().expect("a thread always has at least the root call");
            top.block = block;
        } else {
            self.calls.push(Call { block, edges_opened: 0 });
        }

        if !already_open {
            self.sample_stack.push((caller, block));
            self.calls.last_mut().expect("just pushed or replaced").edges_opened += 1;
        }

        self.profile.record_stack(&self.stack_snapshot(), 1, 0);
    }

    /// Leave the current block, popping its call frame and whatever sample
    /// edges it opened.
    pub fn exit_block(&mut self) {
        let call = self.calls.pop().expect("exit_block without a matching enter_block/replace_block");
        let new_len = self.sample_stack.len() - call.edges_opened;
        self.sample_stack.truncate(new_len);
    }

    /// Charge `time` ticks: self time to the currently running block, and
    /// call time to every distinct (caller, callee) edge on the open call
    /// stack (spec.md section 4.7 -- each edge is charged at most once per
    /// sample, however many times the same callee recurs beneath it).
    pub fn sample(&mut self, time: u64) {
        let current = self.current_block();
        self.profile.blocks.borrow_mut()[current as usize].time += time;

        let mut seen = Vec::new();
        for &(caller, callee) in &self.sample_stack {
            if seen.contains(&callee) {
                continue;
            }
            seen.push(callee);
            self.profile.charge_call_time(caller, callee, time);
        }

        self.profile.record_stack(&self.stack_snapshot(), 0, 1);
    }

    /// Charge one sample roughly every [`SAMPLE_PERIOD`] opportunities,
    /// mirroring `FbleProfileRandomSample`'s "most instructions are free,
    /// a sample is rare" cost model without needing a thread-local RNG.
    pub fn random_sample(&mut self, opportunities: u64) {
        for _ in 0..opportunities {
            let tick = self.profile.tick.get().wrapping_add(1);
            self.profile.tick.set(tick);
            if tick % SAMPLE_PERIOD == 0 {
                self.sample(1);
            }
        }
    }

    /// Copy this thread's call/sample stack into a new thread sharing the
    /// same table (spec.md section 5: a forked process profiles
    /// independently from its parent's call stack onward, while both
    /// still tally into the same shared block table).
    pub fn fork(&self) -> ProfileThread<'p> {
        ProfileThread {
            profile: self.profile,
            calls: self
                .calls
                .iter()
                .map(|c| Call { block: c.block, edges_opened: c.edges_opened })
                .collect(),
            sample_stack: self.sample_stack.clone(),
        }
    }
}

impl Profile {
    /// Render the text report (spec.md section 4.7): coverage, a flat
    /// profile by total time, a flat profile by self time, and a call
    /// graph section per covered block -- see `report.rs`.
    pub fn report(&self) -> String {
        report::render(self)
    }

    /// Encode this table as a pprof proto3 `Profile` message (spec.md
    /// section 6.3) -- see `pprof.rs`.
    pub fn to_pprof(&self) -> Vec<u8> {
        pprof::encode(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fble_common::{Loc, NameSpace};
    use std::rc::Rc;

    fn name(text: &str) -> Name {
        Name::new(text, NameSpace::Normal, Loc::new(Rc::from("t.fble"), 1, 1))
    }

    fn sample_profile() -> Profile {
        Profile::new(true, vec![name("<root>"), name("Not"), name("Not!"), name("Not!.true"), name("Not!.false")])
    }

    #[test]
    fn disabled_profile_yields_no_thread() {
        let profile = Profile::new(false, vec![name("<root>")]);
        assert!(profile.new_thread().is_none());
    }

    #[test]
    fn enter_exit_tracks_call_counts() {
        let profile = sample_profile();
        {
            let mut thread = profile.new_thread().unwrap();
            thread.enter_block(2); // Not!
            thread.enter_block(1); // Not
            thread.exit_block();
            thread.enter_block(3); // Not!.true
            thread.exit_block();
            thread.exit_block();
        }
        let blocks = profile.blocks.borrow();
        assert_eq!(blocks[2].count, 1);
        assert_eq!(blocks[1].count, 1);
        assert_eq!(blocks[3].count, 1);
    }

    #[test]
    fn recursive_tail_calls_via_replace_block_do_not_grow_call_stack() {
        let profile = sample_profile();
        let mut thread = profile.new_thread().unwrap();
        thread.enter_block(2);
        for _ in 0..1000 {
            thread.replace_block(2);
        }
        assert_eq!(thread.calls.len(), 1, "tail calls must rewrite the frame, not push");
        thread.exit_block();
    }

    #[test]
    fn fork_copies_the_open_call_stack_independently() {
        let profile = sample_profile();
        let mut thread = profile.new_thread().unwrap();
        thread.enter_block(2);
        let mut child = thread.fork();
        child.enter_block(1);
        child.exit_block();
        thread.exit_block();
        // Parent's own stack is untouched by the child's nested call.
        assert_eq!(thread.calls.len(), 1);
    }

    #[test]
    fn profiles_test_scenario_matches_documented_counts() {
        // count(Not)=1, count(Not!)=3, calls(Not!->Not!.true)=2,
        // calls(Not!->Not!.false)=1: a boolean toggler process that reads
        // a bool, calls the pure `Not` function once, and tail-recurses
        // into itself three times, alternately taking the `true`/`false`
        // branch of the union it negates.
        let profile = sample_profile();
        let mut thread = profile.new_thread().unwrap();
        thread.enter_block(2); // Not! (1st)
        thread.enter_block(1); // Not
        thread.exit_block();
        thread.enter_block(3); // .true branch
        thread.exit_block();
        thread.replace_block(2); // Not! (2nd, tail call)
        thread.enter_block(4); // .false branch
        thread.exit_block();
        thread.replace_block(2); // Not! (3rd, tail call)
        thread.enter_block(3); // .true branch
        thread.exit_block();
        thread.exit_block();

        let blocks = profile.blocks.borrow();
        assert_eq!(blocks[1].count, 1, "Not is called once");
        assert_eq!(blocks[2].count, 3, "Not! runs three times total");
        let not_bang_calls = &blocks[2].calls;
        let to = |callee: u32| not_bang_calls.iter().find(|c| c.callee == callee).map(|c| c.count).unwrap_or(0);
        assert_eq!(to(3), 2, "Not! -> Not!.true taken twice");
        assert_eq!(to(4), 1, "Not! -> Not!.false taken once");
    }
}
