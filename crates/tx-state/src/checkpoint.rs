//! Call-frame checkpoints and the per-address [`VersionStack`] journal they
//! index into.
//!
//! Every address and storage slot touched by a transaction gets its own
//! `VersionStack`; all of them share one transaction-wide checkpoint
//! counter so that `accept`/`reject` of a call frame applies uniformly
//! across every value any of them wrote during that frame, without each
//! stack needing to agree out-of-band on frame boundaries.

/// A call-frame boundary. `0` is the transaction's base state, before any
/// call or create frame has pushed a checkpoint.
pub type CheckpointId = u64;

/// Issues the monotonically increasing [`CheckpointId`]s a transaction's
/// call/create frames push as they nest.
#[derive(Debug, Clone, Default)]
pub struct CheckpointCounter(CheckpointId);

impl CheckpointCounter {
    /// Starts a counter at the transaction's base frame (`0`).
    pub const fn new() -> Self {
        Self(0)
    }

    /// Pushes a new call-frame checkpoint and returns its id.
    pub fn push(&mut self) -> CheckpointId {
        self.0 += 1;
        self.0
    }

    /// The most recently pushed checkpoint id.
    pub const fn current(&self) -> CheckpointId {
        self.0
    }
}

/// A copy-on-write version history for one value (an account, a storage
/// slot, a substate entry) across a transaction's nested call frames.
///
/// `entries` is sorted ascending by [`CheckpointId`]; `entries[0]` is always
/// the frame-`0` base value the transaction started with.
#[derive(Debug, Clone)]
pub struct VersionStack<T> {
    entries: Vec<(CheckpointId, T)>,
}

impl<T: Clone> VersionStack<T> {
    /// Starts a stack holding `base` at checkpoint `0`.
    pub fn new(base: T) -> Self {
        Self { entries: vec![(0, base)] }
    }

    /// Returns a mutable reference to the value as of `checkpoint`, cloning
    /// the most recent prior value forward if this stack hasn't been
    /// touched at `checkpoint` yet (copy-on-write).
    pub fn current(&mut self, checkpoint: CheckpointId) -> &mut T {
        let top = self.entries.last().expect("VersionStack always holds at least the base entry");
        if top.0 < checkpoint {
            let value = top.1.clone();
            self.entries.push((checkpoint, value));
        }
        &mut self.entries.last_mut().expect("just pushed or already present").1
    }

    /// Reads the value as of `checkpoint` without cloning forward — the
    /// most recent entry at or before `checkpoint`.
    pub fn peek(&self, checkpoint: CheckpointId) -> &T {
        self.entries
            .iter()
            .rev()
            .find(|(cp, _)| *cp <= checkpoint)
            .map(|(_, value)| value)
            .unwrap_or(&self.entries[0].1)
    }

    /// Collapses the top checkpoint into its parent: the call frame
    /// succeeded, so its value becomes visible to the parent frame without
    /// its own checkpoint boundary. A no-op if this stack was never touched
    /// at `checkpoint`.
    pub fn accept(&mut self, checkpoint: CheckpointId) {
        if self.entries.len() > 1 && self.entries.last().unwrap().0 == checkpoint {
            let (_, value) = self.entries.pop().unwrap();
            self.entries.last_mut().unwrap().1 = value;
        }
    }

    /// Discards the top checkpoint: the call frame reverted, so its value
    /// is thrown away and the parent frame's value becomes current again.
    /// Returns whether the stack is now back to just its base entry (no
    /// frame above `0` left).
    pub fn reject(&mut self, checkpoint: CheckpointId) -> bool {
        if self.entries.len() > 1 && self.entries.last().unwrap().0 == checkpoint {
            self.entries.pop();
        }
        self.entries.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_copies_forward_only_once_per_checkpoint() {
        let mut stack = VersionStack::new(10u64);
        *stack.current(1) = 20;
        assert_eq!(*stack.current(1), 20);
        assert_eq!(*stack.peek(0), 10);
    }

    #[test]
    fn accept_merges_the_top_value_into_its_parent() {
        let mut stack = VersionStack::new(10u64);
        *stack.current(1) = 20;
        stack.accept(1);
        assert_eq!(*stack.peek(0), 20);
        assert_eq!(*stack.peek(5), 20);
    }

    #[test]
    fn reject_discards_the_top_value() {
        let mut stack = VersionStack::new(10u64);
        *stack.current(1) = 20;
        assert!(stack.reject(1));
        assert_eq!(*stack.peek(0), 10);
    }

    #[test]
    fn reject_of_an_untouched_checkpoint_is_a_no_op() {
        let mut stack = VersionStack::new(10u64);
        assert!(stack.reject(1));
        assert_eq!(*stack.peek(0), 10);
    }

    #[test]
    fn nested_frames_reject_inner_then_accept_outer() {
        let mut stack = VersionStack::new(10u64);
        *stack.current(1) = 20;
        *stack.current(2) = 30;
        assert!(!stack.reject(2));
        assert_eq!(*stack.peek(1), 20);
        stack.accept(1);
        assert_eq!(*stack.peek(0), 20);
    }

    #[test]
    fn checkpoint_counter_increments_monotonically() {
        let mut counter = CheckpointCounter::new();
        assert_eq!(counter.push(), 1);
        assert_eq!(counter.push(), 2);
        assert_eq!(counter.current(), 2);
    }
}
