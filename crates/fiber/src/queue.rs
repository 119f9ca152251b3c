//! The shared priority queue and the per-worker pinned local queues.

use parking_lot::Mutex;
use std::{
    cmp::Ordering,
    collections::{BinaryHeap, VecDeque},
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering as AtomicOrdering},
        Arc,
    },
};

/// Identifies one scheduled fiber, for tracing and diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct FiberId(u64);

impl FiberId {
    pub(crate) fn new(n: u64) -> Self {
        Self(n)
    }
}

/// Scheduling priority: higher runs first. Entries with equal priority run
/// in submission order.
pub type Priority = u64;

/// Where an awoken fiber goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Always resumes on worker `usize`; never picked up by another worker.
    Pinned(usize),
    /// Goes to the shared priority queue; any worker may pick it up next.
    Shared,
}

pub(crate) type BoxedFiber = Pin<Box<dyn Future<Output = ()> + Send>>;

pub(crate) struct Entry {
    pub(crate) id: FiberId,
    priority: Priority,
    seq: u64,
    pub(crate) placement: Placement,
    pub(crate) fiber: Mutex<Option<BoxedFiber>>,
}

impl Entry {
    pub(crate) fn new(id: FiberId, priority: Priority, seq: u64, placement: Placement, fiber: BoxedFiber) -> Arc<Self> {
        Arc::new(Self { id, priority, seq, placement, fiber: Mutex::new(Some(fiber)) })
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the greatest element first; higher priority must
        // sort greater, and among equal priorities the older (lower `seq`)
        // submission must sort greater so it pops first.
        self.priority.cmp(&other.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The shared priority queue plus one pinned local queue per worker.
pub(crate) struct Queues {
    shared: Mutex<BinaryHeap<Arc<Entry>>>,
    locals: Vec<Mutex<VecDeque<Arc<Entry>>>>,
    next_seq: AtomicU64,
}

impl Queues {
    pub(crate) fn new(workers: usize) -> Arc<Self> {
        Arc::new(Self {
            shared: Mutex::new(BinaryHeap::new()),
            locals: (0..workers).map(|_| Mutex::new(VecDeque::new())).collect(),
            next_seq: AtomicU64::new(0),
        })
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, AtomicOrdering::Relaxed)
    }

    /// Places an awoken entry: pinned fibers go to their worker's local
    /// queue, everything else goes to the shared queue.
    pub(crate) fn awaken(&self, entry: Arc<Entry>) {
        match entry.placement {
            Placement::Pinned(worker) => {
                let idx = worker % self.locals.len();
                self.locals[idx].lock().push_back(entry);
            }
            Placement::Shared => self.shared.lock().push(entry),
        }
    }

    /// Tries the shared queue first, then `worker`'s own local queue.
    pub(crate) fn pick_next(&self, worker: usize) -> Option<Arc<Entry>> {
        if let Some(entry) = self.shared.lock().pop() {
            return Some(entry);
        }
        self.locals[worker].lock().pop_front()
    }
}
