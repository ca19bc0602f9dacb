//! Cooperative one-shot timers keyed by simulation tick.
//!
//! Timers are a min-heap ordered by `(due, id)`, so two timers due on the
//! same tick fire in the order they were armed. Cancellation removes the id
//! from the pending set; the heap entry is discarded lazily when it reaches
//! the top.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use palaver_core::types::Tick;

/// Handle to an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Entry<E> {
    due: Tick,
    id: u64,
    task: E,
}

// BinaryHeap is a max-heap, so the ordering is reversed: earliest due first,
// then lowest id.
impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Counters for the timer heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Timers armed.
    pub armed: u64,
    /// Timers that fired.
    pub fired: u64,
    /// Timers cancelled before firing.
    pub cancelled: u64,
}

/// Timer heap driven by the authoritative tick.
pub struct Scheduler<E> {
    heap: BinaryHeap<Entry<E>>,
    pending: HashSet<u64>,
    next_id: u64,
    now: Tick,
    stats: SchedulerStats,
}

impl<E> std::fmt::Debug for Scheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    /// An empty scheduler at tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            next_id: 0,
            now: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// Arm `task` to fire `delay` ticks from now.
    pub fn arm(&mut self, delay: Tick, task: E) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Entry {
            due: self.now.saturating_add(delay),
            id,
            task,
        });
        self.pending.insert(id);
        self.stats.armed += 1;
        TimerId(id)
    }

    /// Cancel a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, timer: TimerId) -> bool {
        let removed = self.pending.remove(&timer.0);
        if removed {
            self.stats.cancelled += 1;
        }
        removed
    }

    /// Whether `timer` is still armed.
    #[must_use]
    pub fn is_pending(&self, timer: TimerId) -> bool {
        self.pending.contains(&timer.0)
    }

    /// Move the clock to `now` and return every task that came due, in order.
    ///
    /// The clock never runs backwards.
    pub fn advance(&mut self, now: Tick) -> Vec<E> {
        self.now = self.now.max(now);
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|top| top.due <= self.now) {
            let Some(entry) = self.heap.pop() else { break };
            if self.pending.remove(&entry.id) {
                self.stats.fired += 1;
                due.push(entry.task);
            }
        }
        due
    }

    /// Number of armed timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no timers are armed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Current tick.
    #[must_use]
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
