//! Timer-ordered wake-up queue.
//!
//! A min-heap keyed by (deadline, arming sequence) holds pending wake-ups.
//! Each live context owns at most one *armed* timer at any instant: arming
//! a new timer for a context supersedes its previous one. Superseded heap
//! entries are not removed eagerly; they are dropped when they surface at
//! the top of the heap, keeping `schedule` at O(log n). The `armed` map is
//! the source of truth for which entry is live.

use crate::scheduler::clock::VirtualTime;
use crate::scheduler::context::TaskId;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Bookkeeping handle for a scheduled wake-up. Not exposed to tasks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimerHandle(u64);

/// Entry in the timer heap.
struct TimerEntry {
    /// Absolute virtual deadline.
    deadline: VirtualTime,
    /// Arming sequence number; also the FIFO tie-breaker.
    seq: u64,
    /// Context this wake-up belongs to.
    task: TaskId,
}

// Reverse ordering for a min-heap: earliest deadline first, and on equal
// deadlines the earlier `schedule` call wins.
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

/// Pending wake-ups ordered by absolute deadline.
#[derive(Default)]
pub struct TimerQueue {
    /// Min-heap of entries, live and superseded alike.
    heap: BinaryHeap<TimerEntry>,
    /// Latest arming sequence per context. An entry fires only if its
    /// sequence still matches here.
    armed: FxHashMap<TaskId, u64>,
    next_seq: u64,
}

impl TimerQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a wake-up for `task` at `now + delay_ms`.
    ///
    /// If the context already has an armed timer it is invalidated and
    /// never fires; the new deadline replaces it.
    pub fn schedule(&mut self, task: TaskId, delay_ms: u64, now: VirtualTime) -> TimerHandle {
        let deadline = now + delay_ms;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.armed.insert(task, seq);
        self.heap.push(TimerEntry {
            deadline,
            seq,
            task,
        });
        TimerHandle(seq)
    }

    /// Remove and return every context whose armed timer has deadline
    /// ≤ `now`, in non-decreasing deadline order, FIFO on ties.
    ///
    /// Each context appears at most once per batch. Timers armed while
    /// the caller processes the batch are left for the next call, even if
    /// already due; that snapshot discipline bounds per-iteration work.
    pub fn expire(&mut self, now: VirtualTime) -> Vec<TaskId> {
        let mut due = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.deadline > now {
                break;
            }
            let entry = self.heap.pop().unwrap();
            match self.armed.get(&entry.task) {
                Some(&seq) if seq == entry.seq => {
                    self.armed.remove(&entry.task);
                    due.push(entry.task);
                }
                // superseded or disarmed; drop silently
                _ => {}
            }
        }
        due
    }

    /// Earliest armed deadline, if any. Prunes superseded entries it
    /// encounters on the way.
    pub fn next_deadline(&mut self) -> Option<VirtualTime> {
        while let Some(top) = self.heap.peek() {
            if self.armed.get(&top.task) == Some(&top.seq) {
                return Some(top.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Invalidate the armed timer for `task`, if any. Used defensively at
    /// context teardown; returns whether a timer was actually armed.
    pub fn disarm(&mut self, task: TaskId) -> bool {
        self.armed.remove(&task).is_some()
    }

    /// Whether `task` currently has an armed timer.
    pub fn is_armed(&self, task: TaskId) -> bool {
        self.armed.contains_key(&task)
    }

    /// Number of contexts with an armed timer.
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// True when no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}
