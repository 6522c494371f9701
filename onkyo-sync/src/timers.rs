//! Scheduled continuations owned by the engine loop
//!
//! Retries and standby checks are not sleeps: they are entries in a
//! [`TimerQueue`] that the engine polls between messages. Entries with the
//! same deadline come out in the order they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use tokio::time::Instant;

use crate::standby::StandbyArm;
use crate::supervisor::PendingRetry;

/// Work to do when a timer comes due
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Retry(PendingRetry),
    Standby(StandbyArm),
}

#[derive(Debug)]
struct Entry {
    deadline: Instant,
    seq: u64,
    event: TimerEvent,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the max-heap yields the earliest deadline first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Deadline-ordered queue of timer events
/// Stand-in deadline for delays too large to represent, roughly 30 years out
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event` to come due after `delay`
    ///
    /// Delays are capped at about 30 years so the deadline always fits.
    pub fn schedule(&mut self, delay: Duration, event: TimerEvent) -> Instant {
        let deadline = Instant::now() + delay.min(FAR_FUTURE);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            deadline,
            seq,
            event,
        });
        deadline
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// Remove and return the earliest event due at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerEvent> {
        if self.heap.peek()?.deadline > now {
            return None;
        }
        self.heap.pop().map(|entry| entry.event)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
