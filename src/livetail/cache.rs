//! Process-wide cache of the most recent events across all machines.
//!
//! A single mutex guards the buffer, so appends, evictions and filtered reads
//! never interleave. Filtering clones the matches out under the lock and
//! callers work on that snapshot.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::event::{Event, MAX_EVENTS};

/// Bounded FIFO of events. Oldest entries are evicted first.
#[derive(Debug)]
pub struct LiveCache {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
}

impl Default for LiveCache {
    fn default() -> Self {
        Self::new(MAX_EVENTS)
    }
}

impl LiveCache {
    /// Create a cache holding at most `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity.min(MAX_EVENTS))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Append to the tail, dropping from the head while over capacity.
    pub fn append(&self, event: Event) {
        let mut events = self.lock();
        events.push_back(event);
        while events.len() > self.capacity {
            events.pop_front();
        }
    }

    /// Events whose `machine_id` matches exactly, in insertion order.
    pub fn filter_by_machine(&self, machine_id: &str) -> Vec<Event> {
        self.lock()
            .iter()
            .filter(|e| e.machine_id == machine_id)
            .cloned()
            .collect()
    }

    // A panic while holding the lock cannot leave a half-written event in the
    // deque, so a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
