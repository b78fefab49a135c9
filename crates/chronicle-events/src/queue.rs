//! Scratch max-heap for subsystems that need to process a batch of fired
//! events in priority order within a tick. Not the event log -- entries
//! are consumed, not retained.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::event::Event;

/// `std::collections::BinaryHeap` is a max-heap but gives no tiebreak
/// guarantee; `Entry` implements `Ord` by hand so that among equal
/// `significance` the earliest-enqueued entry still pops first.
struct Entry {
    significance: i32,
    seq: u64,
    event: Event,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.significance == other.significance && self.seq == other.seq
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
        // Higher significance sorts greater (max-heap semantics). Among
        // equal significance, the *lower* sequence number (enqueued
        // earlier) must sort greater so it pops first -- hence the
        // reversed comparison on `seq`.
        self.significance.cmp(&other.significance).then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
pub struct EventPriorityQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl EventPriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { significance: event.significance, seq, event });
    }

    pub fn dequeue(&mut self) -> Option<Event> {
        self.heap.pop().map(|e| e.event)
    }

    pub fn peek(&self) -> Option<&Event> {
        self.heap.peek().map(|e| &e.event)
    }

    pub fn size(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain every entry in priority-descending order, emptying the queue.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(event) = self.dequeue() {
            out.push(event);
        }
        out
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::EventCategory;
    use chronicle_ecs::ids::{to_event_id, EntityId};

    fn event(raw: u32, significance: i32) -> Event {
        Event::new(to_event_id(EntityId::from_raw(raw)), EventCategory::Military, "war.raid", 0, vec![], significance, vec![])
    }

    #[test]
    fn dequeue_returns_highest_significance_first() {
        let mut q = EventPriorityQueue::new();
        q.enqueue(event(0, 10));
        q.enqueue(event(1, 90));
        q.enqueue(event(2, 50));
        assert_eq!(q.dequeue().unwrap().significance, 90);
        assert_eq!(q.dequeue().unwrap().significance, 50);
        assert_eq!(q.dequeue().unwrap().significance, 10);
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn stable_on_equal_keys_insertion_order_tiebreak() {
        let mut q = EventPriorityQueue::new();
        q.enqueue(event(0, 50));
        q.enqueue(event(1, 50));
        q.enqueue(event(2, 50));
        assert_eq!(q.dequeue().unwrap().id, to_event_id(EntityId::from_raw(0)));
        assert_eq!(q.dequeue().unwrap().id, to_event_id(EntityId::from_raw(1)));
        assert_eq!(q.dequeue().unwrap().id, to_event_id(EntityId::from_raw(2)));
    }

    #[test]
    fn peek_does_not_remove() {
        let mut q = EventPriorityQueue::new();
        q.enqueue(event(0, 10));
        assert_eq!(q.peek().unwrap().significance, 10);
        assert_eq!(q.size(), 1);
    }

    #[test]
    fn drain_returns_priority_descending_and_empties() {
        let mut q = EventPriorityQueue::new();
        q.enqueue(event(0, 10));
        q.enqueue(event(1, 90));
        let drained = q.drain();
        assert_eq!(drained.iter().map(|e| e.significance).collect::<Vec<_>>(), vec![90, 10]);
        assert!(q.is_empty());
    }

    #[test]
    fn clear_drops_without_returning() {
        let mut q = EventPriorityQueue::new();
        q.enqueue(event(0, 10));
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.dequeue(), None);
    }
}
