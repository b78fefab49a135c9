//! Append-only event history and its causal graph edges.
//!
//! An append-accumulate-query journal storing full [`Event`] records
//! rather than component-mutation diffs, keyed by [`EventId`] via an
//! `IndexMap` so insertion order is preserved without a linear id scan.

use indexmap::IndexMap;

use chronicle_ecs::ids::EventId;

use crate::category::EventCategory;
use crate::event::Event;
use crate::EventLogError;

/// The append-only log. Events are never removed or mutated in place
/// except for the `consequences` field, which `link_cause` grows.
#[derive(Debug, Default)]
pub struct EventLog {
    events: IndexMap<EventId, Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event`. Rejects a duplicate id rather than overwriting --
    /// event ids are unique for the life of the process (E-1).
    pub fn append(&mut self, event: Event) -> Result<(), EventLogError> {
        if self.events.contains_key(&event.id) {
            return Err(EventLogError::DuplicateEventId(event.id));
        }
        self.events.insert(event.id, event);
        Ok(())
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    pub fn get_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.events.get_mut(&id)
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.events.contains_key(&id)
    }

    /// All entries in insertion order.
    pub fn get_all(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    pub fn get_count(&self) -> usize {
        self.events.len()
    }

    pub fn get_by_category(&self, category: EventCategory) -> Vec<&Event> {
        self.events.values().filter(|e| e.category == category).collect()
    }

    pub fn get_by_subtype(&self, subtype: &str) -> Vec<&Event> {
        self.events.values().filter(|e| e.subtype == subtype).collect()
    }

    pub fn get_in_tick_range(&self, lo: u64, hi: u64) -> Vec<&Event> {
        self.events.values().filter(|e| e.timestamp >= lo && e.timestamp <= hi).collect()
    }

    /// Record a causal edge: `effect` becomes a consequence of `cause`,
    /// and `cause` becomes a cause of `effect`. Idempotent (re-linking the
    /// same pair is a no-op the second time) and only takes effect when
    /// both endpoints are present in the log -- per (E-2), every recorded
    /// edge has both endpoints in the log, so a missing endpoint simply
    /// means no edge is recorded (the cascade engine treats this as
    /// best-effort, not fatal). Returns whether the edge was recorded.
    pub fn link_cause(&mut self, cause: EventId, effect: EventId) -> bool {
        if !self.events.contains_key(&cause) || !self.events.contains_key(&effect) {
            return false;
        }
        if let Some(cause_event) = self.events.get_mut(&cause) {
            if !cause_event.consequences.contains(&effect) {
                cause_event.consequences.push(effect);
            }
        }
        if let Some(effect_event) = self.events.get_mut(&effect) {
            if !effect_event.causes.contains(&cause) {
                effect_event.causes.push(cause);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use chronicle_ecs::ids::to_event_id;
    use chronicle_ecs::ids::EntityId;

    fn event(raw: u32, category: EventCategory, subtype: &str, tick: u64) -> Event {
        Event::new(to_event_id(EntityId::from_raw(raw)), category, subtype, tick, vec![], 50, vec![])
    }

    #[test]
    fn duplicate_append_is_rejected() {
        let mut log = EventLog::new();
        log.append(event(0, EventCategory::Military, "war.raid", 0)).unwrap();
        let err = log.append(event(0, EventCategory::Military, "war.raid", 0)).unwrap_err();
        assert_eq!(err, EventLogError::DuplicateEventId(to_event_id(EntityId::from_raw(0))));
    }

    #[test]
    fn get_all_preserves_insertion_order() {
        let mut log = EventLog::new();
        for i in 0..5u32 {
            log.append(event(i, EventCategory::Military, "war.raid", i as u64)).unwrap();
        }
        let ids: Vec<EventId> = log.get_all().map(|e| e.id).collect();
        let expected: Vec<EventId> = (0..5u32).map(|i| to_event_id(EntityId::from_raw(i))).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn filters_by_category_subtype_and_tick_range() {
        let mut log = EventLog::new();
        log.append(event(0, EventCategory::Military, "war.raid", 0)).unwrap();
        log.append(event(1, EventCategory::Political, "political.unrest", 5)).unwrap();
        log.append(event(2, EventCategory::Military, "war.siege", 10)).unwrap();

        assert_eq!(log.get_by_category(EventCategory::Military).len(), 2);
        assert_eq!(log.get_by_subtype("political.unrest").len(), 1);
        assert_eq!(log.get_in_tick_range(1, 10).len(), 2);
    }

    #[test]
    fn link_cause_is_symmetric_and_idempotent() {
        let mut log = EventLog::new();
        log.append(event(0, EventCategory::Military, "war.raid", 0)).unwrap();
        log.append(event(1, EventCategory::Political, "political.unrest", 7)).unwrap();
        let a = to_event_id(EntityId::from_raw(0));
        let b = to_event_id(EntityId::from_raw(1));

        assert!(log.link_cause(a, b));
        assert!(log.link_cause(a, b));

        assert_eq!(log.get(a).unwrap().consequences, vec![b]);
        assert_eq!(log.get(b).unwrap().causes, vec![a]);
    }

    #[test]
    fn link_cause_with_missing_endpoint_is_a_no_op() {
        let mut log = EventLog::new();
        log.append(event(0, EventCategory::Military, "war.raid", 0)).unwrap();
        let a = to_event_id(EntityId::from_raw(0));
        let ghost = to_event_id(EntityId::from_raw(99));
        assert!(!log.link_cause(a, ghost));
        assert!(log.get(a).unwrap().consequences.is_empty());
    }
}
