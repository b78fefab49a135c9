//! The cascade engine: schedules probabilistic consequences of events and
//! resolves them as they come due, recursively, within a single
//! `resolve_tick` call.
//!
//! Per the best-effort failure model, nothing here returns a `Result`.
//! Malformed rule probabilities are clamped at the point of use and a
//! purged source event is a silent no-op, not a panic.

use chronicle_ecs::ids::{to_event_id, Allocators, EventId};
use chronicle_events::bus::EventBus;
use chronicle_events::event::{ConsequenceRule, Event};
use chronicle_events::log::EventLog;
use tracing::{trace, warn};

use crate::tables::{
    adjust_dampening_for_significance, cross_domain_modifier, dampened_probability, should_continue_cascade,
    UNDEFINED_TRANSITION_PENALTY,
};

pub const DEFAULT_MAX_CASCADE_DEPTH: u32 = 10;
pub const DEFAULT_MIN_PROBABILITY_THRESHOLD: f64 = 0.01;

/// A consequence scheduled but not yet resolved.
#[derive(Debug, Clone)]
pub struct PendingConsequence {
    pub rule: ConsequenceRule,
    pub source_event_id: EventId,
    pub fire_tick: u64,
    pub depth: u32,
    pub effective_probability: f64,
}

/// Outcome of a `resolve_tick` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveTickResult {
    pub events_generated: u64,
    pub pending_count: usize,
}

/// Injectable source of uniform `[0,1)` draws: a boxed closure backed by
/// `rand`/`rand_pcg` in production, or a fixed sequence in tests.
pub type RandomFn = Box<dyn FnMut() -> f64 + Send>;

/// Hook invoked immediately after a consequence event is constructed and
/// before it is appended to the log or emitted on the bus, letting
/// external code enrich it (e.g. attach further `consequencePotential`
/// rules). Defaults to pass-through identity.
pub type ConsequenceHook = Box<dyn FnMut(&Event, Event) -> Event + Send>;

pub struct CascadeEngine {
    pending: Vec<PendingConsequence>,
    max_cascade_depth: u32,
    min_probability_threshold: f64,
    random_fn: RandomFn,
    consequence_hook: ConsequenceHook,
}

impl CascadeEngine {
    pub fn new(random_fn: RandomFn) -> Self {
        Self {
            pending: Vec::new(),
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            min_probability_threshold: DEFAULT_MIN_PROBABILITY_THRESHOLD,
            random_fn,
            consequence_hook: Box::new(|_source, event| event),
        }
    }

    pub fn with_max_cascade_depth(mut self, max_cascade_depth: u32) -> Self {
        self.max_cascade_depth = max_cascade_depth;
        self
    }

    pub fn with_min_probability_threshold(mut self, threshold: f64) -> Self {
        self.min_probability_threshold = threshold;
        self
    }

    /// Install `onConsequenceCreated`. Defaults to pass-through identity.
    pub fn set_consequence_hook(&mut self, hook: impl FnMut(&Event, Event) -> Event + Send + 'static) {
        self.consequence_hook = Box::new(hook);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> &[PendingConsequence] {
        &self.pending
    }

    pub fn max_cascade_depth(&self) -> u32 {
        self.max_cascade_depth
    }

    /// Drop every pending consequence without firing any of them.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Schedule pending consequences for `source_event`'s declared
    /// `consequence_potential`, bounded by `max_cascade_depth`.
    pub fn process_event(&mut self, source_event: &Event, current_tick: u64, depth: u32) {
        if depth >= self.max_cascade_depth {
            trace!(event = ?source_event.id, depth, "cascade depth cap reached; not scheduling");
            return;
        }

        for rule in &source_event.consequence_potential {
            let effective_dampening = adjust_dampening_for_significance(rule.dampening, source_event.significance);
            let base_probability = dampened_probability(rule.base_probability, effective_dampening, depth);

            let modifier = match cross_domain_modifier(source_event.category, rule.category) {
                Some(entry) => entry.multiplier,
                None => {
                    warn!(
                        source = ?source_event.category,
                        target = ?rule.category,
                        "no defined cross-domain transition; applying undefined-transition penalty"
                    );
                    UNDEFINED_TRANSITION_PENALTY
                }
            };
            let effective_probability = (base_probability * modifier).clamp(0.0, 1.0);

            if !should_continue_cascade(effective_probability, self.min_probability_threshold) {
                continue;
            }

            self.pending.push(PendingConsequence {
                rule: rule.clone(),
                source_event_id: source_event.id,
                fire_tick: current_tick + rule.delay_ticks as u64,
                depth: depth + 1,
                effective_probability,
            });
        }
    }

    /// Fire every pending consequence due at or before `current_tick`,
    /// recursively admitting newly-scheduled same-tick consequences until
    /// the pending list stabilizes. Self-stabilizing: every recursive
    /// `process_event` call increments depth, and scheduling is refused
    /// once depth reaches `max_cascade_depth`, so this provably
    /// terminates without an explicit iteration cap.
    pub fn resolve_tick(&mut self, current_tick: u64, log: &mut EventLog, bus: &EventBus, allocators: &mut Allocators) -> ResolveTickResult {
        let mut events_generated: u64 = 0;

        loop {
            let mut due = Vec::new();
            let mut not_due = Vec::with_capacity(self.pending.len());
            for entry in self.pending.drain(..) {
                if entry.fire_tick <= current_tick {
                    due.push(entry);
                } else {
                    not_due.push(entry);
                }
            }
            self.pending = not_due;

            if due.is_empty() {
                break;
            }

            for entry in due {
                let draw = (self.random_fn)();
                if draw >= entry.effective_probability {
                    continue;
                }

                let new_event = self.fire_consequence(&entry, current_tick, log, allocators);
                let entity_id = new_event.id;

                if let Err(err) = log.append(new_event.clone()) {
                    warn!(?err, "cascade-generated event id collided with an existing log entry; dropping");
                    continue;
                }
                log.link_cause(entry.source_event_id, entity_id);
                bus.emit(&new_event);
                events_generated += 1;

                self.process_event(&new_event, current_tick, entry.depth);
            }
        }

        ResolveTickResult { events_generated, pending_count: self.pending.len() }
    }

    fn fire_consequence(
        &mut self,
        entry: &PendingConsequence,
        current_tick: u64,
        log: &EventLog,
        allocators: &mut Allocators,
    ) -> Event {
        let source = log.get(entry.source_event_id);
        let source_significance = source.map(|e| e.significance).unwrap_or(50);
        let raw = source_significance as f64 * 0.9_f64.powi(entry.depth as i32);
        let significance = raw.round().clamp(0.0, 100.0) as i32;

        // EventId is derived from EntityId (events are entities), but the
        // cascade engine has no World to call create_entity on -- it
        // mints directly off the same shared Allocators the World uses.
        let entity_id = allocators.next_entity_id();
        let mut new_event = Event::new(
            to_event_id(entity_id),
            entry.rule.category,
            entry.rule.event_subtype.clone(),
            current_tick,
            Vec::new(),
            significance,
            Vec::new(),
        );
        new_event.causes = vec![entry.source_event_id];

        match source {
            Some(source_event) => (self.consequence_hook)(source_event, new_event),
            None => new_event,
        }
    }
}
