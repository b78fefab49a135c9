//! Event fabric: the record type, the append-only causal log, the
//! three-tier pub/sub bus, and a scratch priority queue.
//!
//! This crate owns no simulation behavior -- it is the shared vocabulary
//! (`Event`, `EventCategory`, `ConsequenceRule`) and the structures that
//! move events around (`EventLog`, `EventBus`, `EventPriorityQueue`).
//! `chronicle-cascade` builds the probabilistic propagation on top of it.

#![deny(unsafe_code)]

pub mod bus;
pub mod category;
pub mod event;
pub mod log;
pub mod queue;

use chronicle_ecs::ids::EventId;

/// Errors produced by event-log operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventLogError {
    #[error("event id {0} already present in the log")]
    DuplicateEventId(EventId),
}

pub mod prelude {
    pub use crate::bus::{EventBus, HandlerFailed, HandlerToken};
    pub use crate::category::EventCategory;
    pub use crate::event::{ConsequenceRule, Event, EventData};
    pub use crate::log::EventLog;
    pub use crate::queue::EventPriorityQueue;
    pub use crate::EventLogError;
}
