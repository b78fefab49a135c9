//! The event record and the declarative rules that govern its consequences.

use chronicle_ecs::ids::{EntityId, EventId, SiteId};
use serde::{Deserialize, Serialize};

use crate::category::EventCategory;

/// Arbitrary event-specific payload. The kernel never interprets these
/// fields -- only the persistence layer walks them, tagging any nested
/// `Map`/`Set` container so it round-trips distinguishably from a plain
/// JSON object or array.
pub type EventData = serde_json::Map<String, serde_json::Value>;

/// A declarative rule describing a possible consequence of an event.
/// Probabilities and dampening outside `[0,1]` are coerced by clamping
/// wherever they are consumed -- the cascade engine never rejects a
/// malformed rule, per the best-effort failure model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsequenceRule {
    pub event_subtype: String,
    pub base_probability: f64,
    pub category: EventCategory,
    pub delay_ticks: u32,
    pub dampening: f64,
}

/// An immutable historical record, except for `consequences`, which is
/// appended to as the cascade engine links new events back to their
/// cause.
///
/// Field names serialize as `camelCase` to match the normative JSON save
/// shape (`significance`, `consequencePotential`, `temporalOffset`, ...),
/// which other-language implementations of this kernel must interop with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub category: EventCategory,
    /// Dotted `domain.action` string, e.g. `"political.unrest"`.
    pub subtype: String,
    pub timestamp: u64,
    pub participants: Vec<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub location: Option<SiteId>,
    pub causes: Vec<EventId>,
    pub consequences: Vec<EventId>,
    #[serde(default)]
    pub data: EventData,
    /// Historical weight in `[0,100]`.
    pub significance: i32,
    pub consequence_potential: Vec<ConsequenceRule>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temporal_offset: Option<i32>,
}

impl Event {
    /// Construct a fresh event with no causes/consequences yet recorded.
    /// `significance` is clamped into `[0,100]` at construction so no
    /// out-of-range value can ever enter the log.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: EventId,
        category: EventCategory,
        subtype: impl Into<String>,
        timestamp: u64,
        participants: Vec<EntityId>,
        significance: i32,
        consequence_potential: Vec<ConsequenceRule>,
    ) -> Self {
        Self {
            id,
            category,
            subtype: subtype.into(),
            timestamp,
            participants,
            location: None,
            causes: Vec::new(),
            consequences: Vec::new(),
            data: EventData::new(),
            significance: significance.clamp(0, 100),
            consequence_potential,
            temporal_offset: None,
        }
    }

    pub fn with_location(mut self, location: SiteId) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    pub fn with_temporal_offset(mut self, offset: i32) -> Self {
        self.temporal_offset = Some(offset);
        self
    }
}
