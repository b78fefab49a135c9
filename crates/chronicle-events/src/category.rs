//! The closed set of event domains.

use serde::{Deserialize, Serialize};

/// The ten domains an event can belong to. Closed: the cross-domain
/// modifier table in `chronicle-cascade` is a total function only over
/// these variants paired against themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Military,
    Political,
    Religious,
    Personal,
    Economic,
    Disaster,
    Magical,
    Cultural,
    Scientific,
    Exploratory,
}

impl EventCategory {
    pub const ALL: [EventCategory; 10] = [
        EventCategory::Military,
        EventCategory::Political,
        EventCategory::Religious,
        EventCategory::Personal,
        EventCategory::Economic,
        EventCategory::Disaster,
        EventCategory::Magical,
        EventCategory::Cultural,
        EventCategory::Scientific,
        EventCategory::Exploratory,
    ];
}
