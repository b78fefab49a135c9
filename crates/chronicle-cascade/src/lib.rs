//! The cascade engine: the probabilistic, cross-domain propagation of
//! consequences from one event to the next.
//!
//! Everything here follows a best-effort failure model -- there is
//! deliberately no crate-local error type. Malformed inputs are clamped,
//! not rejected; a purged source event is a silent no-op, not a panic.
//! Genuine invariant violations (if any were ever found) would be a bug
//! in this crate, not a condition callers need to handle.

#![deny(unsafe_code)]

pub mod engine;
pub mod rng;
pub mod tables;

pub mod prelude {
    pub use crate::engine::{
        CascadeEngine, ConsequenceHook, PendingConsequence, RandomFn, ResolveTickResult,
        DEFAULT_MAX_CASCADE_DEPTH, DEFAULT_MIN_PROBABILITY_THRESHOLD,
    };
    pub use crate::rng::seeded_random_fn;
    pub use crate::tables::{
        adjust_dampening_for_significance, cross_domain_modifier, dampened_probability, should_continue_cascade,
        CrossDomainEntry, UNDEFINED_TRANSITION_PENALTY,
    };
}
