//! World clock and tick scheduler.
//!
//! [`clock::WorldClock`] is the single source of simulation time: a
//! monotonic tick counter plus calendar conversion and frequency
//! predicates. [`scheduler::TickScheduler`] maps named subsystems onto
//! those frequencies with per-registration offsets so load can be spread
//! across ticks.

#![deny(unsafe_code)]

pub mod clock;
pub mod scheduler;

/// Errors produced by clock operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClockError {
    /// `advance_by` was called with a negative step.
    #[error("cannot advance clock by a negative amount: {0}")]
    NegativeAdvance(i64),

    /// `set_tick` was called with a negative absolute tick.
    #[error("cannot set clock to a negative tick: {0}")]
    NegativeTick(i64),
}

pub mod prelude {
    pub use crate::clock::{TickFrequency, WorldClock};
    pub use crate::scheduler::{Registration, TickScheduler};
    pub use crate::ClockError;
}
