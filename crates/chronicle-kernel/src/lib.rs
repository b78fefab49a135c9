//! Chronicle Kernel -- the world-history simulation driver.
//!
//! This crate is the top of the stack: it owns a [`chronicle_ecs::World`],
//! a [`chronicle_clock::WorldClock`], an [`chronicle_events::EventBus`], an
//! [`chronicle_events::EventLog`] and a [`chronicle_cascade::CascadeEngine`],
//! and drives them through one tick at a time via [`tick::WorldRuntime`].
//! External collaborators plug their domain logic in as [`tick::Subsystem`]
//! implementations; this crate never hard-codes what a "war" or a "famine"
//! is, only the pipeline that lets subsystems raise events and lets events
//! cascade into further events.
//!
//! # Quick Start
//!
//! ```
//! use chronicle_kernel::prelude::*;
//!
//! struct Census;
//!
//! impl Subsystem for Census {
//!     fn name(&self) -> &str {
//!         "census"
//!     }
//!
//!     fn frequency(&self) -> TickFrequency {
//!         TickFrequency::Annual
//!     }
//!
//!     fn execution_order(&self) -> i32 {
//!         0
//!     }
//!
//!     fn execute(&mut self, _world: &mut World, _clock: &WorldClock, _bus: &EventBus) {
//!         // population bookkeeping here
//!     }
//! }
//!
//! let mut runtime = WorldRuntime::new(World::new(), Box::new(|| 0.5));
//! runtime.register_subsystem(Box::new(Census));
//! let report = runtime.tick();
//! assert_eq!(report.tick, 0);
//! assert_eq!(runtime.current_tick(), 1);
//! ```

#![deny(unsafe_code)]

pub mod tick;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for building and driving a [`tick::WorldRuntime`].
pub mod prelude {
    pub use chronicle_cascade::prelude::*;
    pub use chronicle_clock::prelude::*;
    pub use chronicle_ecs::prelude::*;
    pub use chronicle_events::prelude::*;

    pub use crate::tick::{KernelErrorKind, Subsystem, TickReport, WorldRuntime};
}
