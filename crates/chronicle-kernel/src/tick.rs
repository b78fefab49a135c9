//! The world runtime: the single-threaded tick-pipeline driver that owns
//! every live piece of a running simulation and advances them together.
//!
//! Each tick: the scheduler selects eligible subsystems, which run in
//! `execution_order` and mutate the world and emit on the bus; emitted
//! events are admitted into the event log and offered to the cascade
//! engine for consequence scheduling; the cascade engine resolves every
//! consequence due this tick, recursing within the tick until it
//! stabilizes; the clock advances last.
//!
//! Structured as an owning driver exposing a single `tick(&mut self)`,
//! built around a fixed per-tick pipeline: run systems, apply their
//! effects, advance the counter. Subsystems are registered as an
//! object-safe [`Subsystem`] trait rather than compiled-in closures,
//! since this kernel's subsystems (character AI, diplomacy, migration,
//! ...) are external collaborators registered at runtime rather than
//! closures known when this crate is built.
//!
//! # Example
//!
//! ```
//! use chronicle_kernel::tick::{Subsystem, WorldRuntime};
//! use chronicle_clock::clock::TickFrequency;
//! use chronicle_ecs::world::World;
//! use chronicle_events::bus::EventBus;
//!
//! struct Heartbeat;
//! impl Subsystem for Heartbeat {
//!     fn name(&self) -> &str { "heartbeat" }
//!     fn frequency(&self) -> TickFrequency { TickFrequency::Daily }
//!     fn execution_order(&self) -> i32 { 0 }
//!     fn execute(&mut self, _world: &mut World, _clock: &chronicle_clock::clock::WorldClock, _bus: &EventBus) {}
//! }
//!
//! let mut runtime = WorldRuntime::new(World::new(), Box::new(|| 0.5));
//! runtime.register_subsystem(Box::new(Heartbeat));
//! runtime.tick();
//! assert_eq!(runtime.current_tick(), 1);
//! ```

use std::sync::{Arc, Mutex};

use tracing::warn;

use chronicle_cascade::prelude::{CascadeEngine, RandomFn};
use chronicle_clock::clock::{TickFrequency, WorldClock};
use chronicle_clock::scheduler::TickScheduler;
use chronicle_ecs::world::World;
use chronicle_events::bus::EventBus;
use chronicle_events::event::Event;
use chronicle_events::log::EventLog;
use chronicle_persist::prelude::{KernelSnapshot, SnapshotManager};

// ---------------------------------------------------------------------------
// Subsystem
// ---------------------------------------------------------------------------

/// One unit of tick-scoped simulation logic. The kernel never defines
/// what a subsystem does, only when and in what order it runs: each
/// subsystem is an external collaborator registered at runtime via
/// [`WorldRuntime::register_subsystem`].
pub trait Subsystem {
    /// Stable name, also used as the subsystem's key in the
    /// [`TickScheduler`].
    fn name(&self) -> &str;
    /// How often this subsystem is eligible to run.
    fn frequency(&self) -> TickFrequency;
    /// Lower runs first within a tick; ties break on registration order.
    fn execution_order(&self) -> i32;
    /// Mutate the world and/or emit events for this tick.
    fn execute(&mut self, world: &mut World, clock: &WorldClock, bus: &EventBus);
    /// Run once immediately after `execute`, for per-tick scratch state.
    fn cleanup(&mut self) {}
}

struct Registered {
    subsystem: Box<dyn Subsystem>,
    registration_order: usize,
}

// ---------------------------------------------------------------------------
// KernelErrorKind / TickReport
// ---------------------------------------------------------------------------

/// What kind of best-effort trouble `kernel_error_hook` is being told
/// about. Never surfaced as a `Result` -- this exists purely for
/// observability, the Rust realization of `onKernelError(kind, context)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelErrorKind {
    /// A subsystem panicked during `execute`; the tick was aborted.
    SubsystemPanicked,
    /// An emitted event could not be admitted into the log (e.g. a
    /// colliding id).
    EventAdmissionFailed,
}

/// Diagnostics for the most recently completed tick: what ran and what
/// it produced, with no per-system wall-clock timings (this kernel makes
/// no performance claims; it only reports what happened).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub subsystems_run: Vec<String>,
    pub events_admitted: u64,
    pub cascade_events_generated: u64,
    pub aborted: bool,
}

// ---------------------------------------------------------------------------
// WorldRuntime
// ---------------------------------------------------------------------------

/// Owns `World`, `WorldClock`, `EventLog`, `EventBus`, `CascadeEngine`,
/// and `TickScheduler` by value and drives them forward one tick at a
/// time. The whole pipeline runs on the caller's thread; there is no
/// internal concurrency.
///
/// `log` and `cascade` are held behind `Arc<Mutex<_>>` rather than owned
/// outright, because `WorldRuntime` registers its own admission handler
/// on `bus` at construction time (the bridge the data-flow description
/// calls "handlers write to Log, cascade.processEvent() schedules
/// consequences") and `EventBus` requires handlers to be `Send`. The
/// kernel is single-threaded in practice -- the mutex is never
/// contended -- but the bus's `Send` bound has to be satisfied at the
/// type level regardless, so an `Rc<RefCell<_>>` (the bus's own internal
/// choice for its handler tables) will not compile here.
pub struct WorldRuntime {
    world: World,
    clock: WorldClock,
    bus: EventBus,
    log: Arc<Mutex<EventLog>>,
    cascade: Arc<Mutex<CascadeEngine>>,
    scheduler: TickScheduler,
    subsystems: Vec<Registered>,
    next_registration_order: usize,
    last_report: TickReport,
    #[allow(clippy::type_complexity)]
    kernel_error_hook: Option<Box<dyn FnMut(KernelErrorKind, &str) + Send>>,
}

impl WorldRuntime {
    /// Build a runtime over `world` (already registered with every
    /// component type the caller's subsystems need), seeding the cascade
    /// engine's random source with `random_fn`. Installs the default
    /// illustrative scheduling table (§6) so subsystems that share a
    /// name with one of its slots inherit that cadence and offset unless
    /// `register_subsystem` is told otherwise.
    pub fn new(world: World, random_fn: RandomFn) -> Self {
        let log = Arc::new(Mutex::new(EventLog::new()));
        let cascade = Arc::new(Mutex::new(CascadeEngine::new(random_fn)));
        let bus = EventBus::new();

        let admission_log = Arc::clone(&log);
        let admission_cascade = Arc::clone(&cascade);
        bus.on_any(move |event: &Event| {
            // `try_lock` rather than `lock`: when this emission originates
            // from `CascadeEngine::resolve_tick` (which holds this same
            // mutex across its own `log.append` + `bus.emit` sequence),
            // the event is already being admitted by that caller directly
            // -- contention here means "already handled," not "wait."
            let mut log = match admission_log.try_lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            if log.contains(event.id) {
                // Already in the log -- this is a cascade-fired event
                // re-broadcasting through the same bus; resolve_tick
                // already admitted and scheduled it directly.
                return;
            }
            if let Err(err) = log.append(event.clone()) {
                warn!(event = ?event.id, error = %err, "could not admit emitted event into the log");
                return;
            }
            drop(log);
            admission_cascade.lock().expect("cascade engine mutex poisoned").process_event(event, event.timestamp, 0);
        });

        let mut scheduler = TickScheduler::new();
        scheduler.reset();

        Self {
            world,
            clock: WorldClock::new(),
            bus,
            log,
            cascade,
            scheduler,
            subsystems: Vec::new(),
            next_registration_order: 0,
            last_report: TickReport::default(),
            kernel_error_hook: None,
        }
    }

    /// Install `onKernelError`. Replaces any previously installed hook.
    pub fn set_kernel_error_hook(&mut self, hook: impl FnMut(KernelErrorKind, &str) + Send + 'static) {
        self.kernel_error_hook = Some(Box::new(hook));
    }

    fn report_kernel_error(&mut self, kind: KernelErrorKind, context: &str) {
        if let Some(hook) = self.kernel_error_hook.as_mut() {
            hook(kind, context);
        }
    }

    /// Register a subsystem. If the scheduler has no registration under
    /// this name yet (neither from the default table nor a prior call),
    /// one is created from `subsystem.frequency()` at offset zero;
    /// callers that need a specific offset should follow up with
    /// `scheduler_mut().register(..)`.
    pub fn register_subsystem(&mut self, subsystem: Box<dyn Subsystem>) {
        let name = subsystem.name().to_owned();
        if self.scheduler.registration(&name).is_none() {
            self.scheduler.register(&name, subsystem.frequency(), 0);
        }
        let registration_order = self.next_registration_order;
        self.next_registration_order += 1;
        self.subsystems.push(Registered { subsystem, registration_order });
    }

    pub fn subsystem_count(&self) -> usize {
        self.subsystems.len()
    }

    pub fn current_tick(&self) -> u64 {
        self.clock.current_tick()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn clock(&self) -> &WorldClock {
        &self.clock
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn scheduler_mut(&mut self) -> &mut TickScheduler {
        &mut self.scheduler
    }

    pub fn event_count(&self) -> usize {
        self.log.lock().expect("event log mutex poisoned").get_count()
    }

    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }

    /// A self-contained, content-hashed copy of the current world, clock,
    /// and log -- the same snapshot type `tick()` uses internally for
    /// its transactional boundary, exposed for callers that want their
    /// own rollback points (e.g. the branch runner).
    pub fn capture_snapshot(&self) -> KernelSnapshot {
        let log = self.log.lock().expect("event log mutex poisoned");
        SnapshotManager::new().capture(&self.world, &self.clock, &log)
    }

    /// Advance the simulation by one tick. Returns a report of what ran.
    ///
    /// A tick either commits in full (clock advanced, log appended,
    /// cascade consumed) or aborts entirely, restoring the pre-tick
    /// state -- but only when a fatal condition is actually reachable:
    /// with no subsystems registered nothing can mutate the world, so
    /// there is nothing to protect and the snapshot is skipped.
    pub fn tick(&mut self) -> TickReport {
        let tick = self.current_tick();
        let fatal_reachable = !self.subsystems.is_empty();
        let pre_tick_snapshot = if fatal_reachable { Some(self.capture_snapshot()) } else { None };

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.run_subsystems_and_cascade(tick)));

        let report = match outcome {
            Ok(report) => {
                self.clock.advance();
                report
            }
            Err(payload) => {
                let cause = panic_message(&payload);
                warn!(tick, cause = %cause, "tick aborted by subsystem panic; restoring pre-tick state");
                self.report_kernel_error(KernelErrorKind::SubsystemPanicked, &cause);
                if let Some(snapshot) = pre_tick_snapshot {
                    self.restore_from_snapshot(&snapshot);
                }
                TickReport { tick, aborted: true, ..Default::default() }
            }
        };

        self.last_report = report.clone();
        report
    }

    /// Run `n` ticks in sequence, returning every tick's report.
    pub fn run_ticks(&mut self, n: u32) -> Vec<TickReport> {
        (0..n).map(|_| self.tick()).collect()
    }

    fn run_subsystems_and_cascade(&mut self, tick: u64) -> TickReport {
        let mut order: Vec<usize> =
            (0..self.subsystems.len()).filter(|&i| self.scheduler.should_run(self.subsystems[i].subsystem.name(), tick)).collect();
        order.sort_by_key(|&i| (self.subsystems[i].subsystem.execution_order(), self.subsystems[i].registration_order));

        let events_before = self.log.lock().expect("event log mutex poisoned").get_count();

        let mut subsystems_run = Vec::with_capacity(order.len());
        for i in order {
            let name = self.subsystems[i].subsystem.name().to_owned();
            self.subsystems[i].subsystem.execute(&mut self.world, &self.clock, &self.bus);
            self.subsystems[i].subsystem.cleanup();
            subsystems_run.push(name);
        }

        let cascade_result = {
            let mut log = self.log.lock().expect("event log mutex poisoned");
            let mut cascade = self.cascade.lock().expect("cascade engine mutex poisoned");
            cascade.resolve_tick(tick, &mut log, &self.bus, self.world.allocators_mut())
        };

        let events_after = self.log.lock().expect("event log mutex poisoned").get_count();
        let events_admitted = (events_after - events_before) as u64 - cascade_result.events_generated;

        TickReport {
            tick,
            subsystems_run,
            events_admitted,
            cascade_events_generated: cascade_result.events_generated,
            aborted: false,
        }
    }

    fn restore_from_snapshot(&mut self, snapshot: &KernelSnapshot) {
        match SnapshotManager::new().restore(&mut self.world, snapshot) {
            Ok((clock, log)) => {
                self.clock = clock;
                *self.log.lock().expect("event log mutex poisoned") = log;
            }
            Err(err) => {
                warn!(error = %err, "failed to restore pre-tick snapshot after fatal tick abort; world state may be inconsistent");
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "subsystem panicked with a non-string payload".to_owned())
}
