//! A tiny runnable world: a weather subsystem that occasionally triggers a
//! famine, left to cascade through the dampening tables. Run with
//! `RUST_LOG=info cargo run -p chronicle-kernel --example simulate`.

use std::sync::atomic::{AtomicU32, Ordering};

use chronicle_kernel::prelude::*;

struct Weather {
    counter: AtomicU32,
}

impl Subsystem for Weather {
    fn name(&self) -> &str {
        "weather"
    }

    fn frequency(&self) -> TickFrequency {
        TickFrequency::Seasonal
    }

    fn execution_order(&self) -> i32 {
        0
    }

    fn execute(&mut self, world: &mut World, clock: &WorldClock, bus: &EventBus) {
        let raw = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = to_event_id(to_entity_id(world.allocators().entity_cursor() + raw + 1_000_000));

        let drought_causes_famine = ConsequenceRule {
            event_subtype: "economic.famine".to_string(),
            base_probability: 0.4,
            category: EventCategory::Economic,
            delay_ticks: 30,
            dampening: 0.2,
        };

        let event = Event::new(id, EventCategory::Disaster, "disaster.drought", clock.current_tick(), vec![], 60, vec![drought_causes_famine]);
        bus.emit(&event);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let mut runtime = WorldRuntime::new(World::new(), seeded_random_fn(42));
    runtime.register_subsystem(Box::new(Weather { counter: AtomicU32::new(0) }));

    for report in runtime.run_ticks(3650) {
        if report.cascade_events_generated > 0 {
            tracing::info!(tick = report.tick, fired = report.cascade_events_generated, "cascade produced new events");
        }
    }

    tracing::info!(ticks = runtime.current_tick(), events = runtime.event_count(), "simulation finished");
}
