//! Tick scheduler: maps subsystem names onto [`TickFrequency`] cadences
//! with an optional offset so subsystems sharing a frequency don't all
//! fire on the same tick.
//!
//! The scheduler itself does not run anything -- it only answers "which
//! subsystems are eligible on tick `t`". Execution order among the
//! eligible set is a property of the caller (the kernel's `Subsystem`
//! registry sorts by `execution_order`, not by anything here).

use std::collections::BTreeMap;

use crate::clock::TickFrequency;

/// A subsystem's scheduling registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub frequency: TickFrequency,
    pub offset: u32,
}

/// `subsystemName -> { frequency, offset }`, kept in a `BTreeMap` so
/// iteration (used by `get_systems_for_tick`) is alphabetical and
/// deterministic regardless of registration order.
#[derive(Debug, Clone, Default)]
pub struct TickScheduler {
    registrations: BTreeMap<String, Registration>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) `name`'s cadence.
    pub fn register(&mut self, name: &str, frequency: TickFrequency, offset: u32) {
        self.registrations.insert(name.to_owned(), Registration { frequency, offset });
    }

    /// Remove `name`'s registration. Idempotent: unregistering an unknown
    /// name is not an error.
    pub fn unregister(&mut self, name: &str) {
        self.registrations.remove(name);
    }

    pub fn registration(&self, name: &str) -> Option<Registration> {
        self.registrations.get(name).copied()
    }

    /// `(tick - offset) mod frequency == 0`, and only true if the
    /// registration exists and `tick >= offset` (a subsystem never runs
    /// before its offset).
    pub fn should_run(&self, name: &str, tick: u64) -> bool {
        match self.registrations.get(name) {
            Some(reg) => should_run_at(tick, reg.offset, reg.frequency),
            None => false,
        }
    }

    /// Names of every registered subsystem eligible to run on `tick`, in
    /// alphabetical (registration-map) order. Callers that care about
    /// `executionOrder` re-sort; this only answers eligibility.
    pub fn get_systems_for_tick(&self, tick: u64) -> Vec<&str> {
        self.registrations
            .iter()
            .filter(|(_, reg)| should_run_at(tick, reg.offset, reg.frequency))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Restore the default registration table. Deterministic and
    /// idempotent, but the exact subsystem names are illustrative
    /// scheduling slots for external collaborators (character AI,
    /// diplomacy, migration, influence, ...) -- the kernel itself never
    /// executes them.
    pub fn reset(&mut self) {
        self.registrations.clear();
        for (name, frequency, offset) in default_registrations() {
            self.registrations.insert(name.to_owned(), Registration { frequency, offset });
        }
    }
}

fn should_run_at(tick: u64, offset: u32, frequency: TickFrequency) -> bool {
    let offset = offset as u64;
    tick >= offset && (tick - offset) % frequency.ticks() == 0
}

/// The default 27-subsystem, six-tier table `reset()` restores.
fn default_registrations() -> [(&'static str, TickFrequency, u32); 27] {
    use TickFrequency::*;
    [
        ("daily.weather", Daily, 0),
        ("daily.needs", Daily, 0),
        ("daily.patrol", Daily, 0),
        ("daily.market_ticks", Daily, 0),
        ("daily.health_decay", Daily, 0),
        ("weekly.rumor_spread", Weekly, 0),
        ("weekly.labor_allocation", Weekly, 1),
        ("weekly.training", Weekly, 2),
        ("weekly.patrol_rotation", Weekly, 3),
        ("monthly.census", Monthly, 0),
        ("monthly.taxation", Monthly, 5),
        ("monthly.migration", Monthly, 10),
        ("monthly.faction_relations", Monthly, 15),
        ("monthly.construction", Monthly, 20),
        ("seasonal.harvest", Seasonal, 0),
        ("seasonal.festival", Seasonal, 30),
        ("seasonal.trade_routes", Seasonal, 45),
        ("seasonal.diplomacy", Seasonal, 60),
        ("annual.succession", Annual, 0),
        ("annual.population_growth", Annual, 60),
        ("annual.arc_review", Annual, 120),
        ("annual.site_growth", Annual, 180),
        ("annual.religion_shift", Annual, 240),
        ("decadal.dynasty_audit", Decadal, 0),
        ("decadal.cartography", Decadal, 900),
        ("decadal.historical_review", Decadal, 1800),
        ("decadal.legend_formation", Decadal, 2700),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_run_matches_offset_plus_multiples_of_frequency() {
        let mut sched = TickScheduler::new();
        sched.register("census", TickFrequency::Monthly, 5);
        for t in 0..200u64 {
            let expected = t >= 5 && (t - 5) % 30 == 0;
            assert_eq!(sched.should_run("census", t), expected, "tick {t}");
        }
    }

    #[test]
    fn unknown_subsystem_never_runs() {
        let sched = TickScheduler::new();
        assert!(!sched.should_run("nonexistent", 0));
    }

    #[test]
    fn register_overwrites_existing() {
        let mut sched = TickScheduler::new();
        sched.register("x", TickFrequency::Daily, 0);
        assert!(sched.should_run("x", 5));
        sched.register("x", TickFrequency::Weekly, 0);
        assert!(!sched.should_run("x", 5));
        assert!(sched.should_run("x", 7));
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut sched = TickScheduler::new();
        sched.unregister("nope");
        sched.register("x", TickFrequency::Daily, 0);
        sched.unregister("x");
        sched.unregister("x");
        assert!(!sched.should_run("x", 0));
    }

    #[test]
    fn get_systems_for_tick_filters_to_eligible() {
        let mut sched = TickScheduler::new();
        sched.register("a", TickFrequency::Daily, 0);
        sched.register("b", TickFrequency::Weekly, 0);
        let names = sched.get_systems_for_tick(7);
        assert_eq!(names, vec!["a", "b"]);
        let names = sched.get_systems_for_tick(1);
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn reset_restores_default_table_deterministically() {
        let mut sched = TickScheduler::new();
        sched.reset();
        let first: Vec<&str> = sched.get_systems_for_tick(0);
        sched.register("extra", TickFrequency::Daily, 0);
        sched.reset();
        let second: Vec<&str> = sched.get_systems_for_tick(0);
        assert_eq!(first, second);
        assert_eq!(sched.registrations.len(), 27);
    }

    #[test]
    fn no_two_monthly_defaults_collide_on_the_same_tick() {
        let mut sched = TickScheduler::new();
        sched.reset();
        for t in 0..300u64 {
            let monthly: Vec<&str> = sched
                .get_systems_for_tick(t)
                .into_iter()
                .filter(|n| n.starts_with("monthly."))
                .collect();
            assert!(monthly.len() <= 1, "tick {t} fired {monthly:?}");
        }
    }
}
