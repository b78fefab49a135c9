//! Counterfactual branch execution off a [`KernelSnapshot`].
//!
//! Grounded on `snapshot.rs`'s `SnapshotManager::restore` (a branch is a
//! snapshot restored into a fresh, isolated world/clock/log/bus) plus the
//! pattern of accepting a caller-supplied driver rather than hardcoding
//! tick behavior -- here generalized to an `engineFactory` closure so this
//! crate never has to know the concrete shape of whatever drives a
//! branch's ticks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use chronicle_clock::clock::WorldClock;
use chronicle_ecs::ids::{Allocators, BranchId, EntityId, EventId};
use chronicle_ecs::world::World;
use chronicle_events::bus::EventBus;
use chronicle_events::event::Event;
use chronicle_events::log::EventLog;

use crate::snapshot::{KernelSnapshot, SnapshotManager};
use crate::SaveError;

/// At most this many branches may be live at once. Checked on
/// [`BranchRunner::create_branch`]; exceeding it is a caller error, not a
/// silent eviction of an older branch.
pub const MAX_BRANCHES: usize = 16;

/// A single, named departure from recorded history, applied once at the
/// moment a branch is created.
///
/// `RemoveCharacter` and `ChangeDecision` address the entity directly
/// (`EntityId`), not through a branded `CharacterId` -- the kernel has no
/// notion of "character" beyond an entity with components attached to it,
/// and mapping a domain-level character identity to its entity is an
/// external collaborator's concern, not this crate's.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum DivergenceAction {
    /// Destroy the entity outright, as of the branch point.
    RemoveCharacter { id: EntityId },
    /// Append a fully-formed event to the branch's log as-is.
    AddEvent { event: Event },
    /// Re-seed whatever random source the branch's engine ends up using.
    DifferentSeed { seed: u64 },
    /// Shallow-merge `patch` over `entity`'s current value of the named
    /// component (or replace it outright if the entity has no current
    /// value, or `patch` is not a JSON object).
    ChangeDecision {
        entity_id: EntityId,
        component_type: String,
        patch: serde_json::Value,
    },
    /// Record a synthetic `"<subtype>.reversed"` event caused by the
    /// original, carrying `patch_data` merged over the original's data
    /// plus `{"reversed": true}`.
    ReverseOutcome {
        event_id: EventId,
        patch_data: serde_json::Value,
    },
}

/// Errors produced by branch management. Divergence application itself is
/// best-effort (a `ChangeDecision` against a component the entity doesn't
/// carry, say, is logged and skipped) -- these two variants are the only
/// ways branch *management* can fail.
#[derive(Debug, thiserror::Error)]
pub enum BranchError {
    #[error("branch limit of {MAX_BRANCHES} exceeded")]
    BranchLimitExceeded,
    #[error("branch {0} not found")]
    BranchNotFound(BranchId),
    #[error("failed to restore snapshot into branch world: {0}")]
    Restore(#[from] SaveError),
}

/// A self-contained fork of the simulation as of `source_tick`, not yet
/// (or no longer) attached to any particular tick-driving engine.
pub struct Branch {
    pub id: BranchId,
    pub source_tick: u64,
    pub clock: WorldClock,
    pub world: World,
    pub event_log: EventLog,
    pub event_bus: EventBus,
    pub seed: u64,
}

/// The outcome of running a branch forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchRunSummary {
    pub ticks_run: u32,
    pub start_tick: u64,
    pub end_tick: u64,
}

/// Something a branch can be handed off to for ticking. Implemented by
/// whatever concrete engine type a caller's `engineFactory` constructs --
/// this crate never names that type itself, matching the contract's
/// `engineFactory: F: FnOnce(World, WorldClock, EventBus, EventLog) -> E`.
pub trait BranchEngine {
    fn tick(&mut self);
    fn current_tick(&self) -> u64;
    fn into_parts(self) -> (World, WorldClock, EventBus, EventLog);
}

/// Owns every live branch, capped at [`MAX_BRANCHES`].
#[derive(Default)]
pub struct BranchRunner {
    branches: HashMap<BranchId, Branch>,
    allocator: Allocators,
}

impl BranchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn get(&self, id: BranchId) -> Option<&Branch> {
        self.branches.get(&id)
    }

    /// Restore `snapshot` into a fresh world built by `world_factory` (which
    /// must register every component type `snapshot` names, the same
    /// prerequisite `SnapshotManager::restore` documents), apply `action`,
    /// and register the result as a new branch.
    pub fn create_branch(
        &mut self,
        snapshot: &KernelSnapshot,
        world_factory: impl FnOnce() -> World,
        action: DivergenceAction,
        seed: u64,
    ) -> Result<BranchId, BranchError> {
        if self.branches.len() >= MAX_BRANCHES {
            return Err(BranchError::BranchLimitExceeded);
        }

        let mut world = world_factory();
        let (clock, mut event_log) = SnapshotManager::new().restore(&mut world, snapshot)?;
        let event_bus = EventBus::new();
        let source_tick = clock.current_tick();

        let seed = apply_divergence(&mut world, &mut event_log, action, seed, source_tick);

        let id = self.allocator.next_branch_id();
        self.branches.insert(id, Branch { id, source_tick, clock, world, event_log, event_bus, seed });
        Ok(id)
    }

    /// Hand the branch's world/clock/bus/log to an engine built by
    /// `engine_factory`, tick it `n_ticks` times, and fold the resulting
    /// state back into the branch so it can be inspected or re-run.
    pub fn run_branch<E: BranchEngine>(
        &mut self,
        id: BranchId,
        n_ticks: u32,
        engine_factory: impl FnOnce(World, WorldClock, EventBus, EventLog) -> E,
    ) -> Result<BranchRunSummary, BranchError> {
        let branch = self.branches.get_mut(&id).ok_or(BranchError::BranchNotFound(id))?;

        let world = std::mem::take(&mut branch.world);
        let clock = branch.clock;
        let bus = std::mem::take(&mut branch.event_bus);
        let log = std::mem::take(&mut branch.event_log);
        let start_tick = clock.current_tick();

        let mut engine = engine_factory(world, clock, bus, log);
        for _ in 0..n_ticks {
            engine.tick();
        }
        let end_tick = engine.current_tick();

        let (world, clock, bus, log) = engine.into_parts();
        branch.world = world;
        branch.clock = clock;
        branch.event_bus = bus;
        branch.event_log = log;

        Ok(BranchRunSummary { ticks_run: n_ticks, start_tick, end_tick })
    }

    /// Drop a branch, freeing its slot. Returns whether one was present.
    pub fn delete_branch(&mut self, id: BranchId) -> bool {
        self.branches.remove(&id).is_some()
    }
}

/// Apply a single divergence at branch-creation time, returning the seed
/// the branch should carry (overridden by `DifferentSeed`). Never fails:
/// trouble applying an action (missing entity, unregistered component) is
/// logged and the action is skipped, consistent with this kernel's
/// best-effort failure model for anything short of a validation-class
/// request.
fn apply_divergence(world: &mut World, log: &mut EventLog, action: DivergenceAction, seed: u64, source_tick: u64) -> u64 {
    match action {
        DivergenceAction::RemoveCharacter { id } => {
            if !world.destroy_entity(id) {
                warn!(entity = ?id, "RemoveCharacter divergence: entity already dead or unknown");
            }
            seed
        }
        DivergenceAction::AddEvent { event } => {
            let id = event.id;
            if let Err(err) = log.append(event) {
                warn!(event = ?id, error = %err, "AddEvent divergence: could not append event");
            }
            seed
        }
        DivergenceAction::DifferentSeed { seed: new_seed } => new_seed,
        DivergenceAction::ChangeDecision { entity_id, component_type, patch } => {
            let current = world
                .serialize_store_by_name(&component_type)
                .ok()
                .and_then(|entries| entries.into_iter().find(|(e, _)| *e == entity_id).map(|(_, v)| v));
            let merged = merge_patch(current, &patch);
            if let Err(err) = world.add_component_by_name(&component_type, entity_id, &merged) {
                warn!(entity = ?entity_id, component = %component_type, error = %err, "ChangeDecision divergence: could not apply patch");
            }
            seed
        }
        DivergenceAction::ReverseOutcome { event_id, patch_data } => {
            let Some(original) = log.get(event_id) else {
                warn!(event = ?event_id, "ReverseOutcome divergence: original event not found");
                return seed;
            };
            let mut data = original.data.clone();
            if let serde_json::Value::Object(overlay) = &patch_data {
                for (k, v) in overlay {
                    data.insert(k.clone(), v.clone());
                }
            }
            data.insert("reversed".to_owned(), serde_json::Value::Bool(true));

            let new_id = world.allocators_mut().next_entity_id();
            let new_event = Event::new(
                chronicle_ecs::ids::to_event_id(new_id),
                original.category,
                format!("{}.reversed", original.subtype),
                source_tick,
                original.participants.clone(),
                original.significance,
                vec![],
            )
            .with_data(data);
            let new_event_id = new_event.id;
            if log.append(new_event).is_ok() {
                log.link_cause(event_id, new_event_id);
            } else {
                warn!(event = ?new_event_id, "ReverseOutcome divergence: could not append reversal event");
            }
            seed
        }
    }
}

fn merge_patch(current: Option<serde_json::Value>, patch: &serde_json::Value) -> serde_json::Value {
    match (current, patch) {
        (Some(serde_json::Value::Object(mut base)), serde_json::Value::Object(overlay)) => {
            for (k, v) in overlay {
                base.insert(k.clone(), v.clone());
            }
            serde_json::Value::Object(base)
        }
        _ => patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_ecs::component::Component;
    use chronicle_ecs::ids::{to_event_id, EntityId};
    use chronicle_events::category::EventCategory;
    use serde::{Deserialize as De, Serialize as Se};

    #[derive(Debug, Clone, Se, De)]
    struct Position {
        x: i32,
        y: i32,
    }
    impl Component for Position {}

    fn seeded_world() -> World {
        let mut world = World::new();
        world.register_component::<Position>("Position");
        let e0 = world.create_entity();
        world.add_component(e0, Position { x: 1, y: 2 }).unwrap();
        world
    }

    fn template() -> World {
        let mut w = World::new();
        w.register_component::<Position>("Position");
        w
    }

    #[test]
    fn create_branch_restores_snapshot_and_applies_divergence() {
        let world = seeded_world();
        let clock = WorldClock::new();
        let log = EventLog::new();
        let snapshot = SnapshotManager::new().capture(&world, &clock, &log);

        let mut runner = BranchRunner::new();
        let id = runner
            .create_branch(&snapshot, template, DivergenceAction::RemoveCharacter { id: EntityId::from_raw(0) }, 7)
            .unwrap();

        let branch = runner.get(id).unwrap();
        assert!(!branch.world.is_alive(EntityId::from_raw(0)));
        assert_eq!(branch.seed, 7);
    }

    #[test]
    fn different_seed_overrides_initial_seed() {
        let world = seeded_world();
        let clock = WorldClock::new();
        let log = EventLog::new();
        let snapshot = SnapshotManager::new().capture(&world, &clock, &log);

        let mut runner = BranchRunner::new();
        let id = runner.create_branch(&snapshot, template, DivergenceAction::DifferentSeed { seed: 99 }, 1).unwrap();
        assert_eq!(runner.get(id).unwrap().seed, 99);
    }

    #[test]
    fn branch_limit_is_enforced() {
        let world = seeded_world();
        let clock = WorldClock::new();
        let log = EventLog::new();
        let snapshot = SnapshotManager::new().capture(&world, &clock, &log);

        let mut runner = BranchRunner::new();
        for _ in 0..MAX_BRANCHES {
            runner.create_branch(&snapshot, template, DivergenceAction::DifferentSeed { seed: 1 }, 1).unwrap();
        }
        let err = runner.create_branch(&snapshot, template, DivergenceAction::DifferentSeed { seed: 1 }, 1).unwrap_err();
        assert!(matches!(err, BranchError::BranchLimitExceeded));
    }

    #[test]
    fn reverse_outcome_appends_linked_event() {
        let mut world = seeded_world();
        let mut clock = WorldClock::new();
        clock.advance_by(5).unwrap();
        let mut log = EventLog::new();
        let original = Event::new(to_event_id(EntityId::from_raw(1)), EventCategory::Political, "political.coup", 3, vec![], 60, vec![]);
        let original_id = original.id;
        log.append(original).unwrap();
        let snapshot = SnapshotManager::new().capture(&world, &clock, &log);
        drop((&mut world, &mut clock));

        let mut runner = BranchRunner::new();
        let id = runner
            .create_branch(
                &snapshot,
                template,
                DivergenceAction::ReverseOutcome {
                    event_id: original_id,
                    patch_data: serde_json::json!({"outcome": "failed"}),
                },
                1,
            )
            .unwrap();

        let branch = runner.get(id).unwrap();
        let reversed = branch.event_log.get_all().find(|e| e.subtype == "political.coup.reversed").unwrap();
        assert_eq!(reversed.causes, vec![original_id]);
        assert_eq!(reversed.data.get("outcome").unwrap(), "failed");
        assert_eq!(reversed.data.get("reversed").unwrap(), true);
    }

    #[test]
    fn delete_branch_frees_its_slot() {
        let world = seeded_world();
        let clock = WorldClock::new();
        let log = EventLog::new();
        let snapshot = SnapshotManager::new().capture(&world, &clock, &log);

        let mut runner = BranchRunner::new();
        let id = runner.create_branch(&snapshot, template, DivergenceAction::DifferentSeed { seed: 1 }, 1).unwrap();
        assert!(runner.delete_branch(id));
        assert!(!runner.delete_branch(id));
        assert_eq!(runner.len(), 0);
    }
}
