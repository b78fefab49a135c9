//! Deep-copy world/clock/log snapshots for rollback and branching.
//!
//! Restoring validates the incoming snapshot against the live world's
//! registered component types before mutating anything, so a bad restore
//! fails clean rather than leaving the world half-overwritten. Component
//! stores are walked in sorted, name-addressed order for determinism.
//! `KernelSnapshot` carries the world, the clock, the event log, and a
//! `blake3` content hash of the whole, so two independently-built runtimes
//! fed the same seed and input can be compared byte-for-byte.

use chronicle_clock::clock::WorldClock;
use chronicle_ecs::ids::{EntityId, SnapshotId};
use chronicle_ecs::world::World;
use chronicle_events::event::Event;
use chronicle_events::log::EventLog;
use serde::{Deserialize, Serialize};

use crate::SaveError;

/// One (entity, data) pair within a single component type's store, as it
/// appears inside a snapshot or save file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEntry {
    pub entity_id: EntityId,
    pub data: serde_json::Value,
}

/// Every (entity, data) pair for one registered component type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentTypeSnapshot {
    #[serde(rename = "type")]
    pub type_name: String,
    pub entries: Vec<ComponentEntry>,
}

/// A deep, serializable copy of world + clock + event-log state at a point
/// in time, plus a `blake3` hex digest of its own canonical encoding.
/// Orthogonal to save files: snapshots live in memory and back branches and
/// rollback, never written to disk directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelSnapshot {
    pub id: SnapshotId,
    pub tick: u64,
    pub registered_types: Vec<String>,
    pub max_entity_id: u32,
    pub alive_entity_ids: Vec<EntityId>,
    pub components: Vec<ComponentTypeSnapshot>,
    pub events: Vec<Event>,
    pub content_hash: String,
}

/// Payload hashed to produce [`KernelSnapshot::content_hash`] -- everything
/// in `KernelSnapshot` except the hash field itself and the id (two
/// snapshots of identical world state taken at different points mint
/// different ids but must hash identically for the determinism checks in
/// §8 (T-8) to compare them).
#[derive(Serialize)]
struct Hashable<'a> {
    tick: u64,
    registered_types: &'a [String],
    max_entity_id: u32,
    alive_entity_ids: &'a [EntityId],
    components: &'a [ComponentTypeSnapshot],
    events: &'a [Event],
}

impl KernelSnapshot {
    fn content_hash(
        tick: u64,
        registered_types: &[String],
        max_entity_id: u32,
        alive_entity_ids: &[EntityId],
        components: &[ComponentTypeSnapshot],
        events: &[Event],
    ) -> String {
        let hashable = Hashable { tick, registered_types, max_entity_id, alive_entity_ids, components, events };
        let bytes = serde_json::to_vec(&hashable).expect("snapshot payload is always serializable");
        blake3::hash(&bytes).to_hex().to_string()
    }
}

/// Mints [`SnapshotId`]s and captures/restores [`KernelSnapshot`]s.
///
/// Keeps its own monotonic id counter rather than minting through the
/// world's `Allocators`, so `capture` only ever needs a shared `&World`
/// reference -- matching the contract's `capture(&World, &Clock, &EventLog)`
/// signature exactly, with no hidden `&mut` requirement.
#[derive(Debug, Default)]
pub struct SnapshotManager {
    next_id: u32,
}

/// Every (component-type-name, entries) pair for `world`'s current state,
/// each entry list sorted by entity id for deterministic output. Shared by
/// [`SnapshotManager::capture`] and the save manager's full-save path so
/// both serialize components the same way.
pub(crate) fn collect_components(world: &World) -> (Vec<String>, Vec<ComponentTypeSnapshot>) {
    let registered_types: Vec<String> = world.registered_type_names().into_iter().map(str::to_owned).collect();
    let mut components = Vec::with_capacity(registered_types.len());
    for type_name in &registered_types {
        let mut entries: Vec<ComponentEntry> = world
            .serialize_store_by_name(type_name)
            .expect("type_name was just read from the world's own registry")
            .into_iter()
            .map(|(entity_id, data)| ComponentEntry { entity_id, data })
            .collect();
        entries.sort_by_key(|e| e.entity_id.to_raw());
        components.push(ComponentTypeSnapshot { type_name: type_name.clone(), entries });
    }
    (registered_types, components)
}

/// Repopulate `world` in place from a (registered-types, max-entity-id,
/// alive-entity-ids, components) tuple -- the shared entity/component half
/// of [`SnapshotManager::restore`], reused by the save manager so a
/// [`crate::save::FullSavePayload`] and a reconstructed incremental save
/// rebuild a world the exact same way a [`KernelSnapshot`] does.
///
/// `world` must already have every named type registered; entities are
/// re-created `0..max_entity_id` in order and the ones absent from
/// `alive_entity_ids` are then destroyed, reproducing id alignment exactly.
pub(crate) fn restore_world(
    world: &mut World,
    registered_types: &[String],
    max_entity_id: u32,
    alive_entity_ids: &[EntityId],
    components: &[ComponentTypeSnapshot],
) -> Result<(), SaveError> {
    for type_name in registered_types {
        if !world.registered_type_names().contains(&type_name.as_str()) {
            return Err(SaveError::UnknownComponentType(type_name.clone()));
        }
    }

    for entity in world.get_all_entities() {
        world.destroy_entity(entity);
    }
    world.allocators_mut().reset_entities();

    let alive: std::collections::HashSet<EntityId> = alive_entity_ids.iter().copied().collect();
    let mut created = Vec::with_capacity(max_entity_id as usize);
    for _ in 0..max_entity_id {
        created.push(world.create_entity());
    }
    for entity in &created {
        if !alive.contains(entity) {
            world.destroy_entity(*entity);
        }
    }

    for component in components {
        for entry in &component.entries {
            world.add_component_by_name(&component.type_name, entry.entity_id, &entry.data)?;
        }
    }

    Ok(())
}

impl SnapshotManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_id(&mut self) -> SnapshotId {
        let id = SnapshotId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    /// Deep-copy `world`, `clock`, and `log` into a self-contained snapshot.
    pub fn capture(&mut self, world: &World, clock: &WorldClock, log: &EventLog) -> KernelSnapshot {
        let (registered_types, components) = collect_components(world);

        let mut alive_entity_ids = world.get_all_entities();
        alive_entity_ids.sort_by_key(EntityId::to_raw);

        let events: Vec<Event> = log.get_all().cloned().collect();
        let tick = clock.current_tick();
        let max_entity_id = world.allocators().entity_cursor();

        let content_hash = KernelSnapshot::content_hash(tick, &registered_types, max_entity_id, &alive_entity_ids, &components, &events);

        KernelSnapshot {
            id: self.mint_id(),
            tick,
            registered_types,
            max_entity_id,
            alive_entity_ids,
            components,
            events,
            content_hash,
        }
    }

    /// Reconstruct clock and event-log state from `snapshot`, repopulating
    /// `world` in place. `world` must already have every component type in
    /// `snapshot.registered_types` registered -- a brand-new `World` has no
    /// compile-time knowledge of what `T` to register for a name read off
    /// disk, so the caller supplies an already-typed template rather than
    /// this function fabricating one.
    ///
    /// Entities are re-created `0..max_entity_id` in order and the ones
    /// absent from `alive_entity_ids` are then destroyed, reproducing id
    /// alignment exactly as the full-save load path does.
    pub fn restore(&self, world: &mut World, snapshot: &KernelSnapshot) -> Result<(WorldClock, EventLog), SaveError> {
        restore_world(world, &snapshot.registered_types, snapshot.max_entity_id, &snapshot.alive_entity_ids, &snapshot.components)?;

        let mut clock = WorldClock::new();
        clock
            .set_tick(snapshot.tick as i64)
            .expect("a snapshot's tick was captured from a live clock and is never negative");

        let mut log = EventLog::new();
        for event in &snapshot.events {
            log.append(event.clone()).map_err(|err| SaveError::CorruptSave(err.to_string()))?;
        }

        Ok((clock, log))
    }
}
