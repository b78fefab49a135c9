//! Save manager: full and incremental save files, explicit dirty tracking,
//! and periodic auto-save.
//!
//! Built on the same `World`/`EventLog` serialization helpers
//! [`crate::snapshot`] uses, extended with the file-layout and rotation
//! rules long-term, on-disk storage needs on top of a pure in-memory
//! snapshot.

use std::collections::HashSet;

use chronicle_clock::clock::WorldClock;
use chronicle_ecs::ids::{EntityId, SaveId};
use chronicle_ecs::world::World;
use chronicle_events::event::Event;
use chronicle_events::log::EventLog;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::snapshot::{collect_components, restore_world, ComponentEntry, ComponentTypeSnapshot};
use crate::storage::SaveStorage;
use crate::SaveError;

pub const CURRENT_VERSION: u32 = 1;
const AUTOSAVE_SLOTS: u32 = 5;
const AUTOSAVE_INTERVAL_YEARS: u64 = 10;
const AUTOSAVE_FULL_THRESHOLD_YEARS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMetadata {
    pub name: String,
    pub description: String,
    pub world_age: u64,
    pub seed: u64,
    pub created_at: u64,
    pub is_incremental: bool,
    pub entity_count: usize,
    pub event_count: usize,
}

/// `{id, version, metadata}` sidecar, written alongside the `.aet` payload
/// for fast listing without decompressing the full document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSidecar {
    pub id: SaveId,
    pub version: u32,
    pub metadata: SaveMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSavePayload {
    pub version: u32,
    pub metadata: SaveMetadata,
    pub tick: u64,
    pub registered_types: Vec<String>,
    pub max_entity_id: u32,
    pub alive_entity_ids: Vec<EntityId>,
    pub components: Vec<ComponentTypeSnapshot>,
    pub events: Vec<Event>,
}

/// A single component's serialized value on one entity, as it appears
/// inside an incremental save's `changedEntities` delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentValue {
    #[serde(rename = "type")]
    pub type_name: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedEntity {
    pub entity_id: EntityId,
    pub components: Vec<ComponentValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalSavePayload {
    pub version: u32,
    pub metadata: SaveMetadata,
    pub base_save_id: SaveId,
    pub base_tick: u64,
    pub current_tick: u64,
    pub changed_entities: Vec<ChangedEntity>,
    pub destroyed_entity_ids: Vec<EntityId>,
    pub new_entity_ids: Vec<EntityId>,
    pub new_events: Vec<Event>,
}

/// Either save variant, as read back from storage. `SaveManager::load`
/// dispatches on `metadata.is_incremental` rather than a third wrapper
/// field, so the wire shape for each variant matches the normative layout
/// exactly with nothing extra tacked on.
#[derive(Debug, Clone)]
pub enum LoadedSave {
    Full(FullSavePayload),
    Incremental(IncrementalSavePayload),
}

/// Merge a full save's components with an incremental save's delta,
/// producing the (registered-types, max-entity-id, alive-entity-ids,
/// components) tuple [`restore_world`] needs to rebuild the merged world.
fn merge_incremental(
    base: &FullSavePayload,
    delta: &IncrementalSavePayload,
) -> (Vec<String>, u32, Vec<EntityId>, Vec<ComponentTypeSnapshot>) {
    use std::collections::BTreeMap;

    let mut by_type: BTreeMap<String, BTreeMap<u32, serde_json::Value>> = BTreeMap::new();
    for snapshot in &base.components {
        let entries = by_type.entry(snapshot.type_name.clone()).or_default();
        for entry in &snapshot.entries {
            entries.insert(entry.entity_id.to_raw(), entry.data.clone());
        }
    }

    for destroyed in &delta.destroyed_entity_ids {
        for entries in by_type.values_mut() {
            entries.remove(&destroyed.to_raw());
        }
    }

    for changed in &delta.changed_entities {
        for component in &changed.components {
            by_type.entry(component.type_name.clone()).or_default().insert(changed.entity_id.to_raw(), component.data.clone());
        }
    }

    let registered_types: Vec<String> = by_type.keys().cloned().collect();
    let components: Vec<ComponentTypeSnapshot> = by_type
        .into_iter()
        .map(|(type_name, entries)| ComponentTypeSnapshot {
            type_name,
            entries: entries.into_iter().map(|(raw, data)| ComponentEntry { entity_id: EntityId::from_raw(raw), data }).collect(),
        })
        .collect();

    let destroyed: HashSet<EntityId> = delta.destroyed_entity_ids.iter().copied().collect();
    let mut alive_entity_ids: Vec<EntityId> = base
        .alive_entity_ids
        .iter()
        .copied()
        .filter(|id| !destroyed.contains(id))
        .chain(delta.new_entity_ids.iter().copied())
        .collect();
    alive_entity_ids.sort_by_key(EntityId::to_raw);
    alive_entity_ids.dedup();

    let max_new = delta.new_entity_ids.iter().map(|id| id.to_raw() + 1).max().unwrap_or(0);
    let max_entity_id = base.max_entity_id.max(max_new);

    (registered_types, max_entity_id, alive_entity_ids, components)
}

#[derive(Debug, Clone, Copy)]
struct FullSaveRecord {
    id: SaveId,
    tick: u64,
}

/// Tracks dirty entities since the last save and drives full/incremental/
/// auto-save file production through a [`SaveStorage`] backend.
pub struct SaveManager {
    storage: Box<dyn SaveStorage>,
    next_save_id: u32,
    dirty: HashSet<EntityId>,
    created: HashSet<EntityId>,
    destroyed: HashSet<EntityId>,
    last_full_save: Option<FullSaveRecord>,
    last_save_tick: Option<u64>,
    next_autosave_slot: u32,
}

impl SaveManager {
    pub fn new(storage: Box<dyn SaveStorage>) -> Self {
        Self {
            storage,
            next_save_id: 0,
            dirty: HashSet::new(),
            created: HashSet::new(),
            destroyed: HashSet::new(),
            last_full_save: None,
            last_save_tick: None,
            next_autosave_slot: 0,
        }
    }

    fn mint_save_id(&mut self) -> SaveId {
        let id = SaveId::from_raw(self.next_save_id);
        self.next_save_id += 1;
        id
    }

    /// Record that `entity`'s components changed since the last save.
    pub fn mark_dirty(&mut self, entity: EntityId) {
        self.dirty.insert(entity);
    }

    /// Record that `entity` was created since the last save.
    pub fn mark_created(&mut self, entity: EntityId) {
        self.created.insert(entity);
        self.dirty.insert(entity);
    }

    /// Record that `entity` was destroyed since the last save.
    pub fn mark_destroyed(&mut self, entity: EntityId) {
        self.destroyed.insert(entity);
        self.dirty.remove(&entity);
        self.created.remove(&entity);
    }

    fn clear_dirty_tracking(&mut self) {
        self.dirty.clear();
        self.created.clear();
        self.destroyed.clear();
    }

    fn build_metadata(world: &World, clock: &WorldClock, log: &EventLog, name: &str, seed: u64, is_incremental: bool) -> SaveMetadata {
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        SaveMetadata {
            name: name.to_owned(),
            description: String::new(),
            world_age: clock.current_tick(),
            seed,
            created_at,
            is_incremental,
            entity_count: world.entity_count(),
            event_count: log.get_count(),
        }
    }

    fn file_names(name: &str) -> (String, String) {
        (format!("{name}.aet"), format!("{name}.meta.json"))
    }

    fn write_payload(&self, name: &str, version: u32, id: SaveId, metadata: &SaveMetadata, payload_bytes: &[u8]) -> Result<(), SaveError> {
        let (payload_name, meta_name) = Self::file_names(name);
        self.storage.write_file(&payload_name, payload_bytes)?;
        let sidecar = SaveSidecar { id, version, metadata: metadata.clone() };
        self.storage.write_file(&meta_name, &serde_json::to_vec(&sidecar)?)?;
        Ok(())
    }

    /// Capture a complete world/clock/log state under `name`.
    pub fn save_full(&mut self, name: &str, world: &World, clock: &WorldClock, log: &EventLog, seed: u64) -> Result<SaveId, SaveError> {
        let id = self.mint_save_id();
        let metadata = Self::build_metadata(world, clock, log, name, seed, false);

        let (registered_types, components) = collect_components(world);
        let mut alive_entity_ids = world.get_all_entities();
        alive_entity_ids.sort_by_key(EntityId::to_raw);

        let payload = FullSavePayload {
            version: CURRENT_VERSION,
            metadata: metadata.clone(),
            tick: clock.current_tick(),
            registered_types,
            max_entity_id: world.allocators().entity_cursor(),
            alive_entity_ids,
            components,
            events: log.get_all().cloned().collect(),
        };

        self.write_payload(name, CURRENT_VERSION, id, &metadata, &serde_json::to_vec(&payload)?)?;

        self.last_full_save = Some(FullSaveRecord { id, tick: clock.current_tick() });
        self.last_save_tick = Some(clock.current_tick());
        self.clear_dirty_tracking();
        Ok(id)
    }

    /// Capture only entities marked dirty/created/destroyed since the last
    /// save, relative to the most recent *full* save. Falls back to a full
    /// save transparently if none exists yet, per the contract's explicit
    /// fallback rule -- this also means an incremental save never chains
    /// off a prior incremental save, so replaying a delta chain never
    /// arises by construction.
    pub fn save_incremental(&mut self, name: &str, world: &World, clock: &WorldClock, log: &EventLog, seed: u64) -> Result<SaveId, SaveError> {
        let Some(base) = self.last_full_save else {
            warn!("no prior full save; save_incremental falling back to a full save");
            return self.save_full(name, world, clock, log, seed);
        };

        let id = self.mint_save_id();
        let mut metadata = Self::build_metadata(world, clock, log, name, seed, true);

        let mut changed_entities = Vec::new();
        for entity in &self.dirty {
            if self.destroyed.contains(entity) {
                continue;
            }
            let mut components = Vec::new();
            for type_name in world.registered_type_names() {
                if let Ok(entries) = world.serialize_store_by_name(type_name) {
                    if let Some((_, data)) = entries.into_iter().find(|(e, _)| e == entity) {
                        components.push(ComponentValue { type_name: type_name.to_owned(), data });
                    }
                }
            }
            changed_entities.push(ChangedEntity { entity_id: *entity, components });
        }
        changed_entities.sort_by_key(|c| c.entity_id.to_raw());
        // The contract's `metadata.entityCount` describes the *delta* for an
        // incremental save, not the whole world, so readers can tell at a
        // glance how small a given save's blast radius was.
        metadata.entity_count = changed_entities.len();

        let mut destroyed_entity_ids: Vec<EntityId> = self.destroyed.iter().copied().collect();
        destroyed_entity_ids.sort_by_key(EntityId::to_raw);
        let mut new_entity_ids: Vec<EntityId> = self.created.iter().copied().collect();
        new_entity_ids.sort_by_key(EntityId::to_raw);
        let new_events: Vec<Event> = log.get_in_tick_range(base.tick, clock.current_tick()).into_iter().cloned().collect();

        let payload = IncrementalSavePayload {
            version: CURRENT_VERSION,
            metadata: metadata.clone(),
            base_save_id: base.id,
            base_tick: base.tick,
            current_tick: clock.current_tick(),
            changed_entities,
            destroyed_entity_ids,
            new_entity_ids,
            new_events,
        };

        self.write_payload(name, CURRENT_VERSION, id, &metadata, &serde_json::to_vec(&payload)?)?;

        self.last_save_tick = Some(clock.current_tick());
        self.clear_dirty_tracking();
        Ok(id)
    }

    fn read_sidecar(&self, name: &str) -> Result<SaveSidecar, SaveError> {
        let (_, meta_name) = Self::file_names(name);
        let sidecar: SaveSidecar = serde_json::from_slice(&self.storage.read_file(&meta_name)?)?;
        if sidecar.version != CURRENT_VERSION {
            return Err(SaveError::UnsupportedVersion(sidecar.version));
        }
        Ok(sidecar)
    }

    /// Read a save file back, dispatching on its sidecar metadata.
    pub fn load(&self, name: &str) -> Result<LoadedSave, SaveError> {
        let sidecar = self.read_sidecar(name)?;
        let (payload_name, _) = Self::file_names(name);
        let bytes = self.storage.read_file(&payload_name)?;
        if sidecar.metadata.is_incremental {
            Ok(LoadedSave::Incremental(serde_json::from_slice(&bytes)?))
        } else {
            Ok(LoadedSave::Full(serde_json::from_slice(&bytes)?))
        }
    }

    /// Load the save named `name` into `world`, rebuilding clock and event
    /// log state alongside it. `world` must already have every component
    /// type the save references registered. Fails if `name` is an
    /// incremental save -- use [`SaveManager::load_incremental_into`] with
    /// its base save's name for that case.
    pub fn load_into(&self, name: &str, world: &mut World) -> Result<(WorldClock, EventLog), SaveError> {
        let payload = match self.load(name)? {
            LoadedSave::Full(payload) => payload,
            LoadedSave::Incremental(_) => {
                return Err(SaveError::CorruptSave(format!("'{name}' is an incremental save; load it with load_incremental_into")))
            }
        };
        restore_world(world, &payload.registered_types, payload.max_entity_id, &payload.alive_entity_ids, &payload.components)?;
        Self::rebuild_clock_and_log(payload.tick, &payload.events)
    }

    /// Reconstruct the world an incremental save represents by applying its
    /// delta onto the full save it was taken against. Fails with
    /// [`SaveError::UnknownBaseSave`] if `delta_name`'s recorded
    /// `baseSaveId` does not match `base_name`'s own save id -- chained
    /// delta replay (delta onto delta) is deliberately not supported, so a
    /// base name must always name a full save.
    pub fn load_incremental_into(&self, base_name: &str, delta_name: &str, world: &mut World) -> Result<(WorldClock, EventLog), SaveError> {
        let base_sidecar = self.read_sidecar(base_name)?;
        let base = match self.load(base_name)? {
            LoadedSave::Full(payload) => payload,
            LoadedSave::Incremental(_) => return Err(SaveError::CorruptSave(format!("'{base_name}' is not a full save"))),
        };
        let delta = match self.load(delta_name)? {
            LoadedSave::Incremental(payload) => payload,
            // `saveIncremental` transparently falls back to a full save when
            // there is no prior full save, so a "delta" may itself be a full
            // payload; apply it as-is rather than treating that as an error.
            LoadedSave::Full(payload) => {
                restore_world(world, &payload.registered_types, payload.max_entity_id, &payload.alive_entity_ids, &payload.components)?;
                return Self::rebuild_clock_and_log(payload.tick, &payload.events);
            }
        };
        if delta.base_save_id != base_sidecar.id {
            return Err(SaveError::UnknownBaseSave(delta.base_save_id.to_string()));
        }

        let (registered_types, max_entity_id, alive_entity_ids, components) = merge_incremental(&base, &delta);
        restore_world(world, &registered_types, max_entity_id, &alive_entity_ids, &components)?;

        // `new_events` is captured via an inclusive tick range, so it can
        // overlap the base save's own events at exactly `base_tick` -- drop
        // anything already present in the base by id rather than appending
        // a duplicate the log would reject.
        let base_ids: HashSet<_> = base.events.iter().map(|e| e.id).collect();
        let events: Vec<Event> = base
            .events
            .iter()
            .cloned()
            .chain(delta.new_events.iter().filter(|e| !base_ids.contains(&e.id)).cloned())
            .collect();
        Self::rebuild_clock_and_log(delta.current_tick, &events)
    }

    fn rebuild_clock_and_log(tick: u64, events: &[Event]) -> Result<(WorldClock, EventLog), SaveError> {
        let mut clock = WorldClock::new();
        clock.set_tick(tick as i64).expect("a save's tick was captured from a live clock and is never negative");
        let mut log = EventLog::new();
        for event in events {
            log.append(event.clone()).map_err(|err| SaveError::CorruptSave(err.to_string()))?;
        }
        Ok((clock, log))
    }

    /// Invoked once per tick. Triggers an auto-save when at least
    /// [`AUTOSAVE_INTERVAL_YEARS`] have elapsed since the last save (full
    /// or incremental); the save is full once
    /// [`AUTOSAVE_FULL_THRESHOLD_YEARS`] have elapsed or no full save
    /// exists yet, otherwise incremental. Returns the slot name written,
    /// if any.
    pub fn check_auto_save(&mut self, world: &World, clock: &WorldClock, log: &EventLog, seed: u64) -> Result<Option<String>, SaveError> {
        let years_since_last_save = match self.last_save_tick {
            Some(last_tick) => (clock.current_tick().saturating_sub(last_tick)) / chronicle_clock::clock::TickFrequency::Annual.ticks(),
            None => AUTOSAVE_FULL_THRESHOLD_YEARS,
        };

        if years_since_last_save < AUTOSAVE_INTERVAL_YEARS {
            return Ok(None);
        }

        let slot = self.next_autosave_slot;
        let slot_name = format!("autosave-{slot}");

        if years_since_last_save >= AUTOSAVE_FULL_THRESHOLD_YEARS || self.last_full_save.is_none() {
            self.save_full(&slot_name, world, clock, log, seed)?;
        } else {
            self.save_incremental(&slot_name, world, clock, log, seed)?;
        }

        let evict_slot = (slot + 1) % AUTOSAVE_SLOTS;
        let evict_name = format!("autosave-{evict_slot}");
        let (evict_payload, evict_meta) = Self::file_names(&evict_name);
        if self.storage.exists(&evict_payload) {
            self.storage.delete_file(&evict_payload)?;
            self.storage.delete_file(&evict_meta)?;
        }

        self.next_autosave_slot = (slot + 1) % AUTOSAVE_SLOTS;
        info!(slot = %slot_name, "auto-save written");
        Ok(Some(slot_name))
    }
}
