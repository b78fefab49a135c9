//! Persistence: in-memory snapshots for rollback/branching, and on-disk
//! save files (full and incremental) for long-term storage.
//!
//! Snapshots are deep copies of the world, clock, and log, content-hashed
//! for determinism checks, generalized to this kernel's `IndexMap`-backed
//! world and extended with the save-file/auto-save machinery a pure
//! in-memory snapshot has no need for.

#![deny(unsafe_code)]

pub mod branch;
pub mod save;
pub mod snapshot;
pub mod storage;
pub mod tagged;

use chronicle_ecs::EcsError;

/// Validation-kind errors for the persistence layer. Matches the taxonomy's
/// "kinds, not type names": each variant names one named contract failure
/// rather than wrapping an opaque message.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("save file version {0} is not supported")]
    UnsupportedVersion(u32),
    #[error("component type '{0}' is not registered on the restoring world")]
    UnknownComponentType(String),
    #[error("save file '{0}' not found in storage")]
    FileNotFound(String),
    #[error("incremental save references unknown base save id {0}")]
    UnknownBaseSave(String),
    #[error("save payload is corrupt: {0}")]
    CorruptSave(String),
    #[error("component store error: {0}")]
    Ecs(#[from] EcsError),
    #[error("save I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("save payload (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub mod prelude {
    pub use crate::branch::{
        Branch, BranchEngine, BranchError, BranchRunSummary, BranchRunner, DivergenceAction, MAX_BRANCHES,
    };
    pub use crate::save::{
        ChangedEntity, ComponentValue, FullSavePayload, IncrementalSavePayload, SaveManager, SaveMetadata,
    };
    pub use crate::snapshot::{ComponentEntry, ComponentTypeSnapshot, KernelSnapshot, SnapshotManager};
    pub use crate::storage::{FsSaveStorage, InMemorySaveStorage, SaveStorage};
    pub use crate::tagged::{TaggedMap, TaggedSet};
    pub use crate::SaveError;
}
