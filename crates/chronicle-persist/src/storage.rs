//! Storage abstraction for save files, so the save manager's logic can be
//! exercised in tests without touching a real filesystem.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::SaveError;

/// All save-file I/O goes through this trait. Object-safe so callers can
/// hold a `Box<dyn SaveStorage>` without knowing the concrete backend.
pub trait SaveStorage: Send + Sync {
    fn write_file(&self, name: &str, contents: &[u8]) -> Result<(), SaveError>;
    fn read_file(&self, name: &str) -> Result<Vec<u8>, SaveError>;
    fn list_files(&self) -> Result<Vec<String>, SaveError>;
    fn delete_file(&self, name: &str) -> Result<(), SaveError>;
    fn ensure_dir(&self) -> Result<(), SaveError>;
    fn exists(&self, name: &str) -> bool;
}

/// Production backend: plain files on disk under a root directory, gzip
/// framing applied to `.aet` payloads. `flate2` is the idiomatic workhorse
/// for this in the wider Rust ecosystem.
pub struct FsSaveStorage {
    root: PathBuf,
}

impl FsSaveStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl SaveStorage for FsSaveStorage {
    fn write_file(&self, name: &str, contents: &[u8]) -> Result<(), SaveError> {
        self.ensure_dir()?;
        let path = self.path_for(name);
        if name.ends_with(".aet") {
            let file = std::fs::File::create(&path)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(contents)?;
            encoder.finish()?;
        } else {
            std::fs::write(&path, contents)?;
        }
        Ok(())
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>, SaveError> {
        let path = self.path_for(name);
        if name.ends_with(".aet") {
            let file = std::fs::File::open(&path)?;
            let mut decoder = GzDecoder::new(file);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        } else {
            Ok(std::fs::read(&path)?)
        }
    }

    fn list_files(&self) -> Result<Vec<String>, SaveError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete_file(&self, name: &str) -> Result<(), SaveError> {
        let path = self.path_for(name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), SaveError> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        Path::new(&self.path_for(name)).exists()
    }
}

/// In-memory backend for tests: a `Mutex`-guarded map from file name to raw
/// bytes, with no gzip framing (there is nothing to decompress from, so
/// tests exercise the save manager's logic without the codec getting in
/// the way).
#[derive(Default)]
pub struct InMemorySaveStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemorySaveStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaveStorage for InMemorySaveStorage {
    fn write_file(&self, name: &str, contents: &[u8]) -> Result<(), SaveError> {
        self.files.lock().expect("save storage mutex poisoned").insert(name.to_owned(), contents.to_vec());
        Ok(())
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>, SaveError> {
        self.files
            .lock()
            .expect("save storage mutex poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| SaveError::FileNotFound(name.to_owned()))
    }

    fn list_files(&self) -> Result<Vec<String>, SaveError> {
        let mut names: Vec<String> = self.files.lock().expect("save storage mutex poisoned").keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete_file(&self, name: &str) -> Result<(), SaveError> {
        self.files.lock().expect("save storage mutex poisoned").remove(name);
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), SaveError> {
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.lock().expect("save storage mutex poisoned").contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_storage_round_trips() {
        let storage = InMemorySaveStorage::new();
        storage.write_file("a.meta.json", b"{}").unwrap();
        assert!(storage.exists("a.meta.json"));
        assert_eq!(storage.read_file("a.meta.json").unwrap(), b"{}".to_vec());
        assert_eq!(storage.list_files().unwrap(), vec!["a.meta.json".to_string()]);
        storage.delete_file("a.meta.json").unwrap();
        assert!(!storage.exists("a.meta.json"));
    }

    #[test]
    fn in_memory_storage_missing_file_errors() {
        let storage = InMemorySaveStorage::new();
        assert!(matches!(storage.read_file("nope"), Err(SaveError::FileNotFound(_))));
    }

    #[test]
    fn fs_storage_round_trips_with_gzip_framing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsSaveStorage::new(dir.path());
        storage.write_file("a.aet", b"hello world").unwrap();
        assert!(storage.exists("a.aet"));
        assert_eq!(storage.read_file("a.aet").unwrap(), b"hello world".to_vec());
    }

    #[test]
    fn fs_storage_lists_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsSaveStorage::new(dir.path());
        storage.write_file("a.meta.json", b"{}").unwrap();
        storage.write_file("b.meta.json", b"{}").unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["a.meta.json".to_string(), "b.meta.json".to_string()]);
        storage.delete_file("a.meta.json").unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["b.meta.json".to_string()]);
    }
}
