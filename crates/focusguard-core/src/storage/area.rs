//! Storage tier implementations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{Items, StorageArea, Tier};
use crate::error::StorageError;

/// In-memory tier that can be switched off to simulate an outage.
#[derive(Debug)]
pub struct MemoryArea {
    tier: Tier,
    items: Mutex<Items>,
    available: AtomicBool,
}

impl MemoryArea {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            items: Mutex::new(Items::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability; an unavailable area fails every call.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Raw view of a stored value, bypassing availability.
    pub fn peek(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().get(key).cloned()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                tier: self.tier,
                message: "area switched off".into(),
            })
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Items> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StorageArea for MemoryArea {
    fn get(&self, keys: &[&str]) -> Result<Items, StorageError> {
        self.check()?;
        let items = self.lock();
        Ok(keys
            .iter()
            .filter_map(|k| items.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, items: &Items) -> Result<(), StorageError> {
        self.check()?;
        let mut stored = self.lock();
        for (k, v) in items {
            stored.insert(k.clone(), v.clone());
        }
        Ok(())
    }
}

/// A tier persisted as one JSON document on disk.
///
/// Writes go through a temporary file and a rename so a crash mid-write
/// leaves the previous document intact.
#[derive(Debug)]
pub struct JsonFileArea {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileArea {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Items, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Items::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Items::new()),
            Err(source) => Err(StorageError::File {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn store(&self, items: &Items) -> Result<(), StorageError> {
        let file_err = |source| StorageError::File {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(file_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(items)?;
        std::fs::write(&tmp, content).map_err(file_err)?;
        std::fs::rename(&tmp, &self.path).map_err(file_err)?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut Items)) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut items = self.load()?;
        f(&mut items);
        self.store(&items)
    }
}

impl StorageArea for JsonFileArea {
    fn get(&self, keys: &[&str]) -> Result<Items, StorageError> {
        let items = self.load()?;
        Ok(keys
            .iter()
            .filter_map(|k| items.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, items: &Items) -> Result<(), StorageError> {
        self.modify(|stored| {
            for (k, v) in items {
                stored.insert(k.clone(), v.clone());
            }
        })
    }
}
