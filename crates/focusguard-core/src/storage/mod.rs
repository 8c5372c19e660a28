//! Persistent storage: two key-value tiers, the typed store over them, the
//! engine configuration file and the import/export format.

mod area;
mod config;
pub mod keys;
mod store;
pub mod transfer;

pub use area::{JsonFileArea, MemoryArea};
pub use config::EngineConfig;
pub use store::{ConfigStore, StorageChange, TieredRead};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// A flat JSON object, the unit every tier reads and writes.
pub type Items = serde_json::Map<String, serde_json::Value>;

/// Which storage tier a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Account-synced, authoritative for shared keys.
    Synced,
    /// Device-local, fallback for shared keys and sole home of device keys.
    Local,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Synced => f.write_str("synced"),
            Tier::Local => f.write_str("local"),
        }
    }
}

/// One key-value storage tier.
///
/// Missing keys are simply absent from the returned map. A stored JSON
/// `null` is returned as-is; callers treat it like absence.
pub trait StorageArea: Send + Sync {
    fn get(&self, keys: &[&str]) -> Result<Items, StorageError>;

    fn set(&self, items: &Items) -> Result<(), StorageError>;
}

/// Returns `~/.config/focusguard[-dev]/` based on FOCUSGUARD_ENV.
///
/// Set FOCUSGUARD_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSGUARD_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusguard-dev")
    } else {
        base_dir.join("focusguard")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
