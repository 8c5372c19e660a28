//! Core error types for focusguard-core.
//!
//! Nothing in the background engine is fatal: call sites decide whether an
//! error degrades (skip a tab, skip a stats write, fall back to the local
//! tier) or propagates to the command that caused it.

use std::path::PathBuf;
use thiserror::Error;

use crate::host::TabId;
use crate::storage::Tier;

/// Core error type for focusguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Tab control errors
    #[error("Tab error: {0}")]
    Tab(#[from] TabError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Storage-tier errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The tier cannot be reached at all (quota, sign-out, disk failure)
    #[error("{tier} storage is unavailable: {message}")]
    Unavailable { tier: Tier, message: String },

    /// Both tiers rejected a write
    #[error("write of {keys:?} failed on every storage tier")]
    WriteFailed { keys: Vec<String> },

    /// Backing file could not be read or written
    #[error("storage file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing document is not valid JSON
    #[error("storage document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors raised by the host's tab capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TabError {
    /// Tab was closed between query and action
    #[error("tab {0} no longer exists")]
    Gone(TabId),

    /// Script injection refused (restricted page, missing permission)
    #[error("script injection denied for tab {tab}: {reason}")]
    InjectionDenied { tab: TabId, reason: String },

    /// Any other host failure
    #[error("tab host failure: {0}")]
    Host(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Site input was empty after trimming
    #[error("site pattern is empty")]
    EmptyPattern,

    /// Site is already on the block list
    #[error("{0} is already blocked")]
    DuplicateSite(String),

    /// Site is not on the block list
    #[error("{0} is not on the block list")]
    UnknownSite(String),

    /// The block list cannot shrink while a session is running
    #[error("cannot remove sites while blocking is on")]
    ListLocked,

    /// Duration string could not be parsed
    #[error("invalid blocking duration '{0}'")]
    InvalidDuration(String),

    /// Import/export document problems
    #[error("invalid transfer file: {0}")]
    InvalidTransfer(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
