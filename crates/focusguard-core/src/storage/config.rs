//! TOML-based engine configuration.
//!
//! Holds the tunables of the background engine:
//! - Session accounting (gap threshold, heartbeat period, ceiling)
//! - Stats retention
//! - Tab config cache lifetime
//! - Expiry debounce and periodic check
//!
//! Configuration is stored at `~/.config/focusguard/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::session::accountant::{Limits, MINUTE_MS};

/// Session accounting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold_minutes: u32,
    #[serde(default = "default_one")]
    pub heartbeat_period_minutes: u32,
    #[serde(default = "default_ceiling")]
    pub session_ceiling_minutes: u64,
}

/// Stats configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_retention")]
    pub retention_days: u32,
}

/// Tab synchronizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabsConfig {
    /// Lifetime of the `{enabled, blockedSites}` cache used on navigation.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

/// Expiry scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryConfig {
    #[serde(default = "default_debounce")]
    pub debounce_secs: u64,
    /// Repeat period of the durable timer alarm after its first fire.
    #[serde(default = "default_one")]
    pub check_period_minutes: u32,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/focusguard/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub tabs: TabsConfig,
    #[serde(default)]
    pub expiry: ExpiryConfig,
}

// Default functions
fn default_gap_threshold() -> u32 {
    30
}
fn default_one() -> u32 {
    1
}
fn default_ceiling() -> u64 {
    24 * 60
}
fn default_retention() -> u32 {
    90
}
fn default_cache_ttl() -> u64 {
    3
}
fn default_debounce() -> u64 {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gap_threshold_minutes: default_gap_threshold(),
            heartbeat_period_minutes: default_one(),
            session_ceiling_minutes: default_ceiling(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention(),
        }
    }
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce(),
            check_period_minutes: default_one(),
        }
    }
}

impl EngineConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                // Every engine tunable is a non-negative integer.
                let new_value = match existing {
                    serde_json::Value::Number(_) => value
                        .trim()
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|e| invalid(format!("cannot parse '{value}': {e}")))?,
                    serde_json::Value::Bool(_) => value
                        .trim()
                        .parse::<bool>()
                        .map(serde_json::Value::Bool)
                        .map_err(|e| invalid(e.to_string()))?,
                    _ => return Err(unknown()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the default location, writing defaults when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_err = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_err(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_err(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_err(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: EngineConfig =
            serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("session.gap_threshold_minutes", u64::from(self.session.gap_threshold_minutes)),
            ("session.heartbeat_period_minutes", u64::from(self.session.heartbeat_period_minutes)),
            ("session.session_ceiling_minutes", self.session.session_ceiling_minutes),
            ("stats.retention_days", u64::from(self.stats.retention_days)),
            ("expiry.check_period_minutes", u64::from(self.expiry.check_period_minutes)),
        ];
        match positive.iter().find(|(_, v)| *v == 0) {
            Some((key, _)) => Err(ConfigError::InvalidValue {
                key: (*key).to_string(),
                message: "must be greater than zero".into(),
            }),
            None => Ok(()),
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn limits(&self) -> Limits {
        Limits {
            gap_threshold_ms: i64::from(self.session.gap_threshold_minutes) * MINUTE_MS,
            ceiling_minutes: self.session.session_ceiling_minutes,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.tabs.cache_ttl_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.expiry.debounce_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: EngineConfig = toml::from_str("[session]\ngap_threshold_minutes = 10\n").unwrap();
        assert_eq!(parsed.session.gap_threshold_minutes, 10);
        assert_eq!(parsed.session.session_ceiling_minutes, 1440);
        assert_eq!(parsed.tabs.cache_ttl_secs, 3);
    }

    #[test]
    fn defaults_match_engine_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.limits(), Limits::default());
        assert_eq!(cfg.stats.retention_days, crate::stats::RETENTION_DAYS);
        assert_eq!(cfg.debounce(), Duration::from_secs(5));
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.get("session.gap_threshold_minutes").as_deref(), Some("30"));
        assert_eq!(cfg.get("stats.retention_days").as_deref(), Some("90"));
        assert!(cfg.get("session.missing").is_none());
        assert!(cfg.get("session").is_none());
    }

    #[test]
    fn set_updates_nested_number() {
        let mut cfg = EngineConfig::default();
        cfg.set("tabs.cache_ttl_secs", "10").unwrap();
        assert_eq!(cfg.tabs.cache_ttl_secs, 10);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = EngineConfig::default();
        assert!(matches!(
            cfg.set("tabs.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_and_zero_values() {
        let mut cfg = EngineConfig::default();
        assert!(matches!(
            cfg.set("session.gap_threshold_minutes", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set("stats.retention_days", "0").is_err());
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = EngineConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, EngineConfig::default());

        let mut edited = cfg.clone();
        edited.set("expiry.debounce_secs", "8").unwrap();
        edited.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap().expiry.debounce_secs, 8);
    }

    #[test]
    fn load_from_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "session = [").unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
