//! Deployment configuration
//!
//! A single [`TapGuardConfig`] is loaded at startup, validated, and injected into the
//! authenticator. There is no process-global configuration.
//!
//! ```toml
//! [keys]
//! secret_key = "00112233445566778899AABBCCDDEEFF"
//! sdm_mac_key = "FFEEDDCCBBAA99887766554433221100"   # optional
//!
//! [log]
//! path = "attendance.jsonl"
//!
//! [locks]
//! scope = "per-tag"
//! wait_ms = 5000
//!
//! [ledger]
//! scan_failure = "fail-closed"
//! ```

use crate::secret::{KeyError, SecretKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `keys.secret_key`
pub const SECRET_KEY_ENV: &str = "TAPGUARD_SECRET_KEY";

/// Environment variable overriding `keys.sdm_mac_key`
pub const SDM_MAC_KEY_ENV: &str = "TAPGUARD_SDM_MAC_KEY";

/// Default bounded wait for the admission lock
pub const DEFAULT_LOCK_WAIT_MS: u64 = 5_000;

/// Configuration errors, all surfaced at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("cannot read configuration {}: {reason}", .path.display())]
    Read {
        /// File that failed to load
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// The configuration text is not valid TOML for this schema
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// No tag key was configured
    #[error("no tag key configured; set keys.secret_key or TAPGUARD_SECRET_KEY")]
    MissingSecretKey,

    /// A key could not be parsed
    #[error("invalid {field}: {source}")]
    InvalidKey {
        /// Configuration field that held the key
        field: &'static str,
        /// Parse failure
        #[source]
        source: KeyError,
    },

    /// A key is the all-zero factory default
    #[error("{field} is the all-zero factory default; provision a real key before deploying")]
    InsecureDefaultKey {
        /// Configuration field that held the key
        field: &'static str,
    },

    /// The admission lock wait is zero
    #[error("locks.wait_ms must be greater than zero")]
    ZeroLockWait,
}

/// Granularity of the admission lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockScope {
    /// One process-wide lock serializes every admission
    Global,
    /// One lock per tag; unrelated tags never wait on each other
    #[default]
    PerTag,
}

/// What the ledger does when the attendance log cannot be scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanFailurePolicy {
    /// Reject the tap
    #[default]
    FailClosed,
    /// Treat the tag as having no history. Admits replays while the log is down.
    FailOpen,
}

/// Attendance log location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// JSON-lines file holding the attendance log
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("attendance.jsonl")
}

/// Admission lock settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock granularity
    #[serde(default)]
    pub scope: LockScope,
    /// Bounded wait before a tap is rejected as busy
    #[serde(default = "default_lock_wait_ms")]
    pub wait_ms: u64,
}

impl LockConfig {
    /// Bounded wait as a duration
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            scope: LockScope::default(),
            wait_ms: DEFAULT_LOCK_WAIT_MS,
        }
    }
}

fn default_lock_wait_ms() -> u64 {
    DEFAULT_LOCK_WAIT_MS
}

/// Ledger settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Behaviour when the log scan fails
    #[serde(default)]
    pub scan_failure: ScanFailurePolicy,
}

/// Complete, validated deployment configuration
#[derive(Debug, Clone)]
pub struct TapGuardConfig {
    /// Tag payload key, never the factory default
    pub secret_key: SecretKey,
    /// Integrity-code key, when enforcement is wanted
    pub sdm_mac_key: Option<SecretKey>,
    /// Attendance log location
    pub log: LogConfig,
    /// Admission lock settings
    pub locks: LockConfig,
    /// Ledger settings
    pub ledger: LedgerConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    keys: RawKeys,
    #[serde(default)]
    log: LogConfig,
    #[serde(default)]
    locks: LockConfig,
    #[serde(default)]
    ledger: LedgerConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawKeys {
    #[serde(default)]
    secret_key: Option<String>,
    #[serde(default)]
    sdm_mac_key: Option<String>,
}

impl TapGuardConfig {
    /// Build a configuration from an explicit key with every other setting defaulted
    pub fn with_secret_key(secret_key: SecretKey) -> Result<Self, ConfigError> {
        let config = Self {
            secret_key,
            sdm_mac_key: None,
            log: LogConfig::default(),
            locks: LockConfig::default(),
            ledger: LedgerConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration text, consulting `env` for key overrides
    pub fn from_toml_str<F>(text: &str, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let secret_hex = env(SECRET_KEY_ENV)
            .or(raw.keys.secret_key)
            .ok_or(ConfigError::MissingSecretKey)?;
        let secret_key = parse_key("keys.secret_key", &secret_hex)?;

        let sdm_mac_key = match env(SDM_MAC_KEY_ENV).or(raw.keys.sdm_mac_key) {
            Some(text) if !text.trim().is_empty() => Some(parse_key("keys.sdm_mac_key", &text)?),
            _ => None,
        };

        let config = Self {
            secret_key,
            sdm_mac_key,
            log: raw.log,
            locks: raw.locks,
            ledger: raw.ledger,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file, consulting the process environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text, |name| std::env::var(name).ok())
    }

    /// Check invariants the rest of the system relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_factory_default() {
            return Err(ConfigError::InsecureDefaultKey {
                field: "keys.secret_key",
            });
        }
        if let Some(mac_key) = &self.sdm_mac_key {
            if mac_key.is_factory_default() {
                return Err(ConfigError::InsecureDefaultKey {
                    field: "keys.sdm_mac_key",
                });
            }
        }
        if self.locks.wait_ms == 0 {
            return Err(ConfigError::ZeroLockWait);
        }
        Ok(())
    }

    /// Whether taps must carry a valid integrity code
    pub fn enforces_integrity(&self) -> bool {
        self.sdm_mac_key.is_some()
    }
}

fn parse_key(field: &'static str, text: &str) -> Result<SecretKey, ConfigError> {
    SecretKey::from_hex(text).map_err(|source| ConfigError::InvalidKey { field, source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const KEY: &str = "00112233445566778899AABBCCDDEEFF";

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let text = format!("[keys]\nsecret_key = \"{KEY}\"\n");
        let config = TapGuardConfig::from_toml_str(&text, no_env).unwrap();
        assert_eq!(config.locks.scope, LockScope::PerTag);
        assert_eq!(config.locks.wait(), Duration::from_secs(5));
        assert_eq!(config.ledger.scan_failure, ScanFailurePolicy::FailClosed);
        assert_eq!(config.log.path, PathBuf::from("attendance.jsonl"));
        assert!(!config.enforces_integrity());
    }

    #[test]
    fn full_config_round_trips_every_section() {
        let text = format!(
            r#"
            [keys]
            secret_key = "{KEY}"
            sdm_mac_key = "FFEEDDCCBBAA99887766554433221100"

            [log]
            path = "/var/lib/tapguard/log.jsonl"

            [locks]
            scope = "global"
            wait_ms = 250

            [ledger]
            scan_failure = "fail-open"
            "#
        );
        let config = TapGuardConfig::from_toml_str(&text, no_env).unwrap();
        assert_eq!(config.locks.scope, LockScope::Global);
        assert_eq!(config.locks.wait_ms, 250);
        assert_eq!(config.ledger.scan_failure, ScanFailurePolicy::FailOpen);
        assert!(config.enforces_integrity());
    }

    #[test]
    fn factory_key_is_refused() {
        let text = format!("[keys]\nsecret_key = \"{}\"\n", "0".repeat(32));
        assert_matches!(
            TapGuardConfig::from_toml_str(&text, no_env),
            Err(ConfigError::InsecureDefaultKey {
                field: "keys.secret_key"
            })
        );
    }

    #[test]
    fn missing_key_is_refused() {
        assert_matches!(
            TapGuardConfig::from_toml_str("", no_env),
            Err(ConfigError::MissingSecretKey)
        );
    }

    #[test]
    fn environment_overrides_file() {
        let text = format!("[keys]\nsecret_key = \"{}\"\n", "0".repeat(32));
        let config = TapGuardConfig::from_toml_str(&text, |name| {
            (name == SECRET_KEY_ENV).then(|| KEY.to_string())
        })
        .unwrap();
        assert_eq!(config.secret_key, SecretKey::from_hex(KEY).unwrap());
    }

    #[test]
    fn zero_wait_is_refused() {
        let text = format!("[keys]\nsecret_key = \"{KEY}\"\n[locks]\nwait_ms = 0\n");
        assert_matches!(
            TapGuardConfig::from_toml_str(&text, no_env),
            Err(ConfigError::ZeroLockWait)
        );
    }

    #[test]
    fn malformed_key_names_its_field() {
        let text = format!("[keys]\nsecret_key = \"{KEY}\"\nsdm_mac_key = \"abc\"\n");
        let err = TapGuardConfig::from_toml_str(&text, no_env).unwrap_err();
        assert!(err.to_string().contains("keys.sdm_mac_key"));
    }
}
