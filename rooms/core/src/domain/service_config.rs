// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Rooms Service Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing one
// Rooms service process:
// - branch tag echoed in availability notifications
// - reservation rules (conflict buffer, no-show grace period, notes limit)
// - expiration sweeper schedule
// - storage backend selection

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::repository::{PostgresConfig, StorageBackend};
use crate::domain::reservation::{ReservationPolicy, MAX_POLICY_MINUTES};
use crate::domain::room::BranchId;

pub const API_VERSION: &str = "lounge.cafe/v1";
pub const KIND: &str = "RoomsConfig";
pub const CONFIG_FILE_NAME: &str = "rooms-config.yaml";

/// Top-level Rooms service configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfigManifest {
    /// API version (must be "lounge.cafe/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "RoomsConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: RoomsConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Instance name, defaults to the host name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfigSpec {
    #[serde(default)]
    pub branch_id: BranchId,

    #[serde(default)]
    pub reservations: ReservationSettings,

    #[serde(default)]
    pub sweeper: SweeperSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSettings {
    /// Minimum distance between two bookings' scheduled starts for one room
    #[serde(default = "default_buffer_minutes")]
    pub buffer_minutes: i64,

    /// Minutes a Reserved booking may wait for its session before it is auto-cancelled
    #[serde(default = "default_expiration_minutes")]
    pub expiration_minutes: i64,

    #[serde(default = "default_max_notes_length")]
    pub max_notes_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweeperSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_backend")]
    pub backend: StorageBackendKind,

    /// Required for the postgres backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_buffer_minutes() -> i64 {
    15
}

fn default_expiration_minutes() -> i64 {
    15
}

fn default_max_notes_length() -> usize {
    500
}

fn default_true() -> bool {
    true
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_backend() -> StorageBackendKind {
    StorageBackendKind::InMemory
}

fn default_max_connections() -> u32 {
    5
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            buffer_minutes: default_buffer_minutes(),
            expiration_minutes: default_expiration_minutes(),
            max_notes_length: default_max_notes_length(),
        }
    }
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval_seconds(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for RoomsConfigSpec {
    fn default() -> Self {
        Self {
            branch_id: BranchId::default(),
            reservations: ReservationSettings::default(),
            sweeper: SweeperSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Default for RoomsConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "lounge-rooms".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: RoomsConfigSpec::default(),
        }
    }
}

impl RoomsConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. LOUNGE_ROOMS_CONFIG_PATH environment variable
    /// 2. ./rooms-config.yaml (working directory)
    /// 3. ~/.lounge/rooms-config.yaml (user home)
    /// 4. /etc/lounge/rooms-config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("LOUNGE_ROOMS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from(format!("./{CONFIG_FILE_NAME}"));
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".lounge").join(CONFIG_FILE_NAME);
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/lounge").join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides so container deployments can
    /// adjust the manifest without editing it
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LOUNGE_DATABASE_URL") {
            if !url.trim().is_empty() {
                tracing::info!("Environment override: LOUNGE_DATABASE_URL set");
                self.spec.storage.database_url = Some(url);
            }
        }

        if let Ok(val) = std::env::var("LOUNGE_SWEEPER_ENABLED") {
            match parse_flag(&val) {
                Some(enabled) => {
                    tracing::info!("Environment override: LOUNGE_SWEEPER_ENABLED={}", enabled);
                    self.spec.sweeper.enabled = enabled;
                }
                None => {
                    tracing::warn!(
                        "Invalid value for LOUNGE_SWEEPER_ENABLED: '{}'. \
                         Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("LOUNGE_SWEEP_INTERVAL_SECONDS") {
            match val.trim().parse::<u64>() {
                Ok(seconds) => {
                    tracing::info!(
                        "Environment override: LOUNGE_SWEEP_INTERVAL_SECONDS={}",
                        seconds
                    );
                    self.spec.sweeper.interval_seconds = seconds;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for LOUNGE_SWEEP_INTERVAL_SECONDS: '{}'. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.branch_id.as_str().trim().is_empty() {
            anyhow::bail!("spec.branch_id cannot be empty");
        }

        let reservations = &self.spec.reservations;
        if reservations.buffer_minutes < 0 {
            anyhow::bail!(
                "spec.reservations.buffer_minutes cannot be negative (got {})",
                reservations.buffer_minutes
            );
        }
        if reservations.expiration_minutes <= 0 {
            anyhow::bail!(
                "spec.reservations.expiration_minutes must be positive (got {})",
                reservations.expiration_minutes
            );
        }
        if reservations.buffer_minutes > MAX_POLICY_MINUTES {
            anyhow::bail!(
                "spec.reservations.buffer_minutes cannot exceed {} (got {})",
                MAX_POLICY_MINUTES,
                reservations.buffer_minutes
            );
        }
        if reservations.expiration_minutes > MAX_POLICY_MINUTES {
            anyhow::bail!(
                "spec.reservations.expiration_minutes cannot exceed {} (got {})",
                MAX_POLICY_MINUTES,
                reservations.expiration_minutes
            );
        }

        if self.spec.sweeper.interval_seconds == 0 {
            anyhow::bail!("spec.sweeper.interval_seconds must be greater than zero");
        }

        if self.spec.storage.backend == StorageBackendKind::Postgres {
            let missing = self
                .spec
                .storage
                .database_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty());
            if missing {
                anyhow::bail!("spec.storage.database_url is required for the postgres backend");
            }
            if self.spec.storage.max_connections == 0 {
                anyhow::bail!("spec.storage.max_connections must be greater than zero");
            }
        }

        Ok(())
    }

    pub fn reservation_policy(&self) -> ReservationPolicy {
        ReservationPolicy {
            buffer_minutes: self.spec.reservations.buffer_minutes,
            expiration_minutes: self.spec.reservations.expiration_minutes,
            max_notes_length: self.spec.reservations.max_notes_length,
        }
    }

    /// Resolve the storage section; call after `validate()`
    pub fn storage_backend(&self) -> StorageBackend {
        match (&self.spec.storage.backend, &self.spec.storage.database_url) {
            (StorageBackendKind::Postgres, Some(url)) => StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: url.clone(),
                max_connections: self.spec.storage.max_connections,
            }),
            _ => StorageBackend::InMemory,
        }
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = RoomsConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert_eq!(manifest.spec.reservations.buffer_minutes, 15);
        assert_eq!(manifest.spec.reservations.expiration_minutes, 15);
        assert_eq!(manifest.spec.sweeper.interval_seconds, 60);
        assert!(manifest.spec.sweeper.enabled);
        assert!(matches!(manifest.storage_backend(), StorageBackend::InMemory));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
apiVersion: lounge.cafe/v1
kind: RoomsConfig
metadata:
  name: downtown
spec:
  branch_id: downtown
  reservations:
    buffer_minutes: 20
  storage:
    backend: postgres
    database_url: postgres://rooms@localhost/rooms
"#;
        let manifest = RoomsConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.branch_id.as_str(), "downtown");
        assert_eq!(manifest.spec.reservations.buffer_minutes, 20);
        assert_eq!(manifest.spec.reservations.expiration_minutes, 15);
        assert_eq!(manifest.spec.reservations.max_notes_length, 500);
        assert!(manifest.validate().is_ok());

        let policy = manifest.reservation_policy();
        assert_eq!(policy.buffer_minutes, 20);
        match manifest.storage_backend() {
            StorageBackend::PostgreSQL(pg) => {
                assert_eq!(pg.connection_string, "postgres://rooms@localhost/rooms");
                assert_eq!(pg.max_connections, 5);
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut manifest = RoomsConfigManifest::default();
        manifest.metadata.name = "uptown".to_string();
        manifest.spec.sweeper.interval_seconds = 30;
        manifest.to_yaml_file(&path).unwrap();

        let loaded = RoomsConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.metadata.name, "uptown");
        assert_eq!(loaded.spec.sweeper.interval_seconds, 30);
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = RoomsConfigManifest::load_or_default(Some(dir.path().join("absent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest = RoomsConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.reservations.buffer_minutes = -1;
        assert!(manifest.validate().is_err());
        manifest.spec.reservations.buffer_minutes = 0;
        assert!(manifest.validate().is_ok());

        manifest.spec.sweeper.interval_seconds = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.sweeper.interval_seconds = 60;

        manifest.spec.storage.backend = StorageBackendKind::Postgres;
        assert!(manifest.validate().is_err());
        manifest.spec.storage.database_url = Some("postgres://localhost/rooms".to_string());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_policy_windows_are_capped() {
        let mut manifest = RoomsConfigManifest::default();

        manifest.spec.reservations.buffer_minutes = MAX_POLICY_MINUTES;
        manifest.spec.reservations.expiration_minutes = MAX_POLICY_MINUTES;
        assert!(manifest.validate().is_ok());

        manifest.spec.reservations.buffer_minutes = i64::MAX;
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("buffer_minutes cannot exceed"));
        manifest.spec.reservations.buffer_minutes = 15;

        manifest.spec.reservations.expiration_minutes = MAX_POLICY_MINUTES + 1;
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("expiration_minutes cannot exceed"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("YES"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
