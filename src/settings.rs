//! Settings persistence and the configuration provider.
//!
//! Settings live in a JSON file. Loading never fails: a missing, unreadable
//! or malformed file yields defaults. Each save keeps the previous file as
//! `<file>.backup`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CopierResult;
use crate::input_validation::{validate_network_host, validate_path_argument};
use crate::operation::{CancelPolicy, CopyRequest, Placement};

/// Default settings file name
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    #[default]
    Local,
    Network,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CopierSettings {
    pub source_path: String,
    pub destination_path: String,
    pub network_ip: String,
    pub folder_type: FolderType,
    pub auto_close: bool,
    pub placement: Placement,
    pub cancel_policy: CancelPolicy,
}

impl Default for CopierSettings {
    fn default() -> Self {
        Self {
            source_path: String::new(),
            destination_path: String::new(),
            network_ip: "127.0.0.1".to_string(),
            folder_type: FolderType::Local,
            auto_close: false,
            placement: Placement::Exact,
            cancel_policy: CancelPolicy::KeepPartial,
        }
    }
}

impl CopierSettings {
    /// Key/value view used by presentation layers.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "source_path" => self.source_path.clone(),
            "destination_path" => self.destination_path.clone(),
            "network_ip" => self.network_ip.clone(),
            "folder_type" => match self.folder_type {
                FolderType::Local => "local".to_string(),
                FolderType::Network => "network".to_string(),
            },
            "auto_close" => self.auto_close.to_string(),
            "placement" => match self.placement {
                Placement::Exact => "exact".to_string(),
                Placement::Nested => "nested".to_string(),
            },
            "cancel_policy" => match self.cancel_policy {
                CancelPolicy::KeepPartial => "keep_partial".to_string(),
                CancelPolicy::Restore => "restore".to_string(),
            },
            _ => return None,
        };
        Some(value)
    }

    pub fn is_network(&self) -> bool {
        self.folder_type == FolderType::Network
    }
}

impl CopyRequest {
    /// Snapshot settings into a request. Later settings edits do not affect it.
    pub fn from_settings(settings: &CopierSettings) -> CopierResult<Self> {
        validate_path_argument("source_path", &settings.source_path)?;
        validate_path_argument("destination_path", &settings.destination_path)?;

        let mut request = CopyRequest::new(&settings.source_path, &settings.destination_path)
            .with_placement(settings.placement)
            .with_cancel_policy(settings.cancel_policy);

        if settings.is_network() {
            validate_network_host(&settings.network_ip)?;
            request = request.with_network_host(settings.network_ip.trim());
        }

        Ok(request)
    }
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".backup");
        PathBuf::from(name)
    }

    /// Load settings from file or return defaults
    pub fn load(&self) -> CopierSettings {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "settings file not found, using defaults");
                return CopierSettings::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read settings");
                return CopierSettings::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => {
                info!(path = %self.path.display(), "settings loaded");
                settings
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "invalid JSON in settings file");
                CopierSettings::default()
            }
        }
    }

    /// Save settings, keeping the previous file as `.backup`
    pub fn save(&self, settings: &CopierSettings) -> Result<()> {
        if self.path.exists() {
            if let Err(e) = std::fs::copy(&self.path, self.backup_path()) {
                warn!(error = %e, "could not create settings backup");
            }
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to save settings to {}", self.path.display()))?;

        info!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    pub fn reset_to_defaults(&self) -> Result<CopierSettings> {
        let defaults = CopierSettings::default();
        self.save(&defaults)?;
        Ok(defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join(SETTINGS_FILE));

        let settings = store.load();
        assert_eq!(settings, CopierSettings::default());
        assert_eq!(settings.network_ip, "127.0.0.1");
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(SettingsStore::new(path).load(), CopierSettings::default());
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"{"source_path": "/data/src", "folder_type": "network", "password": "ignored"}"#,
        )
        .unwrap();

        let settings = SettingsStore::new(path).load();
        assert_eq!(settings.source_path, "/data/src");
        assert_eq!(settings.folder_type, FolderType::Network);
        assert_eq!(settings.network_ip, "127.0.0.1");
        assert_eq!(settings.placement, Placement::Exact);
    }

    #[test]
    fn test_save_keeps_previous_file_as_backup() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join(SETTINGS_FILE));

        let mut settings = CopierSettings {
            source_path: "/first".to_string(),
            ..CopierSettings::default()
        };
        store.save(&settings).unwrap();
        settings.source_path = "/second".to_string();
        store.save(&settings).unwrap();

        assert_eq!(store.load().source_path, "/second");
        let backup = std::fs::read_to_string(temp.path().join("settings.json.backup")).unwrap();
        assert!(backup.contains("/first"));
    }

    #[test]
    fn test_reset_to_defaults() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join(SETTINGS_FILE));
        store
            .save(&CopierSettings {
                auto_close: true,
                ..CopierSettings::default()
            })
            .unwrap();

        let reset = store.reset_to_defaults().unwrap();
        assert!(!reset.auto_close);
        assert!(!store.load().auto_close);
    }

    #[test]
    fn test_get_by_key() {
        let settings = CopierSettings {
            folder_type: FolderType::Network,
            cancel_policy: CancelPolicy::Restore,
            ..CopierSettings::default()
        };

        assert_eq!(settings.get("folder_type").as_deref(), Some("network"));
        assert_eq!(settings.get("auto_close").as_deref(), Some("false"));
        assert_eq!(settings.get("cancel_policy").as_deref(), Some("restore"));
        assert_eq!(settings.get("password"), None);
    }

    #[test]
    fn test_request_from_settings() {
        let settings = CopierSettings {
            source_path: "/data/Reports".to_string(),
            destination_path: "/mnt/share".to_string(),
            folder_type: FolderType::Network,
            network_ip: " 192.168.1.20 ".to_string(),
            placement: Placement::Nested,
            ..CopierSettings::default()
        };

        let request = CopyRequest::from_settings(&settings).unwrap();
        assert!(request.network_mode);
        assert_eq!(request.network_host.as_deref(), Some("192.168.1.20"));
        assert_eq!(
            request.target().unwrap(),
            PathBuf::from("/mnt/share/Reports")
        );
    }

    #[test]
    fn test_request_from_settings_rejects_empty_paths() {
        let err = CopyRequest::from_settings(&CopierSettings::default()).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_INPUT");
    }
}
