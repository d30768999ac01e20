//! Configuration loading and management
//!
//! Handles parsing of `.taskmirror.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::notification::Permission;
use crate::view::{SortKey, StatusFilter};

/// File name looked up in the working directory
pub const CONFIG_FILE: &str = ".taskmirror.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Owner identity configuration
    #[serde(default)]
    pub owner: OwnerConfig,

    /// Local document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Subscription behaviour for one-shot commands
    #[serde(default)]
    pub sync: SyncConfig,

    /// Reminder scheduler configuration
    #[serde(default)]
    pub reminders: ReminderConfig,

    /// Notification sink configuration
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Default view criteria
    #[serde(default)]
    pub view: ViewConfig,
}

/// Owner-related configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnerConfig {
    /// Owner used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Store-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the collection files
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(crate::storage::STORE_DIR)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How long to wait for the first snapshot
    #[serde(default = "default_sync_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_sync_timeout_ms() -> u64 {
    5000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_sync_timeout_ms(),
        }
    }
}

/// Reminder scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Scan period, also the width of the firing window
    #[serde(default = "default_reminder_period_secs")]
    pub period_secs: u64,

    /// Notification title
    #[serde(default = "default_reminder_title")]
    pub title: String,

    /// Prefix placed before the task title in the notification body
    #[serde(default = "default_reminder_body_prefix")]
    pub body_prefix: String,
}

fn default_reminder_period_secs() -> u64 {
    60
}

fn default_reminder_title() -> String {
    "Task Reminder".to_string()
}

fn default_reminder_body_prefix() -> String {
    "It's time for: ".to_string()
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            period_secs: default_reminder_period_secs(),
            title: default_reminder_title(),
            body_prefix: default_reminder_body_prefix(),
        }
    }
}

/// Notification sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Initial permission state of the console sink
    #[serde(default)]
    pub permission: Permission,
}

/// Default view criteria
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub sort: SortKey,

    #[serde(default)]
    pub status: StatusFilter,
}

impl Config {
    /// Load configuration from a `.taskmirror.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(
                        path = %config_path.display(),
                        error = %err,
                        "ignoring invalid config"
                    );
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        if let Some(owner) = self.owner.default.as_deref() {
            if owner.trim().is_empty() {
                return Err(crate::error::Error::InvalidConfig(
                    "owner.default cannot be empty".to_string(),
                ));
            }
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "store.path cannot be empty".to_string(),
            ));
        }
        if self.sync.timeout_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "sync.timeout_ms must be > 0".to_string(),
            ));
        }
        self.reminders.validate()?;
        Ok(())
    }
}

impl ReminderConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.period_secs == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "reminders.period_secs must be > 0".to_string(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "reminders.title cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.period_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert!(cfg.owner.default.is_none());
        assert_eq!(cfg.store.path, PathBuf::from(".taskmirror"));
        assert_eq!(cfg.sync.timeout_ms, 5000);
        assert_eq!(cfg.reminders.period_secs, 60);
        assert_eq!(cfg.reminders.title, "Task Reminder");
        assert_eq!(cfg.reminders.body_prefix, "It's time for: ");
        assert_eq!(cfg.notifications.permission, Permission::Default);
        assert_eq!(cfg.view.sort, SortKey::DueAt);
        assert_eq!(cfg.view.status, StatusFilter::All);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[owner]
default = "alice"

[store]
path = "data/store"

[sync]
timeout_ms = 250

[reminders]
period_secs = 30
title = "Heads up"
body_prefix = "Due: "

[notifications]
permission = "granted"

[view]
sort = "priority"
status = "pending"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.owner.default.as_deref(), Some("alice"));
        assert_eq!(cfg.store.path, PathBuf::from("data/store"));
        assert_eq!(cfg.sync.timeout_ms, 250);
        assert_eq!(cfg.reminders.period_secs, 30);
        assert_eq!(cfg.reminders.title, "Heads up");
        assert_eq!(cfg.reminders.body_prefix, "Due: ");
        assert_eq!(cfg.notifications.permission, Permission::Granted);
        assert_eq!(cfg.view.sort, SortKey::Priority);
        assert_eq!(cfg.view.status, StatusFilter::Pending);
    }

    #[test]
    fn zero_period_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[reminders]\nperiod_secs = 0").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            crate::error::Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_permission_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[notifications]\npermission = \"maybe\"").expect("write config");

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn load_from_dir_defaults_when_missing_or_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path());
        assert_eq!(cfg.reminders.period_secs, 60);

        fs::write(dir.path().join(CONFIG_FILE), "[sync]\ntimeout_ms = 0").expect("write config");
        let cfg = Config::load_from_dir(dir.path());
        assert_eq!(cfg.sync.timeout_ms, 5000);
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        let cfg = Config::default();
        cfg.save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("period_secs = 60"));
        assert!(written.contains("sort = \"dueAt\""));
        let reloaded = Config::load(&path).expect("reload");
        assert_eq!(reloaded.reminders.title, "Task Reminder");
    }
}
