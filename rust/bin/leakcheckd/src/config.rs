//! Server configuration file.
//!
//! Lives at `/etc/leakcheck/<context>.toml`. Every field has a default, so
//! an empty file is a valid (development) configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use leaktest::{SerialPolicy, ServiceOptions};

const CONFIG_DIR: &str = "/etc/leakcheck";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for the database file and the photo directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// How long a writer waits for the database lock.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// `monotonic` never reuses a number; `gap_filling` reuses numbers of
    /// deleted tests.
    #[serde(default)]
    pub policy: SerialPolicy,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Same-device resubmissions inside this many seconds are rejected
    /// unless confirmed.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: usize,

    /// Site offset from UTC in minutes, used to date a submission that
    /// carries no `photo_taken_at`.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_data_dir() -> String {
    "/var/lib/leakcheck".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_debounce_secs() -> u64 {
    10
}

fn default_max_photo_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            policy: SerialPolicy::default(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce_secs(),
            max_photo_bytes: default_max_photo_bytes(),
            utc_offset_minutes: 0,
        }
    }
}

impl ServerConfig {
    /// A bare context name maps to `/etc/leakcheck/<name>.toml`; anything
    /// containing `/` or `.` is taken as a path.
    pub fn resolve_path(context_or_path: &str) -> PathBuf {
        if context_or_path.contains('/') || context_or_path.contains('.') {
            PathBuf::from(context_or_path)
        } else {
            Path::new(CONFIG_DIR).join(format!("{}.toml", context_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }

    pub fn local_offset(&self) -> anyhow::Result<FixedOffset> {
        let minutes = self.submission.utc_offset_minutes;
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow::anyhow!("submission.utc_offset_minutes {} is out of range", minutes))
    }

    pub fn service_options(&self) -> anyhow::Result<ServiceOptions> {
        Ok(ServiceOptions {
            serial_policy: self.serial.policy,
            max_attempts: self.serial.max_attempts,
            debounce: Duration::from_secs(self.submission.debounce_secs),
            max_photo_bytes: self.submission.max_photo_bytes,
            local_offset: self.local_offset()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            ServerConfig::resolve_path("plant-a"),
            PathBuf::from("/etc/leakcheck/plant-a.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("./dev.toml"),
            PathBuf::from("./dev.toml")
        );
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.storage.data_dir, "/var/lib/leakcheck");
        assert_eq!(config.serial.policy, SerialPolicy::Monotonic);
        assert_eq!(config.serial.max_attempts, 5);
        assert_eq!(config.submission.debounce_secs, 10);
        assert_eq!(config.local_offset().unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plant.toml");
        std::fs::write(
            &path,
            r#"
[storage]
data_dir = "/srv/leakcheck"
busy_timeout_ms = 250

[serial]
policy = "gap_filling"

[submission]
debounce_secs = 30
utc_offset_minutes = 120
"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.storage.data_dir, "/srv/leakcheck");
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));

        let options = config.service_options().unwrap();
        assert_eq!(options.serial_policy, SerialPolicy::GapFilling);
        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.debounce, Duration::from_secs(30));
        assert_eq!(options.local_offset.local_minus_utc(), 7200);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = toml::from_str::<ServerConfig>("[serial]\npolicy = \"random\"\n");
        assert!(err.is_err());
    }
}
