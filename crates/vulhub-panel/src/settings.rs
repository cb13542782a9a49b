use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vulhub_sync::SyncConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_stale_time")]
    pub stale_time_secs: u64,

    #[serde(default = "default_running_poll")]
    pub running_poll_secs: u64,

    #[serde(default = "default_status_poll")]
    pub status_poll_secs: u64,

    #[serde(default = "default_idle_retention")]
    pub idle_retention_secs: u64,

    #[serde(default = "default_toast_timeout")]
    pub toast_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_http_timeout() -> u64 {
    60
}

fn default_stale_time() -> u64 {
    30
}

fn default_running_poll() -> u64 {
    10
}

fn default_status_poll() -> u64 {
    5
}

fn default_idle_retention() -> u64 {
    300
}

fn default_toast_timeout() -> u64 {
    5
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            http_timeout_secs: default_http_timeout(),
            stale_time_secs: default_stale_time(),
            running_poll_secs: default_running_poll(),
            status_poll_secs: default_status_poll(),
            idle_retention_secs: default_idle_retention(),
            toast_timeout_secs: default_toast_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl AppSettings {
    /// A missing file yields defaults.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(settings_path: &Path) -> Result<Self, std::io::Error> {
        if !settings_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(settings_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, settings_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = settings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(settings_path, content)?;
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Zero intervals would spin, so each is clamped to one second.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            stale_time: Duration::from_secs(self.stale_time_secs),
            running_poll: Duration::from_secs(self.running_poll_secs.max(1)),
            status_poll: Duration::from_secs(self.status_poll_secs.max(1)),
            idle_retention: Duration::from_secs(self.idle_retention_secs),
        }
    }
}
