use std::time::Duration;

use crate::key::QueryKey;

/// Per-subscription cache behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long a fetched value is served without a network call.
    pub stale_time: Duration,
    /// Refetch on this period while the key has subscribers.
    pub poll_interval: Option<Duration>,
    /// Disabled subscriptions never fetch.
    pub enabled: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: SyncConfig::DEFAULT_STALE_TIME,
            poll_interval: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub stale_time: Duration,
    pub running_poll: Duration,
    pub status_poll: Duration,
    /// Entries without subscribers are dropped after this long.
    pub idle_retention: Duration,
}

impl SyncConfig {
    pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);
    pub const DEFAULT_RUNNING_POLL: Duration = Duration::from_secs(10);
    pub const DEFAULT_STATUS_POLL: Duration = Duration::from_secs(5);
    pub const DEFAULT_IDLE_RETENTION: Duration = Duration::from_secs(300);

    #[must_use]
    pub fn options_for(&self, key: &QueryKey) -> QueryOptions {
        let poll_interval = match key {
            QueryKey::Running => Some(self.running_poll),
            QueryKey::Status(_) => Some(self.status_poll),
            _ => None,
        }
        .filter(|period| !period.is_zero());
        let enabled = key.target().is_none_or(|path| !path.is_empty());

        QueryOptions {
            stale_time: self.stale_time,
            poll_interval,
            enabled,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_time: Self::DEFAULT_STALE_TIME,
            running_poll: Self::DEFAULT_RUNNING_POLL,
            status_poll: Self::DEFAULT_STATUS_POLL,
            idle_retention: Self::DEFAULT_IDLE_RETENTION,
        }
    }
}
