use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use vulhub_api::{ActionReply, ApiError, CleanOptions, EnvironmentApi, StartOptions, SyncupResult};

use crate::cache::QueryCache;
use crate::key::QueryKey;
use crate::notify::{Notification, NotificationSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Sync,
    Start,
    Stop,
    Restart,
    Clean,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Clean => "clean",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state-changing request together with its target and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Sync,
    Start { path: String, options: StartOptions },
    Stop { path: String },
    Restart { path: String },
    Clean { path: String, options: CleanOptions },
}

impl Mutation {
    pub fn start(path: impl Into<String>) -> Self {
        Self::Start {
            path: path.into(),
            options: StartOptions::default(),
        }
    }

    pub fn stop(path: impl Into<String>) -> Self {
        Self::Stop { path: path.into() }
    }

    pub fn restart(path: impl Into<String>) -> Self {
        Self::Restart { path: path.into() }
    }

    /// Clean that removes volumes and files but keeps images.
    pub fn clean(path: impl Into<String>) -> Self {
        Self::Clean {
            path: path.into(),
            options: CleanOptions::keep_images(),
        }
    }

    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Sync => Action::Sync,
            Self::Start { .. } => Action::Start,
            Self::Stop { .. } => Action::Stop,
            Self::Restart { .. } => Action::Restart,
            Self::Clean { .. } => Action::Clean,
        }
    }

    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Sync => None,
            Self::Start { path, .. }
            | Self::Stop { path }
            | Self::Restart { path }
            | Self::Clean { path, .. } => Some(path),
        }
    }

    /// Keys that may hold outdated data once this mutation has succeeded.
    #[must_use]
    pub fn invalidates(&self) -> Vec<QueryKey> {
        match self {
            Self::Sync => vec![QueryKey::SystemStatus, QueryKey::Environments],
            Self::Start { path, .. } | Self::Stop { path } | Self::Restart { path } => vec![
                QueryKey::Downloaded,
                QueryKey::Running,
                QueryKey::status(path.as_str()),
            ],
            Self::Clean { path, .. } => vec![
                QueryKey::Downloaded,
                QueryKey::Running,
                QueryKey::status(path.as_str()),
                QueryKey::info(path.as_str()),
            ],
        }
    }

    fn success_notification(&self) -> Notification {
        match self {
            Self::Sync => {
                Notification::success("Sync completed", "Environment list has been updated.")
            }
            Self::Start { path, .. } => {
                Notification::success("Environment started", format!("{path} is now running."))
            }
            Self::Stop { path } => {
                Notification::success("Environment stopped", format!("{path} has been stopped."))
            }
            Self::Restart { path } => {
                Notification::success("Environment restarted", format!("{path} has been restarted."))
            }
            Self::Clean { path, .. } => {
                Notification::success("Environment cleaned", format!("{path} has been removed."))
            }
        }
    }

    fn failure_notification(&self, error: &ApiError) -> Notification {
        let title = match self.action() {
            Action::Sync => "Sync failed",
            Action::Start => "Failed to start",
            Action::Stop => "Failed to stop",
            Action::Restart => "Failed to restart",
            Action::Clean => "Failed to clean",
        };
        Notification::failure(title, error.message())
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Some(path) => write!(f, "{} {path}", self.action()),
            None => write!(f, "{}", self.action()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Synced(SyncupResult),
    Applied(Option<ActionReply>),
}

/// Runs mutations, invalidates what they affect and reports each outcome
/// exactly once.
#[derive(Clone)]
pub struct MutationCoordinator {
    api: Arc<dyn EnvironmentApi>,
    cache: QueryCache,
    sink: Arc<dyn NotificationSink>,
}

impl MutationCoordinator {
    pub fn new(
        api: Arc<dyn EnvironmentApi>,
        cache: QueryCache,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { api, cache, sink }
    }

    /// Perform `mutation` against the backend.
    ///
    /// On success the affected keys are invalidated before the notification
    /// is emitted. On failure nothing is invalidated.
    ///
    /// # Errors
    /// Returns the backend or transport error unchanged.
    pub async fn perform(&self, mutation: Mutation) -> Result<MutationOutcome, ApiError> {
        info!("Performing {mutation}");
        let result = match &mutation {
            Mutation::Sync => self.api.sync().await.map(MutationOutcome::Synced),
            Mutation::Start { path, options } => self
                .api
                .start(path, *options)
                .await
                .map(MutationOutcome::Applied),
            Mutation::Stop { path } => self.api.stop(path).await.map(MutationOutcome::Applied),
            Mutation::Restart { path } => {
                self.api.restart(path).await.map(MutationOutcome::Applied)
            }
            Mutation::Clean { path, options } => self
                .api
                .clean(path, *options)
                .await
                .map(MutationOutcome::Applied),
        };

        match result {
            Ok(outcome) => {
                let keys = mutation.invalidates();
                self.cache.invalidate_all(&keys);
                info!("{mutation} succeeded, invalidated {} keys", keys.len());
                self.sink.notify(mutation.success_notification());
                Ok(outcome)
            }
            Err(error) => {
                warn!("{mutation} failed: {error}");
                self.sink.notify(mutation.failure_notification(&error));
                Err(error)
            }
        }
    }
}
