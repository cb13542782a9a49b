use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{
    ActionReply, CleanOptions, EnvironmentInfo, EnvironmentList, EnvironmentStatus, StartOptions,
    StatusList, SyncupResult, SystemStatus,
};

/// One method per remote operation, with no caching behind it.
///
/// `path` is always the raw catalog identifier; implementations escape it.
#[async_trait]
pub trait EnvironmentApi: Send + Sync {
    async fn system_status(&self) -> Result<SystemStatus, ApiError>;

    async fn sync(&self) -> Result<SyncupResult, ApiError>;

    async fn list_catalog(&self) -> Result<EnvironmentList, ApiError>;

    async fn list_downloaded(&self) -> Result<StatusList, ApiError>;

    async fn list_running(&self) -> Result<StatusList, ApiError>;

    /// `Ok(None)` when the catalog has no entry for `path`.
    async fn get_info(&self, path: &str) -> Result<Option<EnvironmentInfo>, ApiError>;

    /// `Ok(None)` when the catalog has no entry for `path`.
    async fn get_status(&self, path: &str) -> Result<Option<EnvironmentStatus>, ApiError>;

    async fn start(&self, path: &str, options: StartOptions)
    -> Result<Option<ActionReply>, ApiError>;

    async fn stop(&self, path: &str) -> Result<Option<ActionReply>, ApiError>;

    async fn restart(&self, path: &str) -> Result<Option<ActionReply>, ApiError>;

    async fn clean(&self, path: &str, options: CleanOptions)
    -> Result<Option<ActionReply>, ApiError>;
}
