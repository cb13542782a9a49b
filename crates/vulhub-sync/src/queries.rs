use std::future::Future;
use std::sync::Arc;

use vulhub_api::{
    ApiError, EnvironmentApi, EnvironmentInfo, EnvironmentList, EnvironmentStatus, StatusList,
    SystemStatus,
};

use crate::cache::{QueryCache, Subscription};
use crate::key::QueryKey;

/// Typed subscriptions for every readable resource, each bound to its key
/// and default options.
#[derive(Clone)]
pub struct Queries {
    cache: QueryCache,
    api: Arc<dyn EnvironmentApi>,
}

impl Queries {
    pub fn new(cache: QueryCache, api: Arc<dyn EnvironmentApi>) -> Self {
        Self { cache, api }
    }

    fn watch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<dyn EnvironmentApi>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let options = self.cache.config().options_for(&key);
        let api = Arc::clone(&self.api);
        self.cache
            .subscribe(key, options, move || fetch(Arc::clone(&api)))
    }

    #[must_use]
    pub fn system_status(&self) -> Subscription<SystemStatus> {
        self.watch(QueryKey::SystemStatus, |api| async move {
            api.system_status().await
        })
    }

    #[must_use]
    pub fn catalog(&self) -> Subscription<EnvironmentList> {
        self.watch(QueryKey::Environments, |api| async move {
            api.list_catalog().await
        })
    }

    #[must_use]
    pub fn downloaded(&self) -> Subscription<StatusList> {
        self.watch(QueryKey::Downloaded, |api| async move {
            api.list_downloaded().await
        })
    }

    /// Polls while subscribed.
    #[must_use]
    pub fn running(&self) -> Subscription<StatusList> {
        self.watch(QueryKey::Running, |api| async move {
            api.list_running().await
        })
    }

    /// Disabled when `path` is empty. `None` data means the catalog has no
    /// such environment.
    #[must_use]
    pub fn info(&self, path: &str) -> Subscription<Option<EnvironmentInfo>> {
        let target = path.to_string();
        self.watch(QueryKey::info(path), move |api| {
            let path = target.clone();
            async move { api.get_info(&path).await }
        })
    }

    /// Polls while subscribed. Disabled when `path` is empty.
    #[must_use]
    pub fn status(&self, path: &str) -> Subscription<Option<EnvironmentStatus>> {
        let target = path.to_string();
        self.watch(QueryKey::status(path), move |api| {
            let path = target.clone();
            async move { api.get_status(&path).await }
        })
    }
}
