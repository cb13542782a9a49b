use std::sync::Arc;

use log::debug;
use vulhub_api::{EnvironmentApi, EnvironmentFilter, EnvironmentList, StatusList, SystemStatus};

use crate::cache::QueryCache;
use crate::config::SyncConfig;
use crate::key::QueryKey;
use crate::mutation::{Mutation, MutationCoordinator, MutationOutcome};
use crate::notify::NotificationSink;
use crate::overview::Overview;
use crate::queries::Queries;

/// One cache shared by all queries and mutations against a single backend.
pub struct Session {
    cache: QueryCache,
    queries: Queries,
    mutations: MutationCoordinator,
}

impl Session {
    pub fn new(
        api: Arc<dyn EnvironmentApi>,
        sink: Arc<dyn NotificationSink>,
        config: SyncConfig,
    ) -> Self {
        let cache = QueryCache::new(config);
        Self {
            queries: Queries::new(cache.clone(), Arc::clone(&api)),
            mutations: MutationCoordinator::new(api, cache.clone(), sink),
            cache,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    #[must_use]
    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    /// # Errors
    /// Returns the backend or transport error of the mutation.
    pub async fn perform(&self, mutation: Mutation) -> Result<MutationOutcome, vulhub_api::ApiError> {
        self.mutations.perform(mutation).await
    }

    /// Overview of whatever is currently cached. Never fetches.
    #[must_use]
    pub fn overview(&self, filter: EnvironmentFilter, query: &str) -> Overview {
        let system = self.cache.get_snapshot::<SystemStatus>(&QueryKey::SystemStatus);
        let catalog = self.cache.get_snapshot::<EnvironmentList>(&QueryKey::Environments);
        let downloaded = self.cache.get_snapshot::<StatusList>(&QueryKey::Downloaded);
        let running = self.cache.get_snapshot::<StatusList>(&QueryKey::Running);

        Overview::derive(
            system.as_deref(),
            catalog.as_deref(),
            downloaded.as_deref(),
            running.as_deref(),
            filter,
            query,
        )
    }

    pub fn shutdown(&self) {
        debug!("Shutting down session with {} cached entries", self.cache.len());
        self.cache.shutdown();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cache.shutdown();
    }
}
