use chrono::NaiveDateTime;
use vulhub_api::{
    Environment, EnvironmentFilter, EnvironmentList, GroupedEnvironments, StatusList,
    SystemStatus,
};

/// Catalog entries with their flags corrected by the downloaded and running
/// lists, whichever of those are known.
#[must_use]
pub fn reconcile(
    catalog: &EnvironmentList,
    downloaded: Option<&StatusList>,
    running: Option<&StatusList>,
) -> Vec<Environment> {
    catalog
        .environments
        .iter()
        .map(|environment| {
            let mut environment = environment.clone();
            if let Some(running) = running {
                environment.running = running.contains(&environment.path);
            }
            if let Some(downloaded) = downloaded {
                environment.downloaded =
                    downloaded.contains(&environment.path) || environment.running;
            }
            environment
        })
        .collect()
}

/// Dashboard counters and the grouped environment list, derived from
/// whatever snapshots the cache currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overview {
    pub system: Option<SystemStatus>,
    pub catalog_total: Option<usize>,
    pub downloaded_total: Option<usize>,
    pub running_total: Option<usize>,
    pub groups: GroupedEnvironments,
}

impl Overview {
    #[must_use]
    pub fn derive(
        system: Option<&SystemStatus>,
        catalog: Option<&EnvironmentList>,
        downloaded: Option<&StatusList>,
        running: Option<&StatusList>,
        filter: EnvironmentFilter,
        query: &str,
    ) -> Self {
        let groups = catalog
            .map(|catalog| {
                GroupedEnvironments::filtered(reconcile(catalog, downloaded, running), filter, query)
            })
            .unwrap_or_default();

        Self {
            system: system.cloned(),
            catalog_total: catalog.map(|list| list.environments.len()),
            downloaded_total: downloaded.map(|list| list.environments.len()),
            running_total: running.map(|list| list.environments.len()),
            groups,
        }
    }

    #[must_use]
    pub fn last_synced_at(&self) -> Option<NaiveDateTime> {
        self.system.as_ref()?.last_synced_at()
    }

    #[must_use]
    pub fn needs_sync(&self) -> bool {
        self.system
            .as_ref()
            .is_some_and(|system| system.need_sync || !system.initialized)
    }
}
