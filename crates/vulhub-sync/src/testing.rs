//! In-memory backend for unit tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use vulhub_api::{
    ActionReply, ApiError, CleanOptions, ContainerStatus, Environment, EnvironmentApi,
    EnvironmentInfo, EnvironmentList, EnvironmentStatus, StartOptions, StatusList, SyncupResult,
    SystemStatus,
};

#[derive(Default)]
struct FakeState {
    catalog: Vec<Environment>,
    downloaded: BTreeSet<String>,
    running: BTreeSet<String>,
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
    last_start: Option<StartOptions>,
    last_clean: Option<CleanOptions>,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

pub(crate) fn environment(path: &str) -> Environment {
    Environment {
        path: path.to_string(),
        name: path.to_string(),
        app: path.split('/').next().map(str::to_string),
        cve: path.split('/').nth(1).map(str::to_string).into_iter().collect(),
        tags: Vec::new(),
        downloaded: false,
        running: false,
    }
}

fn container(path: &str) -> ContainerStatus {
    ContainerStatus {
        id: format!("{path}-id"),
        name: format!("{}-1", path.replace('/', "-")),
        image: "vulhub/fake:latest".to_string(),
        status: "Up 1 minute".to_string(),
        state: "running".to_string(),
        ports: Vec::new(),
        created_at: None,
        started_at: Some("2024-01-01T00:00:00Z".to_string()),
    }
}

impl FakeApi {
    pub(crate) fn with_catalog(paths: &[&str]) -> Self {
        let api = Self::default();
        api.state().catalog = paths.iter().map(|path| environment(path)).collect();
        api
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake api state")
    }

    pub(crate) fn mark_downloaded(&self, path: &str) {
        self.state().downloaded.insert(path.to_string());
    }

    pub(crate) fn mark_running(&self, path: &str) {
        let mut state = self.state();
        state.downloaded.insert(path.to_string());
        state.running.insert(path.to_string());
    }

    pub(crate) fn fail(&self, operation: &'static str) {
        self.state().failing.insert(operation);
    }

    pub(crate) fn calls(&self, operation: &str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }

    pub(crate) fn last_start(&self) -> Option<StartOptions> {
        self.state().last_start
    }

    pub(crate) fn last_clean(&self) -> Option<CleanOptions> {
        self.state().last_clean
    }

    /// Count the call and fail it when the test asked for that.
    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, FakeState>, ApiError> {
        let mut state = self.state();
        *state.calls.entry(operation).or_default() += 1;
        if state.failing.contains(operation) {
            return Err(ApiError::backend(
                500,
                format!("{}_ERROR", operation.to_uppercase()),
                format!("{operation} failed"),
            ));
        }
        Ok(state)
    }
}

impl FakeState {
    fn find(&self, path: &str) -> Option<Environment> {
        let mut environment = self.catalog.iter().find(|env| env.path == path)?.clone();
        environment.downloaded = self.downloaded.contains(path);
        environment.running = self.running.contains(path);
        Some(environment)
    }

    fn status(&self, path: &str) -> Option<EnvironmentStatus> {
        let environment = self.find(path)?;
        let containers = if environment.running {
            vec![container(path)]
        } else {
            Vec::new()
        };
        let local_path = environment
            .downloaded
            .then(|| format!("/var/lib/vulhub/{path}"));
        Some(EnvironmentStatus::new(environment, containers, local_path))
    }

    fn status_list<'a>(&self, paths: impl Iterator<Item = &'a String>) -> StatusList {
        let environments: Vec<_> = paths.filter_map(|path| self.status(path)).collect();
        StatusList {
            total: environments.len(),
            environments,
        }
    }
}

fn not_found(path: &str) -> ApiError {
    ApiError::backend(404, vulhub_api::CODE_NOT_FOUND, format!("Environment not found: {path}"))
}

#[async_trait]
impl EnvironmentApi for FakeApi {
    async fn system_status(&self) -> Result<SystemStatus, ApiError> {
        let _state = self.enter("system_status")?;
        Ok(SystemStatus {
            initialized: true,
            last_sync_time: Some("2024-01-01 10:00:00".to_string()),
            need_sync: false,
            version: "test".to_string(),
        })
    }

    async fn sync(&self) -> Result<SyncupResult, ApiError> {
        let state = self.enter("sync")?;
        Ok(SyncupResult {
            success: true,
            last_sync_time: "2024-01-02 10:00:00".to_string(),
            total: state.catalog.len(),
        })
    }

    async fn list_catalog(&self) -> Result<EnvironmentList, ApiError> {
        let state = self.enter("list_catalog")?;
        let environments: Vec<_> = state
            .catalog
            .iter()
            .filter_map(|env| state.find(&env.path))
            .collect();
        Ok(EnvironmentList {
            total: environments.len(),
            environments,
        })
    }

    async fn list_downloaded(&self) -> Result<StatusList, ApiError> {
        let state = self.enter("list_downloaded")?;
        Ok(state.status_list(state.downloaded.iter()))
    }

    async fn list_running(&self) -> Result<StatusList, ApiError> {
        let state = self.enter("list_running")?;
        Ok(state.status_list(state.running.iter()))
    }

    async fn get_info(&self, path: &str) -> Result<Option<EnvironmentInfo>, ApiError> {
        let state = self.enter("get_info")?;
        Ok(state.find(path).map(|environment| EnvironmentInfo {
            downloaded: environment.downloaded,
            environment,
            readme: Some("# Fake".to_string()),
            compose_file: None,
            local_path: None,
        }))
    }

    async fn get_status(&self, path: &str) -> Result<Option<EnvironmentStatus>, ApiError> {
        let state = self.enter("get_status")?;
        Ok(state.status(path))
    }

    async fn start(
        &self,
        path: &str,
        options: StartOptions,
    ) -> Result<Option<ActionReply>, ApiError> {
        let mut state = self.enter("start")?;
        state.find(path).ok_or_else(|| not_found(path))?;
        state.last_start = Some(options);
        state.downloaded.insert(path.to_string());
        state.running.insert(path.to_string());
        Ok(state
            .status(path)
            .map(|status| ActionReply::Status(Box::new(status))))
    }

    async fn stop(&self, path: &str) -> Result<Option<ActionReply>, ApiError> {
        let mut state = self.enter("stop")?;
        state.find(path).ok_or_else(|| not_found(path))?;
        state.running.remove(path);
        Ok(Some(ActionReply::Ack {
            message: "Environment stopped successfully".to_string(),
        }))
    }

    async fn restart(&self, path: &str) -> Result<Option<ActionReply>, ApiError> {
        let state = self.enter("restart")?;
        Ok(state
            .status(path)
            .map(|status| ActionReply::Status(Box::new(status))))
    }

    async fn clean(
        &self,
        path: &str,
        options: CleanOptions,
    ) -> Result<Option<ActionReply>, ApiError> {
        let mut state = self.enter("clean")?;
        state.find(path).ok_or_else(|| not_found(path))?;
        state.last_clean = Some(options);
        state.running.remove(path);
        state.downloaded.remove(path);
        Ok(Some(ActionReply::Ack {
            message: "Environment cleaned successfully".to_string(),
        }))
    }
}
