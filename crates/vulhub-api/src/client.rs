use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::traits::EnvironmentApi;
use crate::transport::{ApiRequest, HttpTransport, Transport};
use crate::types::{
    ActionReply, CleanOptions, EnvironmentInfo, EnvironmentList, EnvironmentStatus, StartOptions,
    StatusList, SyncupResult, SystemStatus,
};

/// Percent-encode each `/`-separated segment of a catalog path once.
#[must_use]
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn require_data<T: DeserializeOwned>(
    operation: &'static str,
    data: Option<Value>,
) -> Result<T, ApiError> {
    let data = data.ok_or_else(|| ApiError::malformed(operation, "response has no data"))?;
    serde_json::from_value(data).map_err(|error| ApiError::malformed(operation, error.to_string()))
}

fn optional_data<T: DeserializeOwned>(
    operation: &'static str,
    data: Option<Value>,
) -> Result<Option<T>, ApiError> {
    data.map(|data| {
        serde_json::from_value(data)
            .map_err(|error| ApiError::malformed(operation, error.to_string()))
    })
    .transpose()
}

fn body_of<T: serde::Serialize>(operation: &'static str, value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|error| ApiError::malformed(operation, error.to_string()))
}

/// HTTP implementation of [`EnvironmentApi`].
#[derive(Clone)]
pub struct VulhubClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for VulhubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulhubClient").finish_non_exhaustive()
    }
}

impl VulhubClient {
    /// Connect to the panel API at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(
            base_url, timeout,
        )?)))
    }

    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn read<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: String,
    ) -> Result<T, ApiError> {
        let data = self.transport.send(ApiRequest::get(operation, path)).await?;
        require_data(operation, data)
    }

    async fn read_entity<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: String,
    ) -> Result<Option<T>, ApiError> {
        match self.read(operation, path).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn act(&self, request: ApiRequest) -> Result<Option<ActionReply>, ApiError> {
        let operation = request.operation;
        let data = self.transport.send(request).await?;
        optional_data(operation, data)
    }
}

#[async_trait]
impl EnvironmentApi for VulhubClient {
    async fn system_status(&self) -> Result<SystemStatus, ApiError> {
        self.read("system status", "status".to_string()).await
    }

    async fn sync(&self) -> Result<SyncupResult, ApiError> {
        let data = self
            .transport
            .send(ApiRequest::post("sync catalog", "syncup"))
            .await?;
        require_data("sync catalog", data)
    }

    async fn list_catalog(&self) -> Result<EnvironmentList, ApiError> {
        self.read("list catalog", "environments".to_string()).await
    }

    async fn list_downloaded(&self) -> Result<StatusList, ApiError> {
        self.read("list downloaded", "environments/downloaded".to_string())
            .await
    }

    async fn list_running(&self) -> Result<StatusList, ApiError> {
        self.read("list running", "environments/running".to_string())
            .await
    }

    async fn get_info(&self, path: &str) -> Result<Option<EnvironmentInfo>, ApiError> {
        self.read_entity(
            "get info",
            format!("environments/info/{}", encode_path(path)),
        )
        .await
    }

    async fn get_status(&self, path: &str) -> Result<Option<EnvironmentStatus>, ApiError> {
        self.read_entity(
            "get status",
            format!("environments/status/{}", encode_path(path)),
        )
        .await
    }

    async fn start(
        &self,
        path: &str,
        options: StartOptions,
    ) -> Result<Option<ActionReply>, ApiError> {
        let request = ApiRequest::post("start", format!("environments/start/{}", encode_path(path)))
            .with_body(body_of("start", &options)?);
        self.act(request).await
    }

    async fn stop(&self, path: &str) -> Result<Option<ActionReply>, ApiError> {
        self.act(ApiRequest::post(
            "stop",
            format!("environments/stop/{}", encode_path(path)),
        ))
        .await
    }

    async fn restart(&self, path: &str) -> Result<Option<ActionReply>, ApiError> {
        self.act(ApiRequest::post(
            "restart",
            format!("environments/restart/{}", encode_path(path)),
        ))
        .await
    }

    async fn clean(
        &self,
        path: &str,
        options: CleanOptions,
    ) -> Result<Option<ActionReply>, ApiError> {
        let request =
            ApiRequest::delete("clean", format!("environments/clean/{}", encode_path(path)))
                .with_body(body_of("clean", &options)?);
        self.act(request).await
    }
}
