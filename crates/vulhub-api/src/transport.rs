use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// Prefix every request target is resolved against.
pub const API_PREFIX: &str = "/api/v1";

const SNIPPET_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// One call against the API, relative to [`API_PREFIX`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub operation: &'static str,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(operation: &'static str, path: impl Into<String>) -> Self {
        Self {
            operation,
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(operation: &'static str, path: impl Into<String>) -> Self {
        Self {
            operation,
            method: Method::Post,
            path: path.into(),
            body: None,
        }
    }

    pub fn delete(operation: &'static str, path: impl Into<String>) -> Self {
        Self {
            operation,
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Sends requests and unwraps the `{success, data?, error?}` envelope.
///
/// Returns the envelope's `data` on success. No retries happen at this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>, ApiError>;
}

#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ErrorInfo>,
}

#[derive(Deserialize)]
struct ErrorInfo {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// reqwest-backed transport with one fixed timeout for every operation.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport with its own HTTP client.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("vulhub-panel/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| ApiError::transport_from("build client", error))?;
        Ok(Self::with_client(client, base_url, timeout))
    }

    /// Wrap an existing client; `timeout` must match the one it was built with.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{API_PREFIX}/{}",
            self.base_url,
            path.trim_start_matches('/')
        )
    }

    fn map_send_error(&self, operation: &'static str, error: &reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            ApiError::transport_from(operation, error)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>, ApiError> {
        let url = self.endpoint(&request.path);
        debug!("{} {url} ({})", request.method, request.operation);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| self.map_send_error(request.operation, &error))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| self.map_send_error(request.operation, &error))?;

        decode_envelope(
            request.operation,
            status.as_u16(),
            status.is_success(),
            &body,
        )
    }
}

pub(crate) fn decode_envelope(
    operation: &'static str,
    status: u16,
    status_ok: bool,
    body: &str,
) -> Result<Option<Value>, ApiError> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status_ok => {
            return Err(ApiError::Http {
                status,
                body_snippet: response_snippet(body, SNIPPET_CHARS),
            });
        }
        Err(error) => return Err(ApiError::malformed(operation, error.to_string())),
    };

    if !envelope.success || !status_ok {
        return Err(match envelope.error {
            Some(info) => ApiError::backend(status, info.code, info.message),
            None if !status_ok => ApiError::Http {
                status,
                body_snippet: response_snippet(body, SNIPPET_CHARS),
            },
            None => ApiError::backend(status, "REQUEST_FAILED", "Request failed"),
        });
    }

    Ok(envelope.data.filter(|data| !data.is_null()))
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.trim().chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_envelope_returns_data_on_success() {
        let data = decode_envelope("list", 200, true, r#"{"success":true,"data":{"total":0}}"#)
            .expect("envelope should decode");
        assert_eq!(data, Some(json!({"total": 0})));
    }

    #[test]
    fn decode_envelope_treats_null_data_as_absent() {
        let data = decode_envelope("stop", 200, true, r#"{"success":true,"data":null}"#)
            .expect("envelope should decode");
        assert_eq!(data, None);
    }

    #[test]
    fn decode_envelope_maps_backend_error() {
        let error = decode_envelope(
            "get status",
            404,
            false,
            r#"{"success":false,"error":{"code":"NOT_FOUND","message":"Environment not found: x"}}"#,
        )
        .expect_err("failure envelope should be an error");

        assert_eq!(
            error,
            ApiError::backend(404, "NOT_FOUND", "Environment not found: x")
        );
        assert!(error.is_not_found());
    }

    #[test]
    fn decode_envelope_rejects_unsuccessful_envelope_without_error_info() {
        let error = decode_envelope("sync", 200, true, r#"{"success":false}"#)
            .expect_err("unsuccessful envelope should be an error");
        assert_eq!(error.code(), "REQUEST_FAILED");
    }

    #[test]
    fn decode_envelope_distinguishes_http_from_malformed() {
        let http = decode_envelope("list", 502, false, "<html>Bad Gateway</html>")
            .expect_err("non-json failure should be an error");
        assert!(matches!(http, ApiError::Http { status: 502, ref body_snippet } if body_snippet.contains("Bad Gateway")));

        let malformed = decode_envelope("list", 200, true, "not json")
            .expect_err("non-json success should be malformed");
        assert!(matches!(malformed, ApiError::Malformed { operation: "list", .. }));
    }

    #[test]
    fn endpoint_joins_base_url_and_api_prefix() {
        let transport = HttpTransport::with_client(
            reqwest::Client::new(),
            "http://127.0.0.1:8080/",
            Duration::from_secs(60),
        );
        assert_eq!(
            transport.endpoint("environments/running"),
            "http://127.0.0.1:8080/api/v1/environments/running"
        );
    }

    #[tokio::test]
    async fn send_posts_json_body_and_unwraps_data() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/environments/start/redis/CVE-2022-0543")
                .json_body(json!({"pull": true}));
            then.status(200)
                .json_body(json!({"success": true, "data": {"message": "ok"}}));
        });

        let transport = HttpTransport::new(&server.base_url(), Duration::from_secs(5))
            .expect("transport should build");
        let data = transport
            .send(
                ApiRequest::post("start", "environments/start/redis/CVE-2022-0543")
                    .with_body(json!({"pull": true})),
            )
            .await
            .expect("request should succeed");

        mock.assert();
        assert_eq!(data, Some(json!({"message": "ok"})));
    }

    #[tokio::test]
    async fn send_reports_unreachable_server_as_transport_error() {
        let transport = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(2))
            .expect("transport should build");

        let error = transport
            .send(ApiRequest::get("system status", "status"))
            .await
            .expect_err("connection should fail");

        assert!(error.is_transport(), "unexpected error: {error:?}");
    }

    #[tokio::test]
    async fn send_surfaces_timeout_with_configured_seconds() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/status");
            then.status(200)
                .delay(Duration::from_millis(1500))
                .json_body(json!({"success": true, "data": {}}));
        });

        let transport = HttpTransport::new(&server.base_url(), Duration::from_secs(1))
            .expect("transport should build");
        let error = transport
            .send(ApiRequest::get("system status", "status"))
            .await
            .expect_err("slow response should time out");

        assert_eq!(error, ApiError::Timeout { seconds: 1 });
    }
}
