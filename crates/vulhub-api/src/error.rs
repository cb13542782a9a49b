use thiserror::Error;

pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
pub const CODE_MULTIPLE_MATCHES: &str = "MULTIPLE_MATCHES";

/// Normalized failure of any call against the panel API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error during {operation}: {details}")]
    Transport {
        operation: &'static str,
        details: String,
    },

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("HTTP {status}{body_snippet}")]
    Http { status: u16, body_snippet: String },

    #[error("{message}")]
    Backend {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Malformed response for {operation}: {details}")]
    Malformed {
        operation: &'static str,
        details: String,
    },
}

impl ApiError {
    pub fn transport(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            details: details.into(),
        }
    }

    pub fn transport_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::transport(operation, error.to_string())
    }

    pub fn malformed(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Malformed {
            operation,
            details: details.into(),
        }
    }

    pub fn backend(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Http { .. } => "HTTP_ERROR",
            Self::Backend { code, .. } => code,
            Self::Malformed { .. } => "MALFORMED_RESPONSE",
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Backend { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// True when no envelope was received at all.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// The backend answered with a `NOT_FOUND` envelope. A bare 404 without
    /// an envelope is a routing failure, not a catalog miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend { code, .. } if code == CODE_NOT_FOUND)
    }

    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Backend { code, .. } if code == CODE_MULTIPLE_MATCHES)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;

    #[test]
    fn backend_error_displays_backend_message() {
        let error = ApiError::backend(500, "START_ERROR", "port 6379 already allocated");

        assert_eq!(error.to_string(), "port 6379 already allocated");
        assert_eq!(error.code(), "START_ERROR");
        assert_eq!(error.message(), "port 6379 already allocated");
        assert!(!error.is_transport());
    }

    #[test]
    fn every_variant_has_a_normalized_code() {
        let cases = [
            (ApiError::transport("list running", "connection refused"), "TRANSPORT_ERROR"),
            (ApiError::Timeout { seconds: 60 }, "TIMEOUT"),
            (
                ApiError::Http {
                    status: 502,
                    body_snippet: ": bad gateway".to_string(),
                },
                "HTTP_ERROR",
            ),
            (ApiError::malformed("get status", "missing data"), "MALFORMED_RESPONSE"),
        ];

        for (error, code) in cases {
            assert_eq!(error.code(), code);
            assert!(!error.message().is_empty());
        }
    }

    #[test]
    fn not_found_requires_the_backend_code() {
        assert!(ApiError::backend(404, "NOT_FOUND", "Environment not found: x").is_not_found());
        assert!(ApiError::backend(500, "NOT_FOUND", "gone").is_not_found());
        assert!(
            !ApiError::Http {
                status: 404,
                body_snippet: String::new(),
            }
            .is_not_found()
        );
        assert!(!ApiError::backend(404, "ROUTE_MISSING", "no route").is_not_found());
        assert!(!ApiError::backend(500, "STATUS_ERROR", "docker down").is_not_found());
        assert!(ApiError::backend(409, "MULTIPLE_MATCHES", "pick one").is_ambiguous());
    }

    #[test]
    fn timeout_counts_as_transport_failure() {
        let error = ApiError::Timeout { seconds: 5 };
        assert!(error.is_transport());
        assert_eq!(error.to_string(), "Request timed out after 5s");
    }
}
