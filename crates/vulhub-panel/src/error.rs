use thiserror::Error;
use vulhub_api::ApiError;
use vulhub_platform::AppPathsError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Paths(#[from] AppPathsError),

    #[error("Environment not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Could not listen for Ctrl-C: {0}")]
    Signal(String),
}

impl AppError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }
}
