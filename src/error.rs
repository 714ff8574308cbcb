use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasourceError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid selector pattern: {0}")]
    InvalidPattern(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for DatasourceError {
    fn from(err: reqwest::Error) -> Self {
        DatasourceError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for DatasourceError {
    fn from(err: serde_json::Error) -> Self {
        DatasourceError::Serialization(err.to_string())
    }
}

impl From<regex::Error> for DatasourceError {
    fn from(err: regex::Error) -> Self {
        DatasourceError::InvalidPattern(err.to_string())
    }
}

impl IntoResponse for DatasourceError {
    fn into_response(self) -> Response {
        let status = match self {
            DatasourceError::Backend(_) | DatasourceError::Transport(_) => StatusCode::BAD_GATEWAY,
            DatasourceError::InvalidPattern(_) | DatasourceError::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            DatasourceError::Config(_) | DatasourceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, DatasourceError>;
