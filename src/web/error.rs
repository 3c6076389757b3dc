use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::config::ConfigError;
use crate::process::SupervisorError;
use crate::properties::PropertiesError;

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Properties(#[from] PropertiesError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::Supervisor(SupervisorError::AlreadyRunning | SupervisorError::NotRunning) => {
                StatusCode::CONFLICT
            }
            WebError::Supervisor(SupervisorError::Spawn(_) | SupervisorError::Write(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WebError::Config(ConfigError::UnknownSetting(_) | ConfigError::InvalidValue { .. }) => {
                StatusCode::BAD_REQUEST
            }
            WebError::Properties(PropertiesError::KindMismatch { .. }) => StatusCode::BAD_REQUEST,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Config(_) | WebError::Properties(_) | WebError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Body of every control and error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
    pub message: String,
}

impl StatusBody {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, Json(StatusBody::error(self.to_string()))).into_response()
    }
}
