//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service plus the structured
//! JSON rejection body handlers return to clients. The `code` field is the
//! client's routing signal: log in again, pay to continue, or try again.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::ConfigError;
use edem_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Stable machine-readable codes carried in every rejection body.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Validation,
    Unauthorized,
    Forbidden,
    UpgradeRequired,
    VoiceConflict,
    PaywallRequired,
    NotFound,
    Upstream,
    Internal,
}

/// The JSON body of every rejected request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorCode,
}

/// What handlers return on the failure path.
pub type ApiRejection = (StatusCode, Json<ErrorBody>);

pub fn reject(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> ApiRejection {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
            code,
        }),
    )
}

/// Maps a port failure to a rejection without leaking internals to clients.
pub fn reject_port_error(err: PortError) -> ApiRejection {
    match err {
        PortError::NotFound(_) => reject(StatusCode::NOT_FOUND, ErrorCode::NotFound, "Not found"),
        PortError::Unauthorized => reject(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Unauthorized",
        ),
        PortError::InvalidSignature => reject(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Invalid signature",
        ),
        PortError::Unexpected(_) => reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Internal,
            "Internal server error",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_in_screaming_snake_case() {
        let body = ErrorBody {
            error: "limit reached".to_string(),
            code: ErrorCode::PaywallRequired,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"PAYWALL_REQUIRED\""));
    }

    #[test]
    fn port_errors_map_to_client_safe_rejections() {
        let (status, body) = reject_port_error(PortError::Unexpected("db exploded".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.0.error.contains("exploded"));
    }
}
