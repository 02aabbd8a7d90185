use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::services::RenderError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable")]
    StoreUnavailable(#[from] StoreError),

    #[error("Rendering failed")]
    RenderFailed(#[from] RenderError),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RenderFailed(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::RenderFailed(_) => "RENDER_FAILED",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::StoreUnavailable(e) => {
                error!(error = %e, "Store error");
            }
            AppError::RenderFailed(e) => {
                error!(error = %e, "Render error");
            }
            AppError::InternalServerError(msg) => {
                error!(message = %msg, "Internal error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        let public_message = match &self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            AppError::StoreUnavailable(_) => {
                "Ticket storage is temporarily unavailable, retry the request".to_string()
            }
            AppError::RenderFailed(_) => "Could not render the ticket image".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
        };

        let details = self
            .is_retryable()
            .then(|| json!({ "retryable": true }));

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_service_unavailable() {
        let err = AppError::from(StoreError::Unresolved("timeout".to_string()));

        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_domain_errors_are_not_retryable() {
        let err = AppError::Conflict("ticket already used".to_string());

        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(!err.is_retryable());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_render_errors_are_internal_and_not_retryable() {
        let err = AppError::from(RenderError::Encode(qrcode::types::QrError::DataTooLong));

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "RENDER_FAILED");
        assert!(!err.is_retryable());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
