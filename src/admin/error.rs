//! Admin API error type definitions

use std::fmt;

use axum::http::StatusCode;

use super::types::AdminErrorResponse;

/// Admin service error types
#[derive(Debug)]
pub enum AdminServiceError {
    /// Client not found
    NotFound { client_id: String },

    /// Request failed validation
    InvalidRequest(String),

    /// Registry could not be persisted, or similar
    InternalError(String),
}

impl fmt::Display for AdminServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminServiceError::NotFound { client_id } => {
                write!(f, "Client not found: {}", client_id)
            }
            AdminServiceError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            AdminServiceError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AdminServiceError {}

impl AdminServiceError {
    /// Get corresponding HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdminServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            AdminServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AdminServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to API error response
    pub fn into_response(self) -> AdminErrorResponse {
        match &self {
            AdminServiceError::NotFound { .. } => AdminErrorResponse::not_found(self.to_string()),
            AdminServiceError::InvalidRequest(_) => {
                AdminErrorResponse::invalid_request(self.to_string())
            }
            AdminServiceError::InternalError(_) => {
                AdminErrorResponse::internal_error(self.to_string())
            }
        }
    }
}
