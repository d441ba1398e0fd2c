//! Admin API type definitions

use serde::{Deserialize, Serialize};

// ============ Client Listing ============

/// All registered clients response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientsResponse {
    /// Number of registered clients
    pub total: usize,
    pub clients: Vec<ClientItem>,
}

/// One registered client, without its secrets
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientItem {
    pub client_id: String,
    /// SHA-256 of the client secret (first 16 hex chars)
    pub secret_fingerprint: String,
    pub redirect_url: String,
    /// Portal account the client logs in with, if it decodes
    pub username: Option<String>,
    pub has_otp_secret: bool,
    /// Registration time (RFC3339 format)
    pub registered_at: String,
}

// ============ Registration ============

/// Register client request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClientRequest {
    pub client_id: String,

    /// Generated when omitted
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub redirect_url: String,

    /// Portal username (required)
    pub username: String,

    /// Portal password (required)
    pub password: String,

    /// OTP secret, bare base32 or otpauth:// URL (optional)
    #[serde(default)]
    pub otp_secret: String,
}

/// Register client success response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClientResponse {
    pub success: bool,
    pub message: String,
    pub client_id: String,
    /// Only returned here; listings show a fingerprint
    pub client_secret: String,
}

// ============ Common Responses ============

/// Operation success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct AdminErrorResponse {
    pub error: AdminError,
}

#[derive(Debug, Serialize)]
pub struct AdminError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl AdminErrorResponse {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: AdminError {
                error_type: error_type.into(),
                message: message.into(),
            },
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request", message)
    }

    pub fn authentication_error() -> Self {
        Self::new("authentication_error", "Invalid or missing admin API key")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}
