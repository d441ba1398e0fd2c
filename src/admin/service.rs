//! Admin API business logic service

use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::login::{Credentials, totp};
use crate::oauth::CredentialRegistry;

use super::error::AdminServiceError;
use super::types::{ClientItem, ClientsResponse, RegisterClientRequest, RegisterClientResponse};

/// Bytes of randomness in a generated client secret
const CLIENT_SECRET_BYTES: usize = 32;

/// Admin service
///
/// Encapsulates all Admin API business logic
pub struct AdminService {
    registry: Arc<CredentialRegistry>,
}

impl AdminService {
    pub fn new(registry: Arc<CredentialRegistry>) -> Self {
        Self { registry }
    }

    /// List registered clients
    pub fn list_clients(&self) -> ClientsResponse {
        let clients: Vec<ClientItem> = self
            .registry
            .clients()
            .into_iter()
            .map(|entry| {
                // A malformed entry is still listed, just without account details
                let credentials = self.registry.credentials_for(&entry.client_id).ok().flatten();
                ClientItem {
                    secret_fingerprint: fingerprint(&entry.client_secret),
                    username: credentials.as_ref().map(|c| c.username().to_string()),
                    has_otp_secret: credentials
                        .as_ref()
                        .is_some_and(|c| !c.otp_secret().is_empty()),
                    registered_at: entry.registered_at.to_rfc3339(),
                    redirect_url: entry.redirect_url,
                    client_id: entry.client_id,
                }
            })
            .collect();

        ClientsResponse {
            total: clients.len(),
            clients,
        }
    }

    /// Register or replace a client
    pub fn register_client(
        &self,
        req: RegisterClientRequest,
    ) -> Result<RegisterClientResponse, AdminServiceError> {
        let client_id = req.client_id.trim();
        if client_id.is_empty() {
            return Err(AdminServiceError::InvalidRequest(
                "clientId is empty".to_string(),
            ));
        }

        let credentials = Credentials::new(req.username, req.password, req.otp_secret);
        credentials
            .validate()
            .map_err(|e| AdminServiceError::InvalidRequest(e.to_string()))?;

        if !credentials.otp_secret().is_empty() {
            totp::current_code(credentials.otp_secret())
                .map_err(|e| AdminServiceError::InvalidRequest(e.to_string()))?;
        }

        let client_secret = match req.client_secret.filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => generate_client_secret()?,
        };

        self.registry
            .register(client_id, &client_secret, &req.redirect_url, &credentials)
            .map_err(|e| AdminServiceError::InternalError(e.to_string()))?;

        Ok(RegisterClientResponse {
            success: true,
            message: format!("Client {} registered", client_id),
            client_id: client_id.to_string(),
            client_secret,
        })
    }

    /// Revoke a client
    pub fn revoke_client(&self, client_id: &str) -> Result<(), AdminServiceError> {
        let removed = self
            .registry
            .revoke(client_id)
            .map_err(|e| AdminServiceError::InternalError(e.to_string()))?;

        if !removed {
            return Err(AdminServiceError::NotFound {
                client_id: client_id.to_string(),
            });
        }
        Ok(())
    }
}

fn fingerprint(secret: &str) -> String {
    let digest = hex::encode(Sha256::digest(secret.as_bytes()));
    digest[..16].to_string()
}

fn generate_client_secret() -> Result<String, AdminServiceError> {
    let mut bytes = [0u8; CLIENT_SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AdminServiceError::InternalError(format!("generate client secret: {}", e)))?;
    Ok(hex::encode(bytes))
}
