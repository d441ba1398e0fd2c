//! Access generator
//!
//! Issues tokens for a client by logging into the portal with the client's
//! registered account and handing back the portal's own access token.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::registry::{CredentialRegistry, RegistryShapeError};
use crate::login::{CredentialsError, LoginError, LoginMethod, validate_credentials};
use crate::store::{self, ConfigStore, SecretCodec, StoreError};

/// Length of minted refresh tokens, in base64 characters
pub const DEFAULT_REFRESH_TOKEN_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid credentials: {0}")]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    RegistryShape(#[from] RegistryShapeError),

    #[error("login using {method}: {source}")]
    Login {
        method: String,
        #[source]
        source: LoginError,
    },

    #[error("set cookies: {0}")]
    PersistCookies(#[source] StoreError),

    #[error("generate refresh token: {0}")]
    RefreshToken(#[from] rand::Error),
}

/// Token request as seen by the generator
#[derive(Debug, Clone, Default)]
pub struct GrantRequest {
    pub client_id: String,
    /// Requested scope, passed through as-is
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    /// Empty unless a refresh token was requested
    pub refresh_token: String,
}

#[async_trait]
pub trait AccessGenerate: Send + Sync {
    async fn token(
        &self,
        cancel: &CancellationToken,
        grant: &GrantRequest,
        want_refresh: bool,
    ) -> Result<TokenPair, GenerateError>;
}

pub struct AccessGenerator {
    store: Arc<dyn ConfigStore>,
    codec: Arc<dyn SecretCodec>,
    login_method: Arc<dyn LoginMethod>,
    registry: Arc<CredentialRegistry>,
    refresh_token_length: usize,
}

impl AccessGenerator {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        codec: Arc<dyn SecretCodec>,
        login_method: Arc<dyn LoginMethod>,
        registry: Arc<CredentialRegistry>,
    ) -> Self {
        Self {
            store,
            codec,
            login_method,
            registry,
            refresh_token_length: DEFAULT_REFRESH_TOKEN_LENGTH,
        }
    }

    /// Length must be a positive multiple of 4
    pub fn with_refresh_token_length(mut self, length: usize) -> Self {
        self.refresh_token_length = length;
        self
    }
}

#[async_trait]
impl AccessGenerate for AccessGenerator {
    async fn token(
        &self,
        cancel: &CancellationToken,
        grant: &GrantRequest,
        want_refresh: bool,
    ) -> Result<TokenPair, GenerateError> {
        let credentials = self.registry.credentials_for(&grant.client_id)?;
        let credentials = validate_credentials(credentials.as_ref())?;

        tracing::info!(
            client_id = %grant.client_id,
            scope = %grant.scope,
            method = %self.login_method,
            "Generating access token"
        );

        let (session, cookies) = self
            .login_method
            .login(cancel, credentials)
            .await
            .map_err(|source| GenerateError::Login {
                method: self.login_method.to_string(),
                source,
            })?;

        store::set_cookies(self.store.as_ref(), self.codec.as_ref(), &cookies)
            .map_err(GenerateError::PersistCookies)?;

        if !want_refresh {
            return Ok(TokenPair {
                access_token: session.access_token,
                refresh_token: String::new(),
            });
        }

        let refresh_token = match session.refresh_token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => mint_refresh_token(self.refresh_token_length)?,
        };

        Ok(TokenPair {
            access_token: session.access_token,
            refresh_token,
        })
    }
}

/// Random token of `length` standard-base64 characters
pub fn mint_refresh_token(length: usize) -> Result<String, rand::Error> {
    let mut bytes = vec![0u8; length / 4 * 3];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(STANDARD.encode(bytes))
}
