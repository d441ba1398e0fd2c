//! Token endpoint
//!
//! Single-grant OAuth surface: a registered client exchanges its id and
//! secret for an access token obtained by logging into the portal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::generator::{AccessGenerate, GenerateError, GrantRequest};
use super::registry::CredentialRegistry;
use super::types::{OAuthErrorResponse, TokenRequest, TokenResponse};
use crate::common::auth::extract_basic_credentials;

const CLIENT_CREDENTIALS: &str = "client_credentials";

/// Token endpoint state
#[derive(Clone)]
pub struct TokenState {
    pub generator: Arc<dyn AccessGenerate>,
    pub registry: Arc<CredentialRegistry>,
    /// Lifetime reported in `expires_in`, in seconds
    pub expires_in: u64,
    /// Where screenshots of failed logins are written
    pub screenshot_dir: Option<PathBuf>,
}

/// Create token router
///
/// # Endpoints
/// - `POST /token` - Client credentials grant
pub fn create_token_router(state: TokenState) -> Router {
    Router::new()
        .route("/token", post(handle_token))
        .with_state(state)
}

/// Handle token request (POST /token)
async fn handle_token(
    State(state): State<TokenState>,
    headers: HeaderMap,
    Form(req): Form<TokenRequest>,
) -> Response {
    let client = match (req.client_id, req.client_secret) {
        (Some(id), Some(secret)) => Some((id, secret)),
        _ => extract_basic_credentials(&headers),
    };

    let Some((client_id, client_secret)) = client else {
        return error_response(StatusCode::UNAUTHORIZED, OAuthErrorResponse::invalid_client());
    };

    if !state.registry.verify_secret(&client_id, &client_secret) {
        tracing::warn!(client_id = %client_id, "Client authentication failed");
        return error_response(StatusCode::UNAUTHORIZED, OAuthErrorResponse::invalid_client());
    }

    if req.grant_type != CLIENT_CREDENTIALS {
        return error_response(
            StatusCode::BAD_REQUEST,
            OAuthErrorResponse::unsupported_grant_type(&req.grant_type),
        );
    }

    // Dropped with this future when the client goes away, aborting the login
    let cancel = CancellationToken::new();
    let _cancel_guard = cancel.clone().drop_guard();

    let grant = GrantRequest {
        client_id: client_id.clone(),
        scope: req.scope.clone(),
    };

    match state.generator.token(&cancel, &grant, true).await {
        Ok(pair) => {
            let body = TokenResponse {
                access_token: pair.access_token,
                token_type: "Bearer".to_string(),
                expires_in: state.expires_in,
                refresh_token: Some(pair.refresh_token).filter(|t| !t.is_empty()),
                scope: req.scope,
            };
            (
                StatusCode::OK,
                [(header::CACHE_CONTROL, "no-store")],
                Json(body),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(client_id = %client_id, "Token generation failed: {}", e);
            generate_error_response(&state, &client_id, e).await
        }
    }
}

async fn generate_error_response(
    state: &TokenState,
    client_id: &str,
    err: GenerateError,
) -> Response {
    match &err {
        GenerateError::Credentials(_) => error_response(
            StatusCode::BAD_REQUEST,
            OAuthErrorResponse::invalid_request(err.to_string()),
        ),
        GenerateError::Login { source, .. } => {
            if let (Some(dir), Some(screenshot)) = (&state.screenshot_dir, source.screenshot()) {
                save_screenshot(dir, client_id, screenshot).await;
            }
            error_response(
                StatusCode::BAD_GATEWAY,
                OAuthErrorResponse::server_error(err.to_string()),
            )
        }
        GenerateError::RegistryShape(_)
        | GenerateError::PersistCookies(_)
        | GenerateError::RefreshToken(_) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            OAuthErrorResponse::server_error(err.to_string()),
        ),
    }
}

fn error_response(status: StatusCode, body: OAuthErrorResponse) -> Response {
    (status, [(header::CACHE_CONTROL, "no-store")], Json(body)).into_response()
}

/// Write a failure screenshot; errors are only logged
async fn save_screenshot(dir: &Path, client_id: &str, screenshot: &[u8]) {
    let safe_id: String = client_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let path = dir.join(format!(
        "login-{}-{}.png",
        safe_id,
        Utc::now().format("%Y%m%dT%H%M%S%.3f")
    ));

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!("Failed to create screenshot directory {}: {}", dir.display(), e);
        return;
    }

    match tokio::fs::write(&path, screenshot).await {
        Ok(()) => tracing::info!("Login screenshot saved to {}", path.display()),
        Err(e) => tracing::warn!("Failed to save screenshot {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    use super::*;
    use crate::login::{Credentials, LoginError};
    use crate::oauth::generator::TokenPair;

    enum Outcome {
        Token,
        Timeout { screenshot: bool },
        MissingUsername,
    }

    struct StubGenerator {
        outcome: Outcome,
        grants: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AccessGenerate for StubGenerator {
        async fn token(
            &self,
            _cancel: &CancellationToken,
            grant: &GrantRequest,
            want_refresh: bool,
        ) -> Result<TokenPair, GenerateError> {
            self.grants.lock().push(grant.client_id.clone());
            match self.outcome {
                Outcome::Token => Ok(TokenPair {
                    access_token: "AT1".to_string(),
                    refresh_token: if want_refresh { "RT1".to_string() } else { String::new() },
                }),
                Outcome::Timeout { screenshot } => {
                    let timeout = LoginError::Timeout(Duration::from_secs(30));
                    let source = if screenshot {
                        LoginError::WithScreenshot {
                            source: Box::new(timeout),
                            screenshot: b"\x89PNG".to_vec(),
                        }
                    } else {
                        timeout
                    };
                    Err(GenerateError::Login {
                        method: "chrome".to_string(),
                        source,
                    })
                }
                Outcome::MissingUsername => Err(Credentials::new("", "x", "")
                    .validate()
                    .unwrap_err()
                    .into()),
            }
        }
    }

    fn app(outcome: Outcome, screenshot_dir: Option<PathBuf>) -> (Router, Arc<StubGenerator>) {
        let registry = Arc::new(CredentialRegistry::in_memory());
        registry
            .register("client-1", "s3cret", "", &Credentials::new("alice", "hunter2", ""))
            .unwrap();

        let generator = Arc::new(StubGenerator {
            outcome,
            grants: Mutex::new(Vec::new()),
        });
        let router = create_token_router(TokenState {
            generator: generator.clone(),
            registry,
            expires_in: 3600,
            screenshot_dir,
        });
        (router, generator)
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_token_success() {
        let (app, generator) = app(Outcome::Token, None);
        let response = app
            .oneshot(form_request(
                "grant_type=client_credentials&client_id=client-1&client_secret=s3cret",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let body = json_body(response).await;
        assert_eq!(body["access_token"], "AT1");
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 3600);
        assert_eq!(body["refresh_token"], "RT1");
        assert_eq!(*generator.grants.lock(), vec!["client-1"]);
    }

    #[tokio::test]
    async fn test_token_basic_auth() {
        let (app, _generator) = app(Outcome::Token, None);
        let request = Request::builder()
            .method("POST")
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(
                header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode("client-1:s3cret")),
            )
            .body(Body::from("grant_type=client_credentials"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_token_wrong_secret() {
        let (app, generator) = app(Outcome::Token, None);
        let response = app
            .oneshot(form_request(
                "grant_type=client_credentials&client_id=client-1&client_secret=nope",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "invalid_client");
        assert!(generator.grants.lock().is_empty());
    }

    #[tokio::test]
    async fn test_token_unsupported_grant() {
        let (app, _generator) = app(Outcome::Token, None);
        let response = app
            .oneshot(form_request(
                "grant_type=password&client_id=client-1&client_secret=s3cret",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "unsupported_grant_type");
    }

    #[tokio::test]
    async fn test_token_credentials_error() {
        let (app, _generator) = app(Outcome::MissingUsername, None);
        let response = app
            .oneshot(form_request(
                "grant_type=client_credentials&client_id=client-1&client_secret=s3cret",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert_eq!(
            body["error_description"],
            r#"invalid credentials: missing field "username""#
        );
    }

    #[tokio::test]
    async fn test_token_login_failure_saves_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("shots");
        let (app, _generator) = app(Outcome::Timeout { screenshot: true }, Some(shots.clone()));

        let response = app
            .oneshot(form_request(
                "grant_type=client_credentials&client_id=client-1&client_secret=s3cret",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"], "server_error");

        let saved: Vec<_> = std::fs::read_dir(&shots).unwrap().collect();
        assert_eq!(saved.len(), 1);
        let path = saved[0].as_ref().unwrap().path();
        assert_eq!(std::fs::read(path).unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn test_token_login_failure_without_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("shots");
        let (app, _generator) = app(Outcome::Timeout { screenshot: false }, Some(shots.clone()));

        let response = app
            .oneshot(form_request(
                "grant_type=client_credentials&client_id=client-1&client_secret=s3cret",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(!shots.exists());
    }
}
