//! Login methods
//!
//! A login method turns credentials into a session and the cookies left in
//! the browser. The browser-driven method owns one browser per call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::attempt::LoginAttempt;
use super::error::LoginError;
use super::model::{Cookie, Credentials, Session};
use super::resolver::DEFAULT_POLL_INTERVAL;
use crate::browser::{ControlSurface, Launcher};

/// Grace period for a graceful browser shutdown before it is killed
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait LoginMethod: Send + Sync + fmt::Display {
    async fn login(
        &self,
        cancel: &CancellationToken,
        credentials: &Credentials,
    ) -> Result<(Session, Vec<Cookie>), LoginError>;
}

/// Options of [`BrowserLogin`]
#[derive(Debug, Clone)]
pub struct BrowserLoginOptions {
    pub url: String,
    pub refresh_frequency: Duration,
    pub timeout: Option<Duration>,
    pub screenshot_on_error: bool,
    pub accept_cookies: bool,
}

impl Default for BrowserLoginOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            refresh_frequency: DEFAULT_POLL_INTERVAL,
            timeout: None,
            screenshot_on_error: false,
            accept_cookies: false,
        }
    }
}

impl BrowserLoginOptions {
    pub fn validate(&self) -> Result<(), LoginError> {
        if self.url.is_empty() {
            return Err(LoginError::InvalidOption {
                name: "url",
                reason: "url is empty",
            });
        }

        if self.refresh_frequency.is_zero() {
            return Err(LoginError::InvalidOption {
                name: "refreshFrequency",
                reason: "frequency must be positive",
            });
        }

        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(LoginError::InvalidOption {
                name: "timeout",
                reason: "timeout must be positive",
            });
        }

        Ok(())
    }
}

/// Login by driving a real browser through the portal's screens
pub struct BrowserLogin {
    launcher: Arc<dyn Launcher>,
    options: BrowserLoginOptions,
}

impl BrowserLogin {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        options: BrowserLoginOptions,
    ) -> Result<Self, LoginError> {
        options.validate()?;
        Ok(Self { launcher, options })
    }

    fn attempt(&self) -> LoginAttempt {
        LoginAttempt {
            url: self.options.url.clone(),
            poll_interval: self.options.refresh_frequency,
            timeout: self.options.timeout,
            screenshot_on_error: self.options.screenshot_on_error,
            accept_cookies: self.options.accept_cookies,
        }
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        credentials: &Credentials,
    ) -> Result<(Session, Vec<Cookie>), LoginError> {
        // Browser lifetime, deliberately not derived from the caller's token
        let session = CancellationToken::new();
        let _session_guard = session.clone().drop_guard();

        let surface = self
            .launcher
            .launch(session.clone())
            .await
            .map_err(LoginError::Launch)?;
        tracing::info!("Browser started");

        let result = self
            .attempt()
            .run(surface.clone(), &session, cancel, credentials)
            .await;

        close_browser(surface.as_ref()).await;
        result
    }
}

impl fmt::Display for BrowserLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("chrome")
    }
}

#[async_trait]
impl LoginMethod for BrowserLogin {
    async fn login(
        &self,
        cancel: &CancellationToken,
        credentials: &Credentials,
    ) -> Result<(Session, Vec<Cookie>), LoginError> {
        credentials.validate()?;

        let span = tracing::info_span!("login", attempt = %Uuid::new_v4());
        let result = self.run(cancel, credentials).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok((session, cookies)) => {
                tracing::info!(expiry = %session.expiry, cookies = cookies.len(), "Login done")
            }
            Err(e) => tracing::warn!("Login failed: {}", e),
        });

        result
    }
}

/// Close gracefully, killing the browser if that fails or takes too long
async fn close_browser(surface: &dyn ControlSurface) {
    match tokio::time::timeout(CLOSE_TIMEOUT, surface.close()).await {
        Ok(Ok(())) => {
            tracing::info!("Browser closed");
            return;
        }
        Ok(Err(e)) => tracing::warn!("Failed to close browser: {}", e),
        Err(_) => tracing::warn!("Timed out closing browser after {:?}", CLOSE_TIMEOUT),
    }

    match surface.kill().await {
        Ok(()) => tracing::info!("Browser killed"),
        Err(e) => tracing::error!("Failed to kill browser: {}", e),
    }
}
