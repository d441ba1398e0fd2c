//! Browser control surface
//!
//! The capability the login engine drives: navigation, selector-based DOM
//! queries and input, script polling, cookie and screenshot capture, and the
//! browser process lifecycle.
//!
//! Calls may be issued concurrently from several screen watchers against the
//! same surface; implementations must serialise them safely.

pub mod chrome;
#[cfg(test)]
pub mod fake;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use chrome::ChromeLauncher;

/// Failure of a control-surface call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op}: {message}")]
pub struct BrowserError {
    /// Operation that failed (e.g. "click", "navigate")
    pub op: &'static str,
    pub message: String,
}

impl BrowserError {
    pub fn new(op: &'static str, message: impl ToString) -> Self {
        Self {
            op,
            message: message.to_string(),
        }
    }
}

/// Cookie record as reported by the browser
#[derive(Debug, Clone, PartialEq)]
pub struct RawCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Fractional Unix seconds, non-positive for session cookies
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<String>,
}

/// Response of the main-frame navigation that followed an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResponse {
    pub status: i64,
    pub status_text: String,
}

impl NavigationResponse {
    pub fn new(status: i64, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
        }
    }
}

/// Pending response of the next main-frame navigation
pub type ResponseWaiter = BoxFuture<'static, Result<Option<NavigationResponse>, BrowserError>>;

/// Remote browser page driven by the login engine
///
/// Waiting calls (`wait_visible`, `wait_enabled`, `poll`) wait indefinitely;
/// callers bound them with a deadline.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Number of elements matching `selector`; zero is not an error
    async fn count(&self, selector: &str) -> Result<usize, BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Clear the input matching `selector`, then type `text` into it
    async fn clear_and_type(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    async fn wait_visible(&self, selector: &str) -> Result<(), BrowserError>;

    async fn wait_enabled(&self, selector: &str) -> Result<(), BrowserError>;

    /// Evaluate `expression` until it yields a non-empty value
    async fn poll(&self, expression: &str) -> Result<String, BrowserError>;

    async fn cookies(&self) -> Result<Vec<RawCookie>, BrowserError>;

    /// Current page URL
    async fn location(&self) -> Result<String, BrowserError>;

    /// Start listening for the next main-frame document response.
    ///
    /// Arm it before the action that navigates, then await the waiter. It
    /// resolves to `None` if the page goes away first.
    async fn listen_response(&self) -> Result<ResponseWaiter, BrowserError>;

    async fn full_screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    /// Gracefully close the browser
    async fn close(&self) -> Result<(), BrowserError>;

    /// Force-kill the browser process
    async fn kill(&self) -> Result<(), BrowserError>;
}

/// Starts browser instances
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start a browser and open one page.
    ///
    /// `session` is cancelled by the launcher when the browser connection
    /// ends on its own.
    async fn launch(
        &self,
        session: CancellationToken,
    ) -> Result<Arc<dyn ControlSurface>, BrowserError>;
}
