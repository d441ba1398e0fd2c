//! One login attempt against an already-started browser
//!
//! Two cancellation trees are involved. The caller's token (plus the
//! optional timeout) bounds the attempt; the browser session token outlives
//! it so a screenshot can still be taken after the attempt gave up.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::LoginError;
use super::model::{Cookie, Credentials, Session};
use super::resolver::{ResolutionState, Resolver};
use super::screens::{
    ConsentScreen, CredentialsScreen, FinalScreen, LandingScreen, OtpScreen, Screen,
    TrustedDeviceScreen, perform,
};
use crate::browser::ControlSurface;

/// Upper bound for the best-effort failure screenshot
const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters of one attempt
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub url: String,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
    pub screenshot_on_error: bool,
    pub accept_cookies: bool,
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl LoginAttempt {
    /// Drive the login flow to a session.
    ///
    /// `session` is the browser's own lifetime; `cancel` is the caller's.
    pub async fn run(
        &self,
        surface: Arc<dyn ControlSurface>,
        session: &CancellationToken,
        cancel: &CancellationToken,
        credentials: &Credentials,
    ) -> Result<(Session, Vec<Cookie>), LoginError> {
        let started = Instant::now();

        let outer = cancel.child_token();
        let _timer = self.timeout.map(|timeout| {
            let outer = outer.clone();
            AbortOnDrop(tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                outer.cancel();
            }))
        });

        let attached = attach(session, &outer);
        let _attached_guard = attached.clone().drop_guard();

        let result = self
            .drive(surface.clone(), &attached, &outer, started, credentials)
            .await;

        match result {
            Ok(extracted) => Ok(extracted),
            Err(err) => Err(self.with_screenshot(surface.as_ref(), session, err).await),
        }
    }

    async fn drive(
        &self,
        surface: Arc<dyn ControlSurface>,
        attached: &CancellationToken,
        outer: &CancellationToken,
        started: Instant,
        credentials: &Credentials,
    ) -> Result<(Session, Vec<Cookie>), LoginError> {
        let landing = LandingScreen::new(&self.url);
        tokio::select! {
            _ = attached.cancelled() => return Err(self.cancel_reason(started)),
            result = perform(&landing, surface.as_ref()) => result.map_err(LoginError::Landing)?,
        }

        let (final_screen, mut handoff) = FinalScreen::new();
        let screens: Vec<Arc<dyn Screen>> = vec![
            Arc::new(ConsentScreen::new(self.accept_cookies)),
            Arc::new(CredentialsScreen::new(credentials.clone())),
            Arc::new(OtpScreen::new(credentials.otp_secret())),
            Arc::new(TrustedDeviceScreen),
            Arc::new(final_screen),
        ];

        let state = Arc::new(ResolutionState::new());
        let resolver = Resolver::new(screens, self.poll_interval);
        tokio::spawn({
            let (state, attached) = (state.clone(), attached.clone());
            async move { resolver.resolve(surface, state, attached).await }
        });

        tokio::select! {
            biased;
            extracted = &mut handoff => match extracted {
                Ok(extracted) => {
                    state.mark_succeeded();
                    tracing::info!("Login succeeded");
                    Ok(extracted)
                }
                // every watcher is gone, which only happens once cancelled
                Err(_) => Err(self.cancel_reason(started)),
            },
            _ = outer.cancelled() => Err(self.cancel_reason(started)),
        }
    }

    fn cancel_reason(&self, started: Instant) -> LoginError {
        match self.timeout {
            Some(timeout) if started.elapsed() >= timeout => LoginError::Timeout(timeout),
            _ => LoginError::Canceled,
        }
    }

    /// Attach a full-page capture when enabled and the browser is still up
    async fn with_screenshot(
        &self,
        surface: &dyn ControlSurface,
        session: &CancellationToken,
        err: LoginError,
    ) -> LoginError {
        if !self.screenshot_on_error {
            return err;
        }

        let capture = tokio::time::timeout(SCREENSHOT_TIMEOUT, surface.full_screenshot());
        let capture = tokio::select! {
            _ = session.cancelled() => None,
            result = capture => match result {
                Ok(Ok(bytes)) => Some(bytes),
                Ok(Err(e)) => {
                    tracing::warn!("Failed to capture screenshot: {}", e);
                    None
                }
                Err(_) => {
                    tracing::warn!("Timed out capturing screenshot");
                    None
                }
            },
        };

        match capture {
            Some(screenshot) => LoginError::WithScreenshot {
                source: Box::new(err),
                screenshot,
            },
            None => err,
        }
    }
}

/// Token living under the browser session that also fires when `outer` does
fn attach(session: &CancellationToken, outer: &CancellationToken) -> CancellationToken {
    let attached = session.child_token();

    tokio::spawn({
        let (session, outer, attached) = (session.clone(), outer.clone(), attached.clone());
        async move {
            tokio::select! {
                _ = session.cancelled() => {}
                _ = attached.cancelled() => {}
                _ = outer.cancelled() => attached.cancel(),
            }
        }
    });

    attached
}
