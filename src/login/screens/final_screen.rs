use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{Screen, has_element};
use crate::browser::{ControlSurface, RawCookie};
use crate::login::error::{InvalidTokenError, ScreenError};
use crate::login::model::{Cookie, SameSite, Session, unix_float_to_time};

/// Privacy popin shown on the authenticated landing page
const LOGGED_IN_MARKER: &str = "#popin_tc_privacy_button";

const ACCESS_TOKEN_JS: &str = r#"sessionStorage.getItem("access_token")"#;
const EXPIRES_AT_JS: &str = r#"sessionStorage.getItem("app_expires_at")"#;

/// Receiving end of the session extracted by [`FinalScreen`]
pub type SessionHandoff = oneshot::Receiver<(Session, Vec<Cookie>)>;

/// Authenticated page: extract the session and cookies
///
/// The first successful extraction is sent through the handoff channel;
/// later ones are dropped.
pub struct FinalScreen {
    handoff: Mutex<Option<oneshot::Sender<(Session, Vec<Cookie>)>>>,
}

impl FinalScreen {
    pub fn new() -> (Self, SessionHandoff) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                handoff: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl fmt::Display for FinalScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("final")
    }
}

#[async_trait]
impl Screen for FinalScreen {
    async fn matches(&self, surface: &dyn ControlSurface) -> bool {
        has_element(surface, LOGGED_IN_MARKER).await
    }

    async fn act(&self, surface: &dyn ControlSurface) -> Result<(), ScreenError> {
        tracing::info!("Fetching token from browser");

        let access_token = surface.poll(ACCESS_TOKEN_JS).await?;
        let expires_at = surface.poll(EXPIRES_AT_JS).await?;

        let expiry = expires_at
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(unix_float_to_time)
            .ok_or_else(|| ScreenError::Expiry(expires_at.clone()))?;

        let session = Session {
            access_token,
            refresh_token: None,
            expiry,
        };

        if !session.is_valid() {
            return Err(InvalidTokenError {
                access_token_empty: session.access_token.is_empty(),
                expiry: session.expiry,
            }
            .into());
        }

        let location = surface.location().await?;
        let cookies: Vec<Cookie> = surface
            .cookies()
            .await?
            .into_iter()
            .map(convert_cookie)
            .collect();

        tracing::info!(
            %location,
            cookies = cookies.len(),
            expiry = %session.expiry,
            "Session extracted"
        );

        let Some(sender) = self.handoff.lock().take() else {
            tracing::debug!("Session already handed off");
            return Ok(());
        };

        if sender.send((session, cookies)).is_err() {
            tracing::debug!("Login attempt no longer waiting for a session");
        }

        Ok(())
    }

    fn blocks_for_response(&self) -> bool {
        false
    }
}

fn convert_cookie(raw: RawCookie) -> Cookie {
    Cookie {
        expires: unix_float_to_time(raw.expires),
        same_site: SameSite::from_browser(raw.same_site.as_deref()),
        name: raw.name,
        value: raw.value,
        path: raw.path,
        domain: raw.domain,
        secure: raw.secure,
        http_only: raw.http_only,
    }
}
