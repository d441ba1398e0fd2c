//! Login error taxonomy

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::model::CredentialsError;
use crate::browser::BrowserError;

/// Non-success response to a navigation triggered by a screen action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status} {status_text}")]
pub struct HttpResponseError {
    pub status: i64,
    pub status_text: String,
}

/// Session read from the page was empty or already expired
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid token (access token empty: {access_token_empty}, expiry: {expiry})")]
pub struct InvalidTokenError {
    pub access_token_empty: bool,
    pub expiry: DateTime<Utc>,
}

/// Failure of one screen attempt; the resolver logs it and retries
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("response: {0}")]
    HttpResponse(#[from] HttpResponseError),

    #[error(transparent)]
    InvalidToken(#[from] InvalidTokenError),

    #[error("empty OTP secret")]
    EmptyOtpSecret,

    #[error("OTP secret: {0}")]
    OtpSecret(String),

    #[error("parse token expiry {0:?}")]
    Expiry(String),

    #[error("missing option {0:?}")]
    MissingOption(&'static str),

    #[error("deadline exceeded")]
    Timeout,

    #[error("context canceled")]
    Canceled,
}

impl ScreenError {
    /// Deadline and cancellation are expected while racing screens
    pub fn is_benign(&self) -> bool {
        matches!(self, ScreenError::Timeout | ScreenError::Canceled)
    }
}

/// Failure of a whole login
#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error("option {name:?}: {reason}")]
    InvalidOption {
        name: &'static str,
        reason: &'static str,
    },

    #[error("start browser: {0}")]
    Launch(#[source] BrowserError),

    #[error("first screen: {0}")]
    Landing(#[source] ScreenError),

    #[error("context done: deadline exceeded after {0:?}")]
    Timeout(Duration),

    #[error("context done: canceled")]
    Canceled,

    /// Any of the above, with a full-page capture taken when it happened
    #[error("{source}")]
    WithScreenshot {
        source: Box<LoginError>,
        screenshot: Vec<u8>,
    },
}

impl LoginError {
    pub fn screenshot(&self) -> Option<&[u8]> {
        match self {
            LoginError::WithScreenshot { screenshot, .. } => Some(screenshot),
            _ => None,
        }
    }

    /// The error without any attached screenshot
    pub fn inner(&self) -> &LoginError {
        match self {
            LoginError::WithScreenshot { source, .. } => source.inner(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.inner(), LoginError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_wrapper_displays_inner_error() {
        let err = LoginError::WithScreenshot {
            source: Box::new(LoginError::Timeout(Duration::from_millis(200))),
            screenshot: vec![0x89, b'P', b'N', b'G'],
        };

        assert_eq!(
            err.to_string(),
            LoginError::Timeout(Duration::from_millis(200)).to_string()
        );
        assert_eq!(err.screenshot(), Some(&[0x89, b'P', b'N', b'G'][..]));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_plain_error_has_no_screenshot() {
        let err = LoginError::Canceled;
        assert!(err.screenshot().is_none());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_invalid_option_message() {
        let err = LoginError::InvalidOption {
            name: "timeout",
            reason: "timeout must be positive",
        };
        assert_eq!(err.to_string(), r#"option "timeout": timeout must be positive"#);
    }

    #[test]
    fn test_benign_screen_errors() {
        assert!(ScreenError::Timeout.is_benign());
        assert!(ScreenError::Canceled.is_benign());
        assert!(!ScreenError::EmptyOtpSecret.is_benign());
        assert!(
            !ScreenError::HttpResponse(HttpResponseError {
                status: 500,
                status_text: "Internal Server Error".to_string(),
            })
            .is_benign()
        );
    }
}
