//! Login data model
//!
//! Credentials handed to a login method, and the session and cookies a
//! successful login extracts from the browser.

use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A session expiring within this many seconds is already treated as expired
const EXPIRY_DELTA_SECS: i64 = 10;

/// Account credentials for the target application
///
/// Immutable once constructed. An empty OTP secret is legal: the OTP screen
/// then fails fast instead of typing a code.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    username: String,
    password: String,
    #[serde(default)]
    otp_secret: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        otp_secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            otp_secret: otp_secret.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn otp_secret(&self) -> &str {
        &self.otp_secret
    }

    /// Check that username and password are both set
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.username.is_empty() {
            return Err(CredentialsError::MissingField { field: "username" });
        }

        if self.password.is_empty() {
            return Err(CredentialsError::MissingField { field: "password" });
        }

        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("has_otp_secret", &!self.otp_secret.is_empty())
            .finish()
    }
}

/// Validate optional credentials, distinguishing "absent" from "incomplete"
pub fn validate_credentials(
    credentials: Option<&Credentials>,
) -> Result<&Credentials, CredentialsError> {
    let credentials = credentials.ok_or(CredentialsError::Nil)?;
    credentials.validate()?;
    Ok(credentials)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("nil credentials")]
    Nil,

    #[error("missing field {field:?}")]
    MissingField { field: &'static str },
}

/// Session extracted from the target application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl Session {
    /// A session is valid when it has an access token that is not about to expire
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty()
            && self.expiry - Duration::seconds(EXPIRY_DELTA_SECS) > Utc::now()
    }
}

/// Cookie same-site policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    #[default]
    Default,
    Lax,
    Strict,
    None,
}

impl SameSite {
    /// Map a browser-reported policy; anything unrecognised is `Default`
    pub fn from_browser(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("lax") => SameSite::Lax,
            Some("strict") => SameSite::Strict,
            Some("none") => SameSite::None,
            _ => SameSite::Default,
        }
    }
}

/// Cookie captured from the browser's cookie jar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub domain: String,
    /// `None` for session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub same_site: SameSite,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: String::new(),
            domain: String::new(),
            expires: None,
            secure: false,
            http_only: false,
            same_site: SameSite::Default,
        }
    }
}

/// Convert a fractional Unix timestamp (seconds) to an absolute time
///
/// Returns `None` for non-positive or non-finite values, which browsers use
/// to mark session cookies.
pub fn unix_float_to_time(unix: f64) -> Option<DateTime<Utc>> {
    if !unix.is_finite() || unix <= 0.0 {
        return None;
    }

    let secs = unix.trunc();
    let nanos = ((unix - secs) * 1_000_000_000.0).round() as u32;

    Utc.timestamp_opt(secs as i64, nanos.min(999_999_999)).single()
}
