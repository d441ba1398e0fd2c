//! One-time passcodes
//!
//! Secrets are either a bare base32 key (SHA-1, 6 digits, 30 s step) or an
//! `otpauth://totp/...` URL carrying its own parameters.

use chrono::Utc;
use totp_rs::{Algorithm, Secret, TOTP};
use url::Url;

use super::error::ScreenError;

const DEFAULT_DIGITS: usize = 6;
const DEFAULT_STEP: u64 = 30;
const DIGITS_RANGE: std::ops::RangeInclusive<usize> = 6..=8;

/// Code for the current time
pub fn current_code(secret: &str) -> Result<String, ScreenError> {
    code_at(secret, Utc::now().timestamp().max(0) as u64)
}

/// Code for an explicit Unix time
pub fn code_at(secret: &str, unix_secs: u64) -> Result<String, ScreenError> {
    Ok(parse_secret(secret)?.generate(unix_secs))
}

fn parse_secret(secret: &str) -> Result<TOTP, ScreenError> {
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(ScreenError::EmptyOtpSecret);
    }

    if secret.starts_with("otpauth://") {
        from_url(secret)
    } else {
        build(secret, Algorithm::SHA1, DEFAULT_DIGITS, DEFAULT_STEP)
    }
}

fn from_url(raw: &str) -> Result<TOTP, ScreenError> {
    let url = Url::parse(raw).map_err(|e| ScreenError::OtpSecret(format!("parse url: {e}")))?;

    if url.host_str() != Some("totp") {
        return Err(ScreenError::OtpSecret(format!(
            "unsupported OTP type {:?}",
            url.host_str().unwrap_or_default()
        )));
    }

    let mut secret = None;
    let mut algorithm = Algorithm::SHA1;
    let mut digits = DEFAULT_DIGITS;
    let mut step = DEFAULT_STEP;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" => secret = Some(value.into_owned()),
            "algorithm" => {
                algorithm = match value.to_ascii_uppercase().as_str() {
                    "SHA1" => Algorithm::SHA1,
                    "SHA256" => Algorithm::SHA256,
                    "SHA512" => Algorithm::SHA512,
                    other => {
                        return Err(ScreenError::OtpSecret(format!(
                            "unsupported algorithm {other:?}"
                        )));
                    }
                }
            }
            "digits" => {
                digits = value
                    .parse::<usize>()
                    .ok()
                    .filter(|d| DIGITS_RANGE.contains(d))
                    .ok_or_else(|| ScreenError::OtpSecret(format!("invalid digits {value:?}")))?
            }
            "period" => {
                step = value
                    .parse()
                    .map_err(|_| ScreenError::OtpSecret(format!("invalid period {value:?}")))?
            }
            _ => {}
        }
    }

    let secret = secret.ok_or_else(|| ScreenError::OtpSecret("missing secret".to_string()))?;
    if step == 0 {
        return Err(ScreenError::OtpSecret("period must be positive".to_string()));
    }

    build(&secret, algorithm, digits, step)
}

fn build(
    secret: &str,
    algorithm: Algorithm,
    digits: usize,
    step: u64,
) -> Result<TOTP, ScreenError> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect::<String>()
        .to_ascii_uppercase();

    let bytes = Secret::Encoded(normalized)
        .to_bytes()
        .map_err(|e| ScreenError::OtpSecret(format!("decode secret: {e:?}")))?;

    Ok(TOTP::new_unchecked(algorithm, digits, 1, step, bytes))
}
