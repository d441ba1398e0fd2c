//! Typed accessors over the store keys

use super::{ConfigStore, SecretCodec, StoreError};
use crate::login::model::{Cookie, Credentials};

pub const API_URL_KEY: &str = "api_url";
pub const DOCUMENT_URL_KEY: &str = "document_url";
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const OTP_SECRET_KEY: &str = "otp";
pub const COOKIES_KEY: &str = "cookies";

pub fn api_url(store: &dyn ConfigStore) -> Option<String> {
    store.get(API_URL_KEY)
}

pub fn set_api_url(store: &dyn ConfigStore, url: &str) -> Result<(), StoreError> {
    store.set(API_URL_KEY, url)
}

pub fn document_url(store: &dyn ConfigStore) -> Option<String> {
    store.get(DOCUMENT_URL_KEY)
}

pub fn set_document_url(store: &dyn ConfigStore, url: &str) -> Result<(), StoreError> {
    store.set(DOCUMENT_URL_KEY, url)
}

pub fn username(store: &dyn ConfigStore) -> String {
    store.get(USERNAME_KEY).unwrap_or_default()
}

pub fn set_username(store: &dyn ConfigStore, username: &str) -> Result<(), StoreError> {
    store.set(USERNAME_KEY, username)
}

pub fn password(store: &dyn ConfigStore, codec: &dyn SecretCodec) -> Result<String, StoreError> {
    reveal(store, codec, PASSWORD_KEY)
}

pub fn set_password(
    store: &dyn ConfigStore,
    codec: &dyn SecretCodec,
    password: &str,
) -> Result<(), StoreError> {
    store.set(PASSWORD_KEY, &codec.obscure(password))
}

pub fn otp_secret(store: &dyn ConfigStore, codec: &dyn SecretCodec) -> Result<String, StoreError> {
    reveal(store, codec, OTP_SECRET_KEY)
}

pub fn set_otp_secret(
    store: &dyn ConfigStore,
    codec: &dyn SecretCodec,
    secret: &str,
) -> Result<(), StoreError> {
    store.set(OTP_SECRET_KEY, &codec.obscure(secret))
}

/// Account credentials held by the store, if username and password are both set
pub fn credentials(
    store: &dyn ConfigStore,
    codec: &dyn SecretCodec,
) -> Result<Option<Credentials>, StoreError> {
    let username = username(store);
    let password = password(store, codec)?;
    if username.is_empty() || password.is_empty() {
        return Ok(None);
    }

    Ok(Some(Credentials::new(username, password, otp_secret(store, codec)?)))
}

/// Cookies from the last successful login; empty when none were saved
pub fn cookies(
    store: &dyn ConfigStore,
    codec: &dyn SecretCodec,
) -> Result<Vec<Cookie>, StoreError> {
    let Some(raw) = store.get(COOKIES_KEY) else {
        return Ok(Vec::new());
    };

    let stored: Vec<Cookie> = serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
        key: COOKIES_KEY,
        source,
    })?;

    stored
        .into_iter()
        .map(|mut cookie| {
            check_cookie(&cookie)?;
            cookie.value = codec
                .reveal(&cookie.value)
                .map_err(|message| StoreError::Reveal {
                    key: COOKIES_KEY,
                    message,
                })?;
            Ok(cookie)
        })
        .collect()
}

pub fn set_cookies(
    store: &dyn ConfigStore,
    codec: &dyn SecretCodec,
    cookies: &[Cookie],
) -> Result<(), StoreError> {
    let obscured: Vec<Cookie> = cookies
        .iter()
        .map(|cookie| Cookie {
            value: codec.obscure(&cookie.value),
            ..cookie.clone()
        })
        .collect();

    let json = serde_json::to_string(&obscured).map_err(|source| StoreError::Encode {
        key: COOKIES_KEY,
        source,
    })?;
    store.set(COOKIES_KEY, &json)
}

fn reveal(
    store: &dyn ConfigStore,
    codec: &dyn SecretCodec,
    key: &'static str,
) -> Result<String, StoreError> {
    match store.get(key) {
        Some(value) => codec
            .reveal(&value)
            .map_err(|message| StoreError::Reveal { key, message }),
        None => Ok(String::new()),
    }
}

/// Cookie names must be non-empty HTTP tokens
fn check_cookie(cookie: &Cookie) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidCookie {
        name: cookie.name.clone(),
        reason,
    };

    if cookie.name.is_empty() {
        return Err(invalid("empty name"));
    }

    let is_token = cookie.name.bytes().all(|b| {
        b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
    });
    if !is_token {
        return Err(invalid("name is not a token"));
    }

    Ok(())
}
