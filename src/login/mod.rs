//! Browser-driven login to the document portal
//!
//! Starts a browser, walks whatever screens the portal decides to show
//! (cookie consent, credentials, OTP, trusted device) in any order, and
//! extracts the session and cookies once the user is logged in.

pub mod attempt;
pub mod error;
pub mod method;
pub mod model;
pub mod resolver;
pub mod screens;
pub mod totp;

pub use error::LoginError;
pub use method::{BrowserLogin, BrowserLoginOptions, LoginMethod};
pub use model::{Cookie, Credentials, CredentialsError, Session, validate_credentials};
