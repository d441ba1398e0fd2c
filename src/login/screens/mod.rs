//! Login screens
//!
//! Each screen knows how to recognise itself on the current page and how to
//! act on it. Screens are raced against each other by the resolver.

mod consent;
mod credentials;
mod final_screen;
mod landing;
mod otp;
mod trusted_device;

use std::fmt;

use async_trait::async_trait;

pub use consent::ConsentScreen;
pub use credentials::CredentialsScreen;
pub use final_screen::{FinalScreen, SessionHandoff};
pub use landing::LandingScreen;
pub use otp::OtpScreen;
pub use trusted_device::TrustedDeviceScreen;

use super::error::{HttpResponseError, ScreenError};
use crate::browser::ControlSurface;

/// Selector of the primary submit button on the login forms
pub(crate) const SUBMIT: &str = "#submit";

/// Selector of the "later" link on the OTP and trusted-device screens
pub(crate) const LINK_LATER: &str = "#linkLater";

#[async_trait]
pub trait Screen: Send + Sync + fmt::Display {
    /// Whether the current page shows this screen; query failures count as no
    async fn matches(&self, surface: &dyn ControlSurface) -> bool;

    async fn act(&self, surface: &dyn ControlSurface) -> Result<(), ScreenError>;

    /// Whether acting triggers a navigation whose response must be checked
    fn blocks_for_response(&self) -> bool;
}

/// Act on a screen, checking the navigation response when the screen blocks for one
pub async fn perform(screen: &dyn Screen, surface: &dyn ControlSurface) -> Result<(), ScreenError> {
    if !screen.blocks_for_response() {
        return screen.act(surface).await;
    }

    // Listening starts before acting so an earlier page load is never reported
    let response = surface.listen_response().await?;
    screen.act(surface).await?;

    match response.await? {
        Some(response) if response.status >= 400 => Err(HttpResponseError {
            status: response.status,
            status_text: response.status_text,
        }
        .into()),
        _ => Ok(()),
    }
}

/// Whether at least one element matches `selector`
pub(crate) async fn has_element(surface: &dyn ControlSurface, selector: &str) -> bool {
    match surface.count(selector).await {
        Ok(count) => count > 0,
        Err(e) => {
            tracing::debug!(selector, "Element query failed: {}", e);
            false
        }
    }
}

/// Wait until `selector` is visible and enabled, then click it
pub(crate) async fn click_when_ready(
    surface: &dyn ControlSurface,
    selector: &str,
) -> Result<(), ScreenError> {
    surface.wait_visible(selector).await?;
    surface.wait_enabled(selector).await?;
    surface.click(selector).await?;
    Ok(())
}

/// Wait until the input is visible, focus it, and replace its content
pub(crate) async fn fill_input(
    surface: &dyn ControlSurface,
    selector: &str,
    text: &str,
) -> Result<(), ScreenError> {
    surface.wait_visible(selector).await?;
    surface.click(selector).await?;
    surface.clear_and_type(selector, text).await?;
    Ok(())
}
