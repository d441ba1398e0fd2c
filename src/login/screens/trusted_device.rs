use std::fmt;

use async_trait::async_trait;

use super::{LINK_LATER, Screen, has_element};
use crate::browser::ControlSurface;
use crate::login::error::ScreenError;

const TRUST_FORM: &str = "#save-trusted-device-form";

/// "Trust this device?" prompt, always declined
pub struct TrustedDeviceScreen;

impl fmt::Display for TrustedDeviceScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("trusted device")
    }
}

#[async_trait]
impl Screen for TrustedDeviceScreen {
    async fn matches(&self, surface: &dyn ControlSurface) -> bool {
        has_element(surface, TRUST_FORM).await
    }

    async fn act(&self, surface: &dyn ControlSurface) -> Result<(), ScreenError> {
        surface.wait_visible(LINK_LATER).await?;
        surface.click(LINK_LATER).await?;
        Ok(())
    }

    fn blocks_for_response(&self) -> bool {
        true
    }
}
