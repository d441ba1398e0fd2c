use std::fmt;

use async_trait::async_trait;

use super::{Screen, has_element};
use crate::browser::ControlSurface;
use crate::login::error::ScreenError;

const REJECT_BUTTON: &str = "#footer_tc_privacy_button_3";
const ACCEPT_BUTTON: &str = "#footer_tc_privacy_button_2";

/// Cookie consent banner
pub struct ConsentScreen {
    accept: bool,
}

impl ConsentScreen {
    pub fn new(accept: bool) -> Self {
        Self { accept }
    }
}

impl fmt::Display for ConsentScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cookie consent")
    }
}

#[async_trait]
impl Screen for ConsentScreen {
    async fn matches(&self, surface: &dyn ControlSurface) -> bool {
        has_element(surface, REJECT_BUTTON).await
    }

    async fn act(&self, surface: &dyn ControlSurface) -> Result<(), ScreenError> {
        let button = if self.accept {
            ACCEPT_BUTTON
        } else {
            REJECT_BUTTON
        };
        surface.click(button).await?;
        Ok(())
    }

    fn blocks_for_response(&self) -> bool {
        false
    }
}
