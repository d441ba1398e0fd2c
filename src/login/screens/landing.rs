use std::fmt;

use async_trait::async_trait;

use super::Screen;
use crate::browser::ControlSurface;
use crate::login::error::ScreenError;

/// Entry point: navigate to the login URL
///
/// Always matches; it is run once before the other screens are raced.
pub struct LandingScreen {
    url: String,
}

impl LandingScreen {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl fmt::Display for LandingScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("landing")
    }
}

#[async_trait]
impl Screen for LandingScreen {
    async fn matches(&self, _surface: &dyn ControlSurface) -> bool {
        true
    }

    async fn act(&self, surface: &dyn ControlSurface) -> Result<(), ScreenError> {
        if self.url.is_empty() {
            return Err(ScreenError::MissingOption("url"));
        }

        surface.navigate(&self.url).await?;
        Ok(())
    }

    fn blocks_for_response(&self) -> bool {
        true
    }
}
