use std::fmt;

use async_trait::async_trait;

use super::{SUBMIT, Screen, click_when_ready, fill_input, has_element};
use crate::browser::ControlSurface;
use crate::login::error::ScreenError;
use crate::login::model::Credentials;

const LOGIN_FORM: &str = "form[name=login-form]";
const USERNAME_INPUT: &str = "#username";
const PASSWORD_INPUT: &str = "#password";

/// Username and password form
pub struct CredentialsScreen {
    credentials: Credentials,
}

impl CredentialsScreen {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl fmt::Display for CredentialsScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("credentials")
    }
}

#[async_trait]
impl Screen for CredentialsScreen {
    async fn matches(&self, surface: &dyn ControlSurface) -> bool {
        if self.credentials.validate().is_err() {
            return false;
        }
        has_element(surface, LOGIN_FORM).await
    }

    async fn act(&self, surface: &dyn ControlSurface) -> Result<(), ScreenError> {
        surface.wait_visible(SUBMIT).await?;
        surface.wait_enabled(SUBMIT).await?;

        fill_input(surface, USERNAME_INPUT, self.credentials.username()).await?;
        fill_input(surface, PASSWORD_INPUT, self.credentials.password()).await?;

        click_when_ready(surface, SUBMIT).await
    }

    fn blocks_for_response(&self) -> bool {
        true
    }
}
