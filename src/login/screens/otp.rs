use std::fmt;

use async_trait::async_trait;

use super::{LINK_LATER, SUBMIT, Screen, click_when_ready, has_element};
use crate::browser::ControlSurface;
use crate::login::error::ScreenError;
use crate::login::totp;

const OTP_INPUT: &str = "#otpCode";

/// One-time passcode form
pub struct OtpScreen {
    secret: String,
}

impl OtpScreen {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl fmt::Display for OtpScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("otp")
    }
}

#[async_trait]
impl Screen for OtpScreen {
    async fn matches(&self, surface: &dyn ControlSurface) -> bool {
        has_element(surface, OTP_INPUT).await
    }

    async fn act(&self, surface: &dyn ControlSurface) -> Result<(), ScreenError> {
        if self.secret.is_empty() {
            return Err(ScreenError::EmptyOtpSecret);
        }

        let code = totp::current_code(&self.secret)?;

        // OTP not enforced on this account: skip the enrolment prompt
        if surface.count(LINK_LATER).await.unwrap_or(0) > 0 {
            surface.click(LINK_LATER).await?;
        }

        surface.wait_visible(OTP_INPUT).await?;
        surface.wait_enabled(OTP_INPUT).await?;
        surface.clear_and_type(OTP_INPUT, &code).await?;

        click_when_ready(surface, SUBMIT).await
    }

    fn blocks_for_response(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeSurface;

    const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[tokio::test]
    async fn test_otp_types_code_and_submits() {
        let surface = FakeSurface::new()
            .with_element(OTP_INPUT)
            .with_element(SUBMIT);
        let screen = OtpScreen::new(SECRET);

        assert!(screen.matches(&surface).await);
        screen.act(&surface).await.unwrap();

        let typed = surface.typed();
        assert_eq!(typed.len(), 1);
        assert_eq!(typed[0].0, OTP_INPUT);
        assert_eq!(typed[0].1.len(), 6);
        assert_eq!(surface.hits(SUBMIT), 1);
        assert_eq!(surface.hits(LINK_LATER), 0);
    }

    #[tokio::test]
    async fn test_otp_dismisses_enrolment_prompt() {
        let surface = FakeSurface::new()
            .with_element(OTP_INPUT)
            .with_element(SUBMIT)
            .with_element(LINK_LATER);
        OtpScreen::new(SECRET).act(&surface).await.unwrap();
        assert_eq!(surface.hits(LINK_LATER), 1);
    }

    #[tokio::test]
    async fn test_otp_empty_secret_fails_fast() {
        let surface = FakeSurface::new()
            .with_element(OTP_INPUT)
            .with_element(SUBMIT);
        let err = OtpScreen::new("").act(&surface).await.unwrap_err();

        assert_eq!(err.to_string(), "empty OTP secret");
        assert!(surface.actions().is_empty());
    }
}
