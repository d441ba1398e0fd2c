//! Chromium control surface over the DevTools protocol

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    BrowserError, ControlSurface, Launcher, NavigationResponse, RawCookie, ResponseWaiter,
};

/// Delay between two evaluations of a waiting script
const SCRIPT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

const VISIBLE_JS: &str = r#"(function(sel) {
  const el = document.querySelector(sel);
  if (!el) return false;
  const r = el.getBoundingClientRect();
  const s = window.getComputedStyle(el);
  return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
})"#;

const ENABLED_JS: &str = r#"(function(sel) {
  const el = document.querySelector(sel);
  return !!el && !el.disabled;
})"#;

const CLEAR_JS: &str = r#"(function(sel) {
  const el = document.querySelector(sel);
  if (!el) return false;
  try { el.focus(); } catch (_) {}
  el.value = '';
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return true;
})"#;

/// Launches Chromium through chromiumoxide
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    headless: bool,
    language: String,
    executable: Option<PathBuf>,
}

impl ChromeLauncher {
    pub fn new(headless: bool, language: impl Into<String>, executable: Option<PathBuf>) -> Self {
        Self {
            headless,
            language: language.into(),
            executable,
        }
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(
        &self,
        session: CancellationToken,
    ) -> Result<Arc<dyn ControlSurface>, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg(format!("--lang={}", self.language))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        if !self.headless {
            builder = builder.with_head();
        }

        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| BrowserError::new("configure browser", e))?;

        tracing::info!(
            headless = self.headless,
            language = %self.language,
            executable = ?self.executable,
            "Launching chrome"
        );

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::new("launch browser", e))?;

        let handler_task = tokio::spawn(async move {
            while handler.next().await.is_some() {}
            tracing::debug!("Chrome connection closed");
            session.cancel();
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(BrowserError::new("open page", e));
            }
        };

        Ok(Arc::new(ChromeSurface {
            page,
            browser: Mutex::new(browser),
            handler_task,
        }))
    }
}

/// One Chromium page; chromiumoxide multiplexes concurrent commands over
/// its single connection.
pub struct ChromeSurface {
    page: Page,
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
}

impl Drop for ChromeSurface {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

impl ChromeSurface {
    async fn evaluate<T: DeserializeOwned>(
        &self,
        op: &'static str,
        script: String,
    ) -> Result<T, BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::new(op, e))?
            .into_value()
            .map_err(|e| BrowserError::new(op, e))
    }

    /// Re-evaluate a boolean selector check until it holds
    async fn wait_until(
        &self,
        op: &'static str,
        check: &str,
        selector: &str,
    ) -> Result<(), BrowserError> {
        let script = format!("{}({})", check, js_string(selector));
        loop {
            if self.evaluate::<bool>(op, script.clone()).await? {
                return Ok(());
            }
            tokio::time::sleep(SCRIPT_RETRY_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ControlSurface for ChromeSurface {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::new("navigate", e))?;
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        let script = format!("document.querySelectorAll({}).length", js_string(selector));
        self.evaluate("query elements", script).await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::new("click", format!("{selector}: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::new("click", format!("{selector}: {e}")))?;
        Ok(())
    }

    async fn clear_and_type(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let script = format!("{}({})", CLEAR_JS, js_string(selector));
        if !self.evaluate::<bool>("clear input", script).await? {
            return Err(BrowserError::new(
                "clear input",
                format!("no element matches {selector}"),
            ));
        }

        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::new("type", format!("{selector}: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::new("type", format!("{selector}: {e}")))?;
        element
            .type_str(text)
            .await
            .map_err(|e| BrowserError::new("type", format!("{selector}: {e}")))?;
        Ok(())
    }

    async fn wait_visible(&self, selector: &str) -> Result<(), BrowserError> {
        self.wait_until("wait visible", VISIBLE_JS, selector).await
    }

    async fn wait_enabled(&self, selector: &str) -> Result<(), BrowserError> {
        self.wait_until("wait enabled", ENABLED_JS, selector).await
    }

    async fn poll(&self, expression: &str) -> Result<String, BrowserError> {
        loop {
            match self.evaluate::<Value>("poll", expression.to_string()).await? {
                Value::String(value) if !value.is_empty() => return Ok(value),
                Value::Number(value) => return Ok(value.to_string()),
                _ => tokio::time::sleep(SCRIPT_RETRY_INTERVAL).await,
            }
        }
    }

    async fn cookies(&self) -> Result<Vec<RawCookie>, BrowserError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| BrowserError::new("get cookies", e))?;

        Ok(cookies
            .into_iter()
            .map(|cookie| RawCookie {
                name: cookie.name,
                value: cookie.value,
                domain: cookie.domain,
                path: cookie.path,
                expires: cookie.expires,
                http_only: cookie.http_only,
                secure: cookie.secure,
                same_site: cookie.same_site.map(|s| format!("{s:?}")),
            })
            .collect())
    }

    async fn location(&self) -> Result<String, BrowserError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::new("location", e))?;
        Ok(url.unwrap_or_default())
    }

    async fn listen_response(&self) -> Result<ResponseWaiter, BrowserError> {
        let mut events = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| BrowserError::new("listen for response", e))?;
        let main_frame = self
            .page
            .mainframe()
            .await
            .map_err(|e| BrowserError::new("listen for response", e))?;

        Ok(Box::pin(async move {
            while let Some(event) = events.next().await {
                if event.r#type != ResourceType::Document {
                    continue;
                }
                if main_frame.is_some() && event.frame_id != main_frame {
                    continue;
                }
                return Ok(Some(NavigationResponse::new(
                    event.response.status,
                    &event.response.status_text,
                )));
            }
            Ok(None)
        }))
    }

    async fn full_screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();

        self.page
            .screenshot(params)
            .await
            .map_err(|e| BrowserError::new("screenshot", e))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| BrowserError::new("close browser", e))?;
        if let Err(e) = browser.wait().await {
            tracing::debug!("Waiting for chrome to exit failed: {}", e);
        }
        Ok(())
    }

    async fn kill(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.lock().await;
        match browser.kill().await {
            Some(Err(e)) => Err(BrowserError::new("kill browser", e)),
            _ => Ok(()),
        }
    }
}

/// Quote a value as a JavaScript string literal
fn js_string(value: &str) -> String {
    Value::from(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("form[name=login-form]"), r#""form[name=login-form]""#);
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
    }

    #[test]
    fn test_launcher_new() {
        let launcher = ChromeLauncher::new(true, "fr-FR", None);
        assert!(launcher.headless);
        assert_eq!(launcher.language, "fr-FR");
        assert!(launcher.executable.is_none());
    }
}
