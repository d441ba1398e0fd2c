//! Scripted in-memory control surface for tests
//!
//! Elements are either present or absent; clicking or navigating can flip
//! that state after a configurable number of hits, which is enough to walk
//! the login screens without a real browser.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::{
    BrowserError, ControlSurface, Launcher, NavigationResponse, RawCookie, ResponseWaiter,
};

const WAIT_STEP: Duration = Duration::from_millis(2);

/// State change applied after a click or navigation
#[derive(Debug, Clone, Default)]
pub struct Transition {
    after: usize,
    hide: Vec<String>,
    show: Vec<String>,
}

impl Transition {
    pub fn new() -> Self {
        Self {
            after: 1,
            ..Default::default()
        }
    }

    /// Apply on the n-th hit instead of the first
    pub fn after(mut self, hits: usize) -> Self {
        self.after = hits;
        self
    }

    pub fn hide(mut self, selector: &str) -> Self {
        self.hide.push(selector.to_string());
        self
    }

    pub fn show(mut self, selector: &str) -> Self {
        self.show.push(selector.to_string());
        self
    }
}

#[derive(Default)]
struct FakeState {
    present: HashSet<String>,
    scripts: HashMap<String, String>,
    transitions: HashMap<String, Vec<Transition>>,
    hits: HashMap<String, usize>,
    actions: Vec<String>,
    typed: Vec<(String, String)>,
    responses: VecDeque<NavigationResponse>,
    navigating: HashSet<String>,
    listeners: Vec<oneshot::Sender<NavigationResponse>>,
    cookies: Vec<RawCookie>,
    screenshot: Option<Vec<u8>>,
    location: String,
    fail_queries: bool,
    fail_close: bool,
    hang_close: bool,
    closed: bool,
    killed: bool,
}

impl FakeState {
    /// Clicks navigate when marked so or when they change the page
    fn navigates(&self, selector: &str) -> bool {
        self.navigating.contains(selector) || self.transitions.contains_key(selector)
    }

    /// Complete a navigation: its response goes to every armed listener
    fn navigated(&mut self) {
        let response = self
            .responses
            .pop_front()
            .unwrap_or_else(|| NavigationResponse::new(200, "OK"));
        for listener in self.listeners.drain(..) {
            let _ = listener.send(response.clone());
        }
    }

    fn hit(&mut self, key: &str) {
        let hits = self.hits.entry(key.to_string()).or_default();
        *hits += 1;
        let hits = *hits;

        let due: Vec<Transition> = self
            .transitions
            .get(key)
            .map(|all| all.iter().filter(|t| t.after == hits).cloned().collect())
            .unwrap_or_default();

        for transition in due {
            for selector in &transition.hide {
                self.present.remove(selector);
            }
            for selector in transition.show {
                self.present.insert(selector);
            }
        }
    }
}

pub struct FakeSurface {
    state: Mutex<FakeState>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                location: "https://portal.test/home".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn with_element(self, selector: &str) -> Self {
        self.state.lock().present.insert(selector.to_string());
        self
    }

    pub fn with_script(self, expression: &str, value: &str) -> Self {
        self.state
            .lock()
            .scripts
            .insert(expression.to_string(), value.to_string());
        self
    }

    /// Register a transition fired by clicking `selector` or navigating to it
    pub fn on_hit(self, selector: &str, transition: Transition) -> Self {
        self.state
            .lock()
            .transitions
            .entry(selector.to_string())
            .or_default()
            .push(transition);
        self
    }

    /// Treat clicks on `selector` as navigations
    pub fn navigates_on(self, selector: &str) -> Self {
        self.state.lock().navigating.insert(selector.to_string());
        self
    }

    /// Queue a navigation response; once drained, responses are 200
    pub fn with_response(self, status: i64) -> Self {
        self.state
            .lock()
            .responses
            .push_back(NavigationResponse::new(status, status_text(status)));
        self
    }

    pub fn with_cookie(self, cookie: RawCookie) -> Self {
        self.state.lock().cookies.push(cookie);
        self
    }

    pub fn with_screenshot(self, bytes: &[u8]) -> Self {
        self.state.lock().screenshot = Some(bytes.to_vec());
        self
    }

    pub fn failing_queries(self) -> Self {
        self.state.lock().fail_queries = true;
        self
    }

    pub fn failing_close(self) -> Self {
        self.state.lock().fail_close = true;
        self
    }

    pub fn hanging_close(self) -> Self {
        self.state.lock().hang_close = true;
        self
    }

    pub fn show(&self, selector: &str) {
        self.state.lock().present.insert(selector.to_string());
    }

    pub fn hits(&self, selector: &str) -> usize {
        self.state.lock().hits.get(selector).copied().unwrap_or(0)
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().typed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn is_killed(&self) -> bool {
        self.state.lock().killed
    }

    fn is_present(&self, selector: &str) -> bool {
        self.state.lock().present.contains(selector)
    }
}

#[async_trait]
impl ControlSurface for FakeSurface {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        state.actions.push(format!("navigate {url}"));
        state.location = url.to_string();
        state.hit(url);
        state.navigated();
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        let state = self.state.lock();
        if state.fail_queries {
            return Err(BrowserError::new("query elements", "target closed"));
        }
        Ok(usize::from(state.present.contains(selector)))
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        if !state.present.contains(selector) {
            return Err(BrowserError::new(
                "click",
                format!("no element matches {selector}"),
            ));
        }
        state.actions.push(format!("click {selector}"));
        state.hit(selector);
        if state.navigates(selector) {
            state.navigated();
        }
        Ok(())
    }

    async fn clear_and_type(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        if !state.present.contains(selector) {
            return Err(BrowserError::new(
                "clear input",
                format!("no element matches {selector}"),
            ));
        }
        state.actions.push(format!("type {selector}"));
        state.typed.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn wait_visible(&self, selector: &str) -> Result<(), BrowserError> {
        while !self.is_present(selector) {
            tokio::time::sleep(WAIT_STEP).await;
        }
        Ok(())
    }

    async fn wait_enabled(&self, selector: &str) -> Result<(), BrowserError> {
        self.wait_visible(selector).await
    }

    async fn poll(&self, expression: &str) -> Result<String, BrowserError> {
        loop {
            if let Some(value) = self.state.lock().scripts.get(expression) {
                return Ok(value.clone());
            }
            tokio::time::sleep(WAIT_STEP).await;
        }
    }

    async fn cookies(&self) -> Result<Vec<RawCookie>, BrowserError> {
        Ok(self.state.lock().cookies.clone())
    }

    async fn location(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().location.clone())
    }

    async fn listen_response(&self) -> Result<ResponseWaiter, BrowserError> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().listeners.push(tx);
        Ok(Box::pin(async move { Ok(rx.await.ok()) }))
    }

    async fn full_screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.state
            .lock()
            .screenshot
            .clone()
            .ok_or_else(|| BrowserError::new("screenshot", "no screenshot scripted"))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let (fail, hang) = {
            let state = self.state.lock();
            (state.fail_close, state.hang_close)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(BrowserError::new("close browser", "connection reset"));
        }
        self.state.lock().closed = true;
        Ok(())
    }

    async fn kill(&self) -> Result<(), BrowserError> {
        self.state.lock().killed = true;
        Ok(())
    }
}

fn status_text(status: i64) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "",
    }
}

/// Launcher handing out one prepared surface
pub struct FakeLauncher {
    surface: Arc<FakeSurface>,
    fail: bool,
    sessions: Mutex<Vec<CancellationToken>>,
}

impl FakeLauncher {
    pub fn new(surface: Arc<FakeSurface>) -> Self {
        Self {
            surface,
            fail: false,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(surface: Arc<FakeSurface>) -> Self {
        Self {
            fail: true,
            ..Self::new(surface)
        }
    }

    /// Session tokens handed to `launch`, in call order
    pub fn sessions(&self) -> Vec<CancellationToken> {
        self.sessions.lock().clone()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(
        &self,
        session: CancellationToken,
    ) -> Result<Arc<dyn ControlSurface>, BrowserError> {
        if self.fail {
            return Err(BrowserError::new("launch browser", "executable not found"));
        }
        self.sessions.lock().push(session);
        Ok(self.surface.clone())
    }
}
