//! Screen resolver
//!
//! One watcher task per screen polls the page on a fixed interval and acts
//! on its screen whenever it shows up. Watchers stop once the login has
//! succeeded or the attempt is cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::error::ScreenError;
use super::screens::{Screen, perform};
use crate::browser::ControlSurface;

/// Default delay between two checks of the same screen
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Shared outcome of one login attempt
///
/// The success flag only ever goes from false to true.
#[derive(Debug, Default)]
pub struct ResolutionState {
    succeeded: AtomicBool,
    stop: CancellationToken,
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded.load(Ordering::Acquire)
    }

    /// Raise the success flag and stop the watchers.
    ///
    /// Returns `true` only for the call that actually raised it.
    pub fn mark_succeeded(&self) -> bool {
        let raised = self
            .succeeded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if raised {
            self.stop.cancel();
        }
        raised
    }

    async fn stopped(&self) {
        self.stop.cancelled().await
    }
}

pub struct Resolver {
    screens: Vec<Arc<dyn Screen>>,
    poll_interval: Duration,
}

impl Resolver {
    pub fn new(screens: Vec<Arc<dyn Screen>>, poll_interval: Duration) -> Self {
        Self {
            screens,
            poll_interval,
        }
    }

    /// Race every screen on `surface` until `state` succeeds or `cancel` fires
    pub async fn resolve(
        &self,
        surface: Arc<dyn ControlSurface>,
        state: Arc<ResolutionState>,
        cancel: CancellationToken,
    ) {
        let mut watchers = JoinSet::new();

        for screen in &self.screens {
            let span = tracing::info_span!("screen", screen = %screen);
            watchers.spawn(
                watch(
                    screen.clone(),
                    surface.clone(),
                    state.clone(),
                    cancel.clone(),
                    self.poll_interval,
                )
                .instrument(span),
            );
        }

        while let Some(result) = watchers.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    tracing::error!("Screen watcher panicked: {}", e);
                }
            }
        }

        tracing::info!("Stopped all resolvers");
    }
}

async fn watch(
    screen: Arc<dyn Screen>,
    surface: Arc<dyn ControlSurface>,
    state: Arc<ResolutionState>,
    cancel: CancellationToken,
    poll_interval: Duration,
) {
    tracing::info!("Started resolver");

    let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !state.succeeded() {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = state.stopped() => break,
            _ = ticker.tick() => {}
        }

        check_once(screen.as_ref(), surface.as_ref(), &cancel, poll_interval).await;
    }

    tracing::info!("Stopped resolver");
}

/// Match and, if matched, act on the screen within one poll interval
async fn check_once(
    screen: &dyn Screen,
    surface: &dyn ControlSurface,
    cancel: &CancellationToken,
    poll_interval: Duration,
) {
    let deadline = Instant::now() + poll_interval;

    let matching = tokio::time::timeout_at(deadline, screen.matches(surface));
    let matched = tokio::select! {
        _ = cancel.cancelled() => false,
        matched = matching => matched.unwrap_or(false),
    };
    if !matched {
        return;
    }

    tracing::info!("Resolving screen");

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(ScreenError::Canceled),
        result = tokio::time::timeout_at(deadline, perform(screen, surface)) => {
            result.unwrap_or(Err(ScreenError::Timeout))
        }
    };

    match result {
        Ok(()) => tracing::info!("Screen passed"),
        Err(e) if e.is_benign() => tracing::info!("Screen failed: {}", e),
        Err(e) => tracing::error!("Failed to run screen: {}", e),
    }
}
