//! Fixed-window rate limiting for backend adapters
//!
//! Limiters never reject: a caller that finds the window exhausted sleeps
//! until the window rolls over and then proceeds.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::backend::types::ServiceKind;

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    count: u32,
}

/// Fixed-window request counter
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl FixedWindowRateLimiter {
    /// Create a limiter allowing `limit` calls per `window`; a limit of 0 disables it
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Limiter allowing `limit` calls per minute
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Calls counted in the current window
    pub fn count_in_window(&self) -> u32 {
        let state = self.state.lock();
        if state.window_start.elapsed() >= self.window {
            0
        } else {
            state.count
        }
    }

    /// Try to take a slot without waiting.
    ///
    /// Returns `None` on success, otherwise the time left in the current window.
    pub fn try_acquire(&self) -> Option<Duration> {
        if self.limit == 0 {
            return None;
        }

        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.window_start);

        if elapsed >= self.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count >= self.limit {
            let elapsed = now.duration_since(state.window_start);
            return Some(self.window.saturating_sub(elapsed));
        }

        state.count += 1;
        None
    }

    /// Take a slot, sleeping through the rest of the window if it is exhausted.
    ///
    /// Returns the total time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();

        while let Some(wait) = self.try_acquire() {
            debug!(
                limit = self.limit,
                wait_ms = wait.as_millis() as u64,
                "Rate limit reached, waiting for window reset"
            );
            // Zero-length remainders still yield so the window can roll over.
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }

        started.elapsed()
    }
}

/// One limiter per service kind, kept for the lifetime of the process
#[derive(Debug, Default)]
pub struct RateLimiterPool {
    limiters: DashMap<ServiceKind, Arc<FixedWindowRateLimiter>>,
}

impl RateLimiterPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the limiter for `kind`, creating it on first use.
    ///
    /// Later calls return the existing limiter even if the limit differs, so a
    /// restarted backend keeps its window.
    pub fn get_or_create(&self, kind: ServiceKind, limit: u32, window: Duration) -> Arc<FixedWindowRateLimiter> {
        self.limiters
            .entry(kind)
            .or_insert_with(|| Arc::new(FixedWindowRateLimiter::new(limit, window)))
            .value()
            .clone()
    }

    pub fn get(&self, kind: ServiceKind) -> Option<Arc<FixedWindowRateLimiter>> {
        self.limiters.get(&kind).map(|l| l.value().clone())
    }
}
