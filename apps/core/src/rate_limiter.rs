use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The outcome of a rate-limit check, carrying what the caller needs for
/// advisory headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request must be refused.
    pub limited: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// A simple rate limiter using a fixed-window counter.
///
/// It tracks a request count per unique ID (e.g., session ID or IP address)
/// within the current window to decide whether a new request is allowed.
pub struct RateLimiter {
    /// Per-client window state.
    windows: HashMap<String, WindowEntry>,
    /// The maximum number of requests allowed within the `window`.
    limit: u32,
    /// The duration of the window.
    window: Duration,
}

impl RateLimiter {
    /// Creates a new `RateLimiter`.
    ///
    /// # Arguments
    ///
    /// * `limit` - The number of requests allowed per `window`.
    /// * `window` - The time duration of the window.
    pub fn new(limit: u32, window: Duration) -> Self {
        RateLimiter {
            windows: HashMap::new(),
            limit,
            window,
        }
    }

    /// The configured per-window limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Checks whether a request from `id` is allowed, recording it if so.
    pub fn check(&mut self, id: &str) -> RateLimitDecision {
        let now = Instant::now();
        let entry = self
            .windows
            .entry(id.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                window_start: now,
            });

        // Window elapsed: start a fresh one.
        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        let reset_after = self.window - now.duration_since(entry.window_start);

        if entry.count >= self.limit {
            return RateLimitDecision {
                limited: true,
                remaining: 0,
                reset_after,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            limited: false,
            remaining: self.limit - entry.count,
            reset_after,
        }
    }
}
