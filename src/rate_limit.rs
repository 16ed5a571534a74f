// SPDX-License-Identifier: MIT
//! Sliding-window rate limiter for the suggestion service.
//!
//! Enforces two constraints jointly: at most `max_calls` requests in any
//! trailing 60-second window, and a minimum spacing of `60 / max_calls`
//! seconds between consecutive requests so a burst cannot drain the whole
//! window at once. One instance is shared by every pipeline invocation.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

struct LimiterState {
    calls: VecDeque<Instant>,
    last_call: Option<Instant>,
}

/// Paces outbound calls. `acquire()` suspends the caller until one more call
/// is permissible, then records it and returns.
pub struct RateLimiter {
    max_calls: u64,
    min_spacing: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter allowing `calls_per_minute` requests in any trailing
    /// 60-second window. Values below 1 are clamped to 1.
    pub fn new(calls_per_minute: u64) -> Self {
        let max_calls = calls_per_minute.max(1);
        Self {
            max_calls,
            min_spacing: WINDOW / max_calls as u32,
            state: Mutex::new(LimiterState {
                calls: VecDeque::new(),
                last_call: None,
            }),
        }
    }

    /// Wait until both the window cap and the minimum spacing permit one more
    /// call, then record it. Always eventually returns; there is no
    /// cancellation.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                Self::evict(&mut state.calls, now);

                let mut wait = Duration::ZERO;
                if let Some(last) = state.last_call {
                    let next_allowed = last + self.min_spacing;
                    if next_allowed > now {
                        wait = next_allowed - now;
                    }
                }
                if state.calls.len() as u64 >= self.max_calls {
                    if let Some(oldest) = state.calls.front() {
                        let slot_free = *oldest + WINDOW;
                        if slot_free > now {
                            wait = wait.max(slot_free - now);
                        }
                    }
                }

                if wait.is_zero() {
                    state.calls.push_back(now);
                    state.last_call = Some(now);
                    return;
                }
                wait
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached — waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Discard recorded calls older than the window boundary.
    fn evict(calls: &mut VecDeque<Instant>, now: Instant) {
        let cutoff = now.checked_sub(WINDOW);
        while calls
            .front()
            .is_some_and(|t| cutoff.is_some_and(|c| *t <= c))
        {
            calls.pop_front();
        }
    }
}

// ─── Retry-After parsing ─────────────────────────────────────────────────────

/// Parse a `Retry-After` header value into a `Duration`.
///
/// Accepts an integer number of seconds (`"30"`) or an HTTP-date string
/// (`"Wed, 21 Oct 2026 07:28:00 GMT"`). Returns `None` if the value cannot
/// be parsed.
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let trimmed = header_value.trim();

    // Integer seconds first (most common).
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    // HTTP-date via chrono. RFC 2822 / RFC 7231 date format.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(trimmed) {
        let now = chrono::Utc::now();
        let retry_at = dt.with_timezone(&chrono::Utc);
        if retry_at > now {
            let delta = retry_at.signed_duration_since(now);
            if let Ok(std_dur) = delta.to_std() {
                return Some(std_dur);
            }
        }
        // Already in the past — no delay needed.
        return Some(Duration::ZERO);
    }

    None
}
