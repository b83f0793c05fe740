//! Global, mutex-protected request pacing: a minimum inter-request interval
//! plus reaction to server-reported rate-limit headers.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use rand::Rng;
use regex::Regex;
use tokio::sync::Mutex;

/// Configuration snapshot for the rate limiter.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    pub enabled: bool,
    pub min_interval_seconds: f64,
    pub min_remaining_tokens: i64,
}

#[allow(clippy::expect_used)]
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(\d+(?:\.\d+)?)h)?(?:(\d+(?:\.\d+)?)m)?(?:(\d+(?:\.\d+)?)s)?$")
        .expect("static pattern")
});

/// Parses durations of the form `2m59.56s`, `7.66s`, or a bare decimal
/// interpreted as seconds. Returns `None` for an unparsable or all-empty
/// value (and for a result of zero or less).
pub fn parse_duration_seconds(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(caps) = DURATION_RE.captures(value) {
        let hours: f64 = caps.get(1).map_or(0.0, |m| m.as_str().parse().unwrap_or(0.0));
        let minutes: f64 = caps.get(2).map_or(0.0, |m| m.as_str().parse().unwrap_or(0.0));
        let seconds: f64 = caps.get(3).map_or(0.0, |m| m.as_str().parse().unwrap_or(0.0));
        let total = hours * 3600.0 + minutes * 60.0 + seconds;
        if total > 0.0 {
            return Some(total);
        }
    }

    value.parse::<f64>().ok().filter(|v| *v > 0.0)
}

/// Case-insensitive header lookup.
pub fn header_get<'a>(headers: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    let key = key.to_lowercase();
    headers.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v.as_str())
}

#[derive(Debug, Default)]
struct LimiterState {
    next_allowed: Option<Instant>,
    blocked_until: Option<Instant>,
}

/// Shared rate limiter. Cloned handles (via `Arc`) share the same state.
#[derive(Debug)]
pub struct RateLimiter {
    cfg: ThrottleConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(cfg: ThrottleConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Blocks until a request slot is available, then reserves the next one.
    /// Only the mutex is held while reading/updating timestamps; the actual
    /// wait happens outside the critical section.
    pub async fn acquire(&self) {
        if !self.cfg.enabled {
            return;
        }

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let target = match (state.next_allowed, state.blocked_until) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (Some(a), None) => Some(a),
                    (None, Some(b)) => Some(b),
                    (None, None) => None,
                };

                match target {
                    Some(t) if t > now => Some(t - now),
                    _ => {
                        state.next_allowed =
                            Some(now + Duration::from_secs_f64(self.cfg.min_interval_seconds.max(0.0)));
                        None
                    }
                }
            };

            match wait {
                Some(duration) => tokio::time::sleep(duration).await,
                None => return,
            }
        }
    }

    /// Reacts to a successful response's headers: if remaining tokens are at
    /// or below the configured threshold, pushes `blocked_until` out to the
    /// reported reset window plus jitter.
    pub async fn observe_success(&self, headers: &HashMap<String, String>) {
        if !self.cfg.enabled {
            return;
        }

        let remaining = header_get(headers, "x-ratelimit-remaining-tokens")
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v as i64);
        let reset_s = parse_duration_seconds(header_get(headers, "x-ratelimit-reset-tokens"));

        if let (Some(remaining), Some(reset_s)) = (remaining, reset_s) {
            if remaining <= self.cfg.min_remaining_tokens {
                let jitter = rand::thread_rng().gen_range(0.2..0.5);
                self.push_blocked_until(Duration::from_secs_f64(reset_s + jitter)).await;
            }
        }
    }

    /// Reacts to a 429 response's headers: waits the max of `retry-after`
    /// and `x-ratelimit-reset-tokens`, defaulting to 3 seconds if neither
    /// parses, plus jitter.
    pub async fn observe_rate_limited(&self, headers: &HashMap<String, String>) {
        if !self.cfg.enabled {
            return;
        }

        let retry_after = parse_duration_seconds(header_get(headers, "retry-after"));
        let reset_s = parse_duration_seconds(header_get(headers, "x-ratelimit-reset-tokens"));

        let wait_s = retry_after
            .into_iter()
            .chain(reset_s)
            .fold(0.0_f64, f64::max);
        let wait_s = if wait_s > 0.0 { wait_s } else { 3.0 };

        let jitter = rand::thread_rng().gen_range(0.3..1.0);
        self.push_blocked_until(Duration::from_secs_f64(wait_s + jitter)).await;
    }

    async fn push_blocked_until(&self, wait: Duration) {
        let mut state = self.state.lock().await;
        let candidate = Instant::now() + wait;
        state.blocked_until = Some(state.blocked_until.map_or(candidate, |cur| cur.max(candidate)));
    }
}
