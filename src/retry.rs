//! Bounded retry with backoff for remote HTTP calls.
//!
//! Rate-limit responses (403/429), server errors and transport timeouts are
//! retried; everything else is returned to the caller on the first attempt.

use crate::domain::Config;
use reqwest::blocking::Response;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Maximum length for response bodies quoted in error messages.
const MAX_ERROR_BODY_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("{url} was not found")]
    NotFound { url: String },

    #[error("gave up on {url} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<RemoteError>,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RemoteError {
    /// Whether this failure belongs to the retryable class.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Status { status, .. } => StatusCode::from_u16(*status)
                .map(is_transient_status)
                .unwrap_or(false),
            Self::RetriesExhausted { .. } => true,
            Self::NotFound { .. } | Self::Decode { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// 403 and 429 are how GitHub signals rate limiting; 5xx is usually a blip.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2,
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: 2,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Exponential delay after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let factor = self.multiplier.saturating_pow(exp);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Server hint when present, otherwise exponential; always capped.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        hint.unwrap_or_else(|| self.backoff(attempt)).min(self.max_backoff)
    }
}

/// Read `Retry-After`, or the reset time when the quota is exhausted.
pub fn rate_limit_hint(headers: &HeaderMap, now_epoch_secs: u64) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    if let Some(secs) = header("retry-after").and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }

    if header("x-ratelimit-remaining") == Some("0") {
        let reset = header("x-ratelimit-reset").and_then(|v| v.parse::<u64>().ok())?;
        return Some(Duration::from_secs(reset.saturating_sub(now_epoch_secs).max(1)));
    }

    None
}

/// Send a request built by `send`, retrying transient failures per `policy`.
///
/// `send` is invoked once per attempt so every attempt gets a fresh request.
pub fn send_with_retry<F>(policy: &RetryPolicy, url: &str, mut send: F) -> Result<Response, RemoteError>
where
    F: FnMut() -> reqwest::Result<Response>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        let (failure, hint) = match send() {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                return Err(RemoteError::NotFound { url: url.to_string() });
            }
            Ok(response) => {
                let status = response.status();
                let hint = rate_limit_hint(response.headers(), now_epoch_secs());
                let body = truncate_body(&response.text().unwrap_or_default());
                let failure = RemoteError::Status { url: url.to_string(), status: status.as_u16(), body };
                if !is_transient_status(status) {
                    return Err(failure);
                }
                (failure, hint)
            }
            Err(source) => {
                let failure = RemoteError::Transport { url: url.to_string(), source };
                if !failure.is_transient() {
                    return Err(failure);
                }
                (failure, None)
            }
        };

        if attempt >= policy.max_attempts {
            return Err(RemoteError::RetriesExhausted {
                url: url.to_string(),
                attempts: attempt,
                last: Box::new(failure),
            });
        }

        let delay = policy.delay_for(attempt, hint);
        tracing::warn!(
            "{} (attempt {}/{}); retrying in {:.1}s",
            failure,
            attempt,
            policy.max_attempts,
            delay.as_secs_f64()
        );
        std::thread::sleep(delay);
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_LEN {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{head}...")
    }
}
