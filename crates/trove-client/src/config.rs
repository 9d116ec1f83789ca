//! Client and check configuration.

use std::time::Duration;

/// Configuration for the HTTP client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Session cookie (`itchio=...`) for authenticated requests, if the
    /// user is logged in.
    pub session_cookie: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("trove/", env!("CARGO_PKG_VERSION")).to_string(),
            session_cookie: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Set the session cookie.
    #[must_use]
    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Configuration for the batched update checker.
#[derive(Clone, Debug)]
pub struct CheckConfig {
    /// Attempts per game before its installations get an error verdict.
    pub max_attempts: u8,
    /// Fixed delay before a failed game is retried. The retry queue is
    /// round-robin, so other games run between a game's attempts.
    pub retry_delay: Duration,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl CheckConfig {
    /// Set the attempt cap.
    #[must_use]
    pub const fn with_max_attempts(mut self, max: u8) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set the retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CheckConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert!(ClientConfig::default().session_cookie.is_none());
    }
}
