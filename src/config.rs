use std::fmt;
use std::time::Duration;

/// Host used when no base URL override is given.
pub const DEFAULT_BASE_URL: &str = "dagger.jackdecker.org";

/// Delay between two status probes while waiting for an instance.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Bearer token for the Thunder API. Never printed, never logged.
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    /// Returns `None` for an absent or blank token so callers can reject it before any request.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// How long and how often to poll for readiness. With neither `max_attempts` nor `deadline`
/// set the wait is unbounded and only a cancellation ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            deadline: None,
        }
    }
}

/// Per-invocation settings, handed to every workflow explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThunderConfig {
    pub base_url: String,
    pub poll: PollConfig,
}

impl Default for ThunderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll: PollConfig::default(),
        }
    }
}

impl ThunderConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Root of the REST API. A bare host gets `https://`, an explicit scheme is kept as is.
    pub fn api_url(&self) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{base}/api")
        } else {
            format!("https://{base}/api")
        }
    }
}
