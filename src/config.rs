use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);

pub const ENV_MAX_ATTEMPTS: &str = "GROUPFUND_VERIFY_MAX_ATTEMPTS";
pub const ENV_DELAY_MS: &str = "GROUPFUND_VERIFY_DELAY_MS";

/// Attempt budget and fixed inter-attempt delay for a polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl PollingConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Reads overrides from the environment, keeping defaults for absent or invalid values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: lookup(ENV_MAX_ATTEMPTS)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_attempts),
            delay: lookup(ENV_DELAY_MS)
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.delay),
        }
    }
}
