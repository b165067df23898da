use std::time::Duration;

use tracing::warn;

pub const DEBOUNCE_ENV: &str = "REGFORM_DEBOUNCE_MS";
pub const TOTAL_SETTLE_ENV: &str = "REGFORM_TOTAL_SETTLE_MS";
pub const NOTIFICATION_TTL_ENV: &str = "REGFORM_NOTIFICATION_TTL_MS";
pub const REQUEST_TIMEOUT_ENV: &str = "REGFORM_REQUEST_TIMEOUT_MS";

/// Timing knobs for [`crate::controller::RegistrationController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Quiet period after the last grade change before the group is resolved.
    pub debounce: Duration,
    /// Delay between an event toggle and the total recalculation.
    pub total_settle: Duration,
    pub notification_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            total_settle: Duration::from_millis(150),
            notification_ttl: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| -> Option<Duration> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(_) => {
                    warn!(key, value = %raw, "ignoring non-numeric duration override");
                    None
                }
            }
        };

        if let Some(v) = read(DEBOUNCE_ENV) {
            self.debounce = v;
        }
        if let Some(v) = read(TOTAL_SETTLE_ENV) {
            self.total_settle = v;
        }
        if let Some(v) = read(NOTIFICATION_TTL_ENV) {
            self.notification_ttl = v;
        }
        if let Some(v) = read(REQUEST_TIMEOUT_ENV) {
            // a zero bound would fail every request before it is sent
            self.request_timeout = v.max(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
