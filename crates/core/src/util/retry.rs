//! Retry timing for calls to remote inference services
//!
//! Two kinds of waits share one attempt budget: a "model loading" reply carries
//! an optional server-side estimate that is honoured up to a cap, while
//! transport faults (timeouts, resets) always wait a short fixed delay.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP status the inference router uses while a cold model is being loaded.
pub const LOADING_STATUS: u16 = 503;

/// Configuration for transcription retry behavior
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first call included
    pub max_attempts: u32,
    /// Wait used when a loading reply carries no estimate
    pub loading_default_wait: Duration,
    /// Upper bound for any single wait
    pub max_wait: Duration,
    /// Wait after a timeout or connection fault
    pub transport_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            loading_default_wait: Duration::from_secs(20),
            max_wait: Duration::from_secs(60),
            transport_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// The attempt count is raised to 1; the first call always happens.
    pub fn new(max_attempts: u32, max_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            max_wait,
            ..Default::default()
        }
    }

    /// Attempts actually made, never fewer than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    /// Wait before retrying after a loading reply.
    ///
    /// Negative, non-finite or absent hints fall back to the default wait.
    pub fn loading_wait(&self, estimated_secs: Option<f64>) -> Duration {
        let wait = match estimated_secs {
            Some(secs) if secs.is_finite() && secs >= 0.0 => {
                if secs >= self.max_wait.as_secs_f64() {
                    self.max_wait
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
            _ => self.loading_default_wait,
        };
        wait.min(self.max_wait)
    }

    pub fn transport_wait(&self) -> Duration {
        self.transport_delay.min(self.max_wait)
    }
}

pub fn is_loading_status(status: u16) -> bool {
    status == LOADING_STATUS
}
