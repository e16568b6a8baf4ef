//! Retry backoff policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shape of the delay curve between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "backoff_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// The same delay before every retry.
    Fixed,
    /// `base * 2^(attempts - 1)`.
    Exponential,
}

/// Retry delay configuration carried by every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffPolicy {
    /// Delay curve.
    pub kind: BackoffKind,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
}

impl BackoffPolicy {
    /// Constant delay between retries.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            base_delay_ms: delay.as_millis() as u64,
        }
    }

    /// Doubling delay between retries.
    pub fn exponential(base: Duration) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            base_delay_ms: base.as_millis() as u64,
        }
    }

    /// Base delay as a [`Duration`].
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Delay before the next attempt after `attempts` failed tries, capped at `max`.
    ///
    /// `attempts` counts the attempts already made, so the first retry uses
    /// `attempts == 1`.
    pub fn delay_for(&self, attempts: u32, max: Duration) -> Duration {
        let base = self.base_delay();
        let delay = match self.kind {
            BackoffKind::Fixed => base,
            BackoffKind::Exponential => {
                let exponent = attempts.saturating_sub(1);
                2u32.checked_pow(exponent)
                    .and_then(|factor| base.checked_mul(factor))
                    .unwrap_or(max)
            }
        };
        delay.min(max)
    }
}
