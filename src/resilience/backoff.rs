//! Exponential backoff with jitter between attempts.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Delay before the attempt following `failed_attempts` failures.
///
/// `base_delay_ms * 2^(failed_attempts - 1)`, capped at `max_delay_ms`, plus
/// up to 10% jitter. Zero when backoff is disabled (`base_delay_ms == 0`).
pub fn backoff_delay(policy: &RetryConfig, failed_attempts: u32) -> Duration {
    if failed_attempts == 0 || policy.base_delay_ms == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(failed_attempts - 1);
    let capped = policy.base_delay_ms.saturating_mul(factor).min(policy.max_delay_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}
