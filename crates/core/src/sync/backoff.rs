//! Delay calculation for timed retry passes.

use std::time::Duration;

use rand::Rng;
use relayq_domain::BackoffConfig;

/// Delay before re-running a pass for actions that have failed
/// `retry_count` times: exponential from the base delay, capped at the
/// maximum, plus 0-25% jitter (still capped).
pub fn retry_delay(config: &BackoffConfig, retry_count: u32) -> Duration {
    let base_ms = config.base_delay_ms.max(1);

    // Prevent overflow by capping the exponent
    let exp = retry_count.saturating_sub(1).min(20);
    let backoff = base_ms.saturating_mul(2_u64.saturating_pow(exp)).min(config.max_delay_ms);

    let jitter_bound = backoff / 4;
    let jitter = if jitter_bound > 0 { rand::thread_rng().gen_range(0..=jitter_bound) } else { 0 };

    Duration::from_millis(backoff.saturating_add(jitter).min(config.max_delay_ms))
}
