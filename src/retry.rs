//! Exponential backoff with jitter, shared by the Forecast Service and
//! LLM Adapter retry policies (spec §4.5, §4.6).
//!
//! Generalizes the teacher's `resilience::backoff::Backoff` (plain
//! doubling counter) with a jitter fraction, since both retry policies
//! in the spec call for "base 500 ms, factor 2, max 3 attempts, jitter
//! 20%"-style backoff.

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_millis: u64,
    pub factor: f64,
    pub max_attempts: u32,
    pub jitter_fraction: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_millis: 500,
            factor: 2.0,
            max_attempts: 3,
            jitter_fraction: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given attempt (0-indexed), with up to
    /// `jitter_fraction` of the nominal delay added or subtracted.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let nominal = self.base_millis as f64 * self.factor.powi(attempt as i32);
        let jitter_span = nominal * self.jitter_fraction;
        let jitter = rand::rng().random_range(-jitter_span..=jitter_span);
        let millis = (nominal + jitter).max(0.0) as u64;
        std::time::Duration::from_millis(millis)
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping between
/// attempts per [`BackoffPolicy::delay_for_attempt`]. `should_retry`
/// decides whether a given error is transient; permanent errors return
/// immediately without consuming remaining attempts.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: BackoffPolicy,
    mut op: F,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < policy.max_attempts && should_retry(&err) => {
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
