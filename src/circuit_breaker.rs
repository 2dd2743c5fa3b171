use failsafe::{backoff, failure_policy, Config};
use std::time::Duration;

/// Consecutive failed deliveries that open a notification channel.
pub const NOTIFY_FAILURE_THRESHOLD: u32 = 5;

/// Creates the circuit breaker guarding one outbound notification channel.
///
/// - **Failure threshold**: 5 consecutive failed deliveries trip the breaker.
/// - **Backoff**: exponential, 10s up to 60s, before a delivery is tried again.
///
/// While open, notifications on that channel are skipped and reported as not
/// sent; the verification itself is unaffected.
pub fn create_notify_circuit_breaker() -> impl failsafe::CircuitBreaker + Send + Sync {
    let backoff_strategy = backoff::exponential(Duration::from_secs(10), Duration::from_secs(60));

    let failure_policy =
        failure_policy::consecutive_failures(NOTIFY_FAILURE_THRESHOLD, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
