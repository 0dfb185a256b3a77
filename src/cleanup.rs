//! Scheduled cleanup of in-memory rate limiter state.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

use crate::rate_limit::RateLimitConfig;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Drop limiter entries for clients whose quota has fully replenished.
pub fn run_cleanup(config: &RateLimitConfig) {
    let before = config.login.len();
    config.login.retain_recent();
    config.login.shrink_to_fit();

    let removed = before.saturating_sub(config.login.len());
    if removed > 0 {
        debug!("Cleaned up {} login rate limit entries", removed);
    }
}

/// Spawn a background task that runs cleanup periodically.
///
/// The task holds only a weak reference and exits once the limiter is dropped.
/// Must be called from within a Tokio runtime.
pub fn spawn_cleanup_scheduler(config: &Arc<RateLimitConfig>) -> tokio::task::JoinHandle<()> {
    let config: Weak<RateLimitConfig> = Arc::downgrade(config);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            let Some(config) = config.upgrade() else {
                break;
            };
            run_cleanup(&config);
        }
    })
}
