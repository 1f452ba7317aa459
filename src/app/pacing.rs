use crate::config::PacingConfig;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Minimum spacing between loop iterations.
///
/// With failure backoff enabled, each consecutive failed analysis doubles the
/// delay up to `max_backoff`; the first success resets it.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    failure_backoff: bool,
    max_backoff: Duration,
    consecutive_failures: u32,
}

impl Pacer {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            interval: config.interval(),
            failure_backoff: config.failure_backoff,
            max_backoff: config.max_backoff(),
            consecutive_failures: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            debug!(
                "Analysis recovered after {} failures, pacing reset to {:?}",
                self.consecutive_failures, self.interval
            );
        }
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Delay to apply at the next `Pacing` state
    pub fn next_delay(&self) -> Duration {
        if !self.failure_backoff || self.consecutive_failures == 0 {
            return self.interval;
        }

        let base_ms = self.interval.as_millis() as u64;
        let factor = 1u64
            .checked_shl(self.consecutive_failures)
            .unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base_ms.saturating_mul(factor));

        if delay > self.max_backoff {
            self.max_backoff
        } else {
            delay
        }
    }

    /// Sleep for `next_delay` measured from now. Returns `true` when the wait
    /// ended early because `cancel` fired.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let delay = self.next_delay();
        let deadline = Instant::now() + delay;

        tokio::select! {
            _ = sleep_until(deadline) => false,
            _ = cancel.cancelled() => {
                debug!("Pacing interrupted by cancellation");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacing(interval_ms: u64, failure_backoff: bool, max_backoff_ms: u64) -> PacingConfig {
        PacingConfig {
            interval_ms,
            failure_backoff,
            max_backoff_ms,
        }
    }

    #[test]
    fn test_fixed_interval_ignores_failures() {
        let mut pacer = Pacer::new(&pacing(1000, false, 30_000));
        assert_eq!(pacer.next_delay(), Duration::from_secs(1));

        pacer.record_failure();
        pacer.record_failure();
        assert_eq!(pacer.consecutive_failures(), 2);
        assert_eq!(pacer.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut pacer = Pacer::new(&pacing(1000, true, 5000));

        pacer.record_failure();
        assert_eq!(pacer.next_delay(), Duration::from_secs(2));
        pacer.record_failure();
        assert_eq!(pacer.next_delay(), Duration::from_secs(4));
        pacer.record_failure();
        assert_eq!(pacer.next_delay(), Duration::from_secs(5));

        for _ in 0..100 {
            pacer.record_failure();
        }
        assert_eq!(pacer.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_success_resets_backoff() {
        let mut pacer = Pacer::new(&pacing(1000, true, 30_000));
        pacer.record_failure();
        pacer.record_failure();
        pacer.record_success();

        assert_eq!(pacer.consecutive_failures(), 0);
        assert_eq!(pacer.next_delay(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_respects_interval() {
        let pacer = Pacer::new(&pacing(1000, false, 30_000));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        assert!(!pacer.wait(&cancel).await);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ends_early_on_cancel() {
        let pacer = Pacer::new(&pacing(10_000, false, 30_000));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        assert!(pacer.wait(&cancel).await);
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
