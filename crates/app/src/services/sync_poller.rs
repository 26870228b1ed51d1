//! Hardware synchronisation — wait until an instrument reports not-busy.

use std::time::Duration;

use rexlab_domain::error::HardwareTimeout;
use tokio::time::Instant;

use crate::ports::BusyProbe;

/// How often to poll and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Same interval, different timeout.
    #[must_use]
    pub const fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            interval: self.interval,
            timeout,
        }
    }
}

impl Default for PollPolicy {
    /// 50 ms interval, 30 s timeout.
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_secs(30))
    }
}

/// Poll `probe` until it reports not-busy.
///
/// A failing busy query counts as busy. The last sleep is clipped to the
/// remaining budget, so the timeout fires at the boundary and never later.
/// Returns the time spent waiting.
///
/// # Errors
///
/// Returns [`HardwareTimeout`] when the probe is still busy once `policy.timeout`
/// has elapsed.
pub async fn wait_until_ready<P>(probe: &mut P, policy: PollPolicy) -> Result<Duration, HardwareTimeout>
where
    P: BusyProbe + ?Sized,
{
    let started = Instant::now();
    loop {
        let busy = match probe.is_busy().await {
            Ok(busy) => busy,
            Err(err) => {
                tracing::debug!(error = %err, "busy query failed, treating instrument as busy");
                true
            }
        };
        let waited = started.elapsed();
        if !busy {
            return Ok(waited);
        }
        if waited >= policy.timeout {
            tracing::warn!(?waited, timeout = ?policy.timeout, "instrument still busy at timeout");
            return Err(HardwareTimeout {
                waited,
                timeout: policy.timeout,
            });
        }
        let remaining = policy.timeout - waited;
        tokio::time::sleep(policy.interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use rexlab_domain::error::HardwareFault;

    use super::*;

    /// Busy until `ready_after` has elapsed since creation.
    struct TimedProbe {
        created: Instant,
        ready_after: Duration,
        polls: usize,
    }

    impl TimedProbe {
        fn new(ready_after: Duration) -> Self {
            Self {
                created: Instant::now(),
                ready_after,
                polls: 0,
            }
        }
    }

    impl BusyProbe for TimedProbe {
        fn is_busy(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            self.polls += 1;
            let busy = self.created.elapsed() < self.ready_after;
            async move { Ok(busy) }
        }
    }

    /// Fails the first `failures` queries, then reports idle.
    struct FlakyProbe {
        failures: usize,
    }

    impl BusyProbe for FlakyProbe {
        fn is_busy(&mut self) -> impl Future<Output = Result<bool, HardwareFault>> + Send {
            let result = if self.failures > 0 {
                self.failures -= 1;
                Err(HardwareFault::Disconnected)
            } else {
                Ok(false)
            };
            async move { result }
        }
    }

    fn policy(interval_ms: u64, timeout_ms: u64) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_immediately_when_not_busy() {
        let mut probe = TimedProbe::new(Duration::ZERO);
        let waited = wait_until_ready(&mut probe, policy(50, 1_000)).await.unwrap();
        assert_eq!(waited, Duration::ZERO);
        assert_eq!(probe.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_within_one_interval_after_becoming_idle() {
        let mut probe = TimedProbe::new(Duration::from_millis(120));
        let waited = wait_until_ready(&mut probe, policy(50, 1_000)).await.unwrap();
        assert!(waited >= Duration::from_millis(120));
        assert!(waited <= Duration::from_millis(170));
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_at_the_boundary_and_never_later() {
        let mut probe = TimedProbe::new(Duration::from_secs(10));
        let err = wait_until_ready(&mut probe, policy(300, 1_000))
            .await
            .unwrap_err();
        assert_eq!(err.timeout, Duration::from_millis(1_000));
        assert_eq!(err.waited, Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn should_treat_query_errors_as_busy() {
        let mut probe = FlakyProbe { failures: 2 };
        let waited = wait_until_ready(&mut probe, policy(50, 1_000)).await.unwrap();
        assert_eq!(waited, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_when_queries_keep_failing() {
        let mut probe = FlakyProbe { failures: usize::MAX };
        let err = wait_until_ready(&mut probe, policy(50, 200)).await.unwrap_err();
        assert_eq!(err.waited, Duration::from_millis(200));
    }
}
