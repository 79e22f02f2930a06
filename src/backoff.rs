// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry policies and the sleeper that drives them.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Something that can wait. Production code uses [`TokioSleeper`].
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A bounded backoff: `steps` attempts, with `initial_delay * factor^n`
/// between attempt `n` and `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub steps: u32,
    pub initial_delay: Duration,
    pub factor: f64,
}

impl BackoffPolicy {
    pub fn fixed(steps: u32, delay: Duration) -> Self {
        Self {
            steps,
            initial_delay: delay,
            factor: 1.0,
        }
    }

    pub fn exponential(steps: u32, initial_delay: Duration, factor: f64) -> Self {
        Self {
            steps,
            initial_delay,
            factor,
        }
    }

    /// Delays slept between attempts, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let initial = self.initial_delay.as_nanos() as f64;
        (0..self.steps.saturating_sub(1))
            .map(move |n| Duration::from_nanos((initial * self.factor.powi(n as i32)) as u64))
    }

    /// Upper bound on the total time spent sleeping
    pub fn budget(&self) -> Duration {
        self.delays().sum()
    }

    /// Run `attempt` until it yields a value or the steps run out.
    pub async fn retry<T, F, Fut>(&self, sleeper: &dyn Sleeper, mut attempt: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut delays = self.delays();
        let mut n = 0;
        loop {
            if let Some(value) = attempt(n).await {
                return Some(value);
            }
            n += 1;
            match delays.next() {
                Some(delay) => sleeper.sleep(delay).await,
                None => return None,
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSleeper;
    use super::*;

    #[test]
    fn test_fixed_delays() {
        let policy = BackoffPolicy::fixed(4, Duration::from_secs(11));
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays, vec![Duration::from_secs(11); 3]);
        assert_eq!(policy.budget(), Duration::from_secs(33));
    }

    #[test]
    fn test_exponential_delays() {
        let policy = BackoffPolicy::exponential(4, Duration::from_millis(10), 5.0);
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(50),
                Duration::from_millis(250),
            ]
        );
    }

    #[test]
    fn test_zero_steps_has_no_delays() {
        let policy = BackoffPolicy::fixed(0, Duration::from_secs(1));
        assert_eq!(policy.delays().count(), 0);
    }

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let sleeper = RecordingSleeper::default();
        let policy = BackoffPolicy::fixed(5, Duration::from_secs(1));

        let result = policy
            .retry(&sleeper, |n| async move { (n == 2).then_some(n) })
            .await;

        assert_eq!(result, Some(2));
        assert_eq!(sleeper.slept().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_exhausts_budget() {
        let sleeper = RecordingSleeper::default();
        let policy = BackoffPolicy::exponential(6, Duration::from_millis(10), 5.0);

        let result: Option<()> = policy.retry(&sleeper, |_| async { None }).await;

        assert!(result.is_none());
        assert_eq!(sleeper.slept().len(), 5);
        assert_eq!(sleeper.total(), policy.budget());
    }
}
