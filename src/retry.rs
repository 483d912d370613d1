//! Rate-limit-aware retry for outbound calls.
//!
//! [`RetryingCaller::invoke`] runs an operation and, while it fails with
//! [`PromptError::RateLimited`], waits and tries again:
//!
//! 1. the provider's [`DelayHint`] is used when the failure carried one;
//! 2. otherwise the wait is `backoff_base * 2^(attempt - 1)` seconds.
//!
//! After `max_retries` rate-limited attempts the call fails with
//! [`PromptError::RateLimitExhausted`]. Every other error is returned as-is
//! on the attempt that produced it.

use std::future::Future;
use std::time::Duration;

use crate::{DelayHint, PromptError, Result};

/// Ordinal of an attempt within one [`RetryingCaller::invoke`], starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallAttempt(u32);

impl CallAttempt {
    pub const FIRST: Self = Self(1);

    pub fn ordinal(self) -> u32 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Attempt budget and exponential backoff base.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base: f64,
}

impl RetryPolicy {
    /// Creates a policy.
    ///
    /// `max_retries` counts total attempts and must be at least 1.
    /// `backoff_base` is in seconds and must be finite and positive.
    pub fn new(max_retries: u32, backoff_base: f64) -> Result<Self> {
        if max_retries == 0 {
            return Err(PromptError::Config(
                "max_retries must be at least 1".to_owned(),
            ));
        }
        if !backoff_base.is_finite() || backoff_base <= 0.0 {
            return Err(PromptError::Config(format!(
                "backoff_base must be a positive number of seconds, got {backoff_base}"
            )));
        }
        Ok(Self {
            max_retries,
            backoff_base,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff_base(&self) -> f64 {
        self.backoff_base
    }

    /// Wait after the rate-limited `attempt`.
    ///
    /// A hint always wins; without one the backoff doubles per attempt.
    pub fn delay_for(&self, attempt: CallAttempt, hint: Option<&DelayHint>) -> Duration {
        if let Some(hint) = hint {
            return hint.delay;
        }
        let exp = attempt.ordinal().saturating_sub(1).min(16) as i32;
        let seconds = self.backoff_base * 2f64.powi(exp);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base: 1.0,
        }
    }
}

/// Blocks the current call path for a given duration.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Runs operations under a [`RetryPolicy`].
///
/// The caller holds no state between invocations; each `invoke` owns its
/// attempt counter.
#[derive(Clone, Debug, Default)]
pub struct RetryingCaller<S = TokioSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl RetryingCaller<TokioSleeper> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, TokioSleeper)
    }
}

impl<S: Sleeper> RetryingCaller<S> {
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    /// Replaces the policy, keeping the sleeper.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Runs `operation`, retrying rate-limited attempts.
    pub async fn invoke<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = CallAttempt::FIRST;
        loop {
            let (hint, message) = match operation().await {
                Err(PromptError::RateLimited { hint, message }) => (hint, message),
                other => return other,
            };

            if attempt.ordinal() >= self.policy.max_retries {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    attempts = attempt.ordinal(),
                    "rate limit persisted through every attempt"
                );
                return Err(PromptError::RateLimitExhausted {
                    attempts: attempt.ordinal(),
                    message,
                });
            }

            let delay = self.policy.delay_for(attempt, hint.as_ref());

            #[cfg(feature = "tracing")]
            tracing::warn!(
                attempt = attempt.ordinal(),
                hinted = hint.is_some(),
                "rate limit hit, waiting {:.1}s",
                delay.as_secs_f64()
            );

            self.sleeper.sleep(delay).await;
            attempt = attempt.next();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::{
        CallAttempt, DelayHint, HintSource, PromptError, RetryPolicy, RetryingCaller, Sleeper,
    };

    /// Records requested delays instead of sleeping.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) slept: Arc<Mutex<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        pub(crate) fn seconds(&self) -> Vec<f64> {
            self.slept
                .lock()
                .expect("sleep log mutex must not be poisoned")
                .iter()
                .map(Duration::as_secs_f64)
                .collect()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            self.slept
                .lock()
                .expect("sleep log mutex must not be poisoned")
                .push(duration);
            std::future::ready(())
        }
    }

    fn rate_limited(hint: Option<DelayHint>) -> PromptError {
        PromptError::RateLimited {
            hint,
            message: "quota exceeded".to_owned(),
        }
    }

    fn caller(max_retries: u32, backoff_base: f64) -> (RetryingCaller<RecordingSleeper>, RecordingSleeper) {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(max_retries, backoff_base).expect("policy must be valid");
        (RetryingCaller::with_sleeper(policy, sleeper.clone()), sleeper)
    }

    #[test]
    fn policy_rejects_invalid_values() {
        assert!(matches!(RetryPolicy::new(0, 1.0), Err(PromptError::Config(_))));
        assert!(matches!(RetryPolicy::new(3, 0.0), Err(PromptError::Config(_))));
        assert!(matches!(RetryPolicy::new(3, -1.0), Err(PromptError::Config(_))));
        assert!(matches!(RetryPolicy::new(3, f64::NAN), Err(PromptError::Config(_))));
        assert!(RetryPolicy::new(1, 0.5).is_ok());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, 2.0).expect("policy must be valid");
        let first = CallAttempt::FIRST;
        let second = first.next();
        let third = second.next();
        assert_eq!(policy.delay_for(first, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(second, None), Duration::from_secs(4));
        assert_eq!(policy.delay_for(third, None), Duration::from_secs(8));
    }

    #[test]
    fn hint_overrides_backoff() {
        let policy = RetryPolicy::new(5, 2.0).expect("policy must be valid");
        let hint = DelayHint {
            delay: Duration::from_millis(300),
            source: HintSource::RetryAfterHeader,
        };
        assert_eq!(
            policy.delay_for(CallAttempt::FIRST.next(), Some(&hint)),
            Duration::from_millis(300)
        );
    }

    #[tokio::test]
    async fn first_attempt_success_never_sleeps() {
        let (caller, sleeper) = caller(3, 2.0);
        let calls = &AtomicU32::new(0);

        let value = caller
            .invoke(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, PromptError>(42)
            })
            .await
            .expect("call must succeed");

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.seconds().is_empty());
    }

    #[tokio::test]
    async fn two_unhinted_failures_then_success() {
        let (caller, sleeper) = caller(3, 2.0);
        let calls = &AtomicU32::new(0);

        let value = caller
            .invoke(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited(None))
                } else {
                    Ok("done")
                }
            })
            .await
            .expect("third attempt must succeed");

        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.seconds(), vec![2.0, 4.0]);
    }

    #[tokio::test]
    async fn hinted_failures_exhaust_budget() {
        let (caller, sleeper) = caller(2, 1.0);
        let calls = &AtomicU32::new(0);

        let err = caller
            .invoke(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(rate_limited(DelayHint::from_retry_delay("5s")))
            })
            .await
            .expect_err("must exhaust retries");

        assert!(matches!(err, PromptError::RateLimitExhausted { attempts: 2, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.seconds(), vec![5.0]);
    }

    #[tokio::test]
    async fn more_failures_than_budget_stop_at_max_retries() {
        let (caller, sleeper) = caller(4, 0.5);
        let calls = &AtomicU32::new(0);

        let err = caller
            .invoke(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(rate_limited(None))
            })
            .await
            .expect_err("must exhaust retries");

        assert!(err.is_rate_limit_exhausted());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(sleeper.seconds(), vec![0.5, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn single_attempt_policy_never_sleeps() {
        let (caller, sleeper) = caller(1, 1.0);

        let err = caller
            .invoke(move || async move { Err::<(), _>(rate_limited(None)) })
            .await
            .expect_err("must exhaust retries");

        assert!(matches!(err, PromptError::RateLimitExhausted { attempts: 1, .. }));
        assert!(sleeper.seconds().is_empty());
    }

    #[tokio::test]
    async fn malformed_hint_falls_back_to_backoff() {
        let (caller, sleeper) = caller(3, 1.5);
        let calls = &AtomicU32::new(0);

        caller
            .invoke(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(rate_limited(DelayHint::from_retry_delay("eventually")))
                } else {
                    Ok(())
                }
            })
            .await
            .expect("second attempt must succeed");

        assert_eq!(sleeper.seconds(), vec![1.5]);
    }

    #[tokio::test]
    async fn mixed_hints_use_hint_or_attempt_backoff() {
        let (caller, sleeper) = caller(5, 1.0);
        let calls = &AtomicU32::new(0);

        caller
            .invoke(move || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(rate_limited(None)),
                    1 => Err(rate_limited(DelayHint::from_retry_after("-3"))),
                    2 => Err(rate_limited(None)),
                    _ => Ok(()),
                }
            })
            .await
            .expect("fourth attempt must succeed");

        assert_eq!(sleeper.seconds(), vec![1.0, 0.0, 4.0]);
    }

    #[tokio::test]
    async fn other_failures_propagate_without_sleeping() {
        let (caller, sleeper) = caller(5, 1.0);
        let calls = &AtomicU32::new(0);

        let err = caller
            .invoke(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err::<(), _>(rate_limited(None))
                } else {
                    Err(PromptError::Http {
                        status: 400,
                        body: "bad request".to_owned(),
                    })
                }
            })
            .await
            .expect_err("http error must propagate");

        assert!(matches!(err, PromptError::Http { status: 400, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.seconds(), vec![1.0]);
    }
}
