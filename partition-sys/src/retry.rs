//! Fixed-delay retry for transiently failing tool invocations
//!
//! The only automatic retry in the subsystem: sfdisk can report the device
//! as busy for a short while after a prior destructive operation, so its
//! write path runs under this helper. The clock is behind the [`Sleeper`]
//! trait so tests can record delays instead of waiting them out.

use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// How often and how patiently an operation is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_secs(3),
        }
    }
}

/// Waits between retry attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] that blocks the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Run `op` up to `policy.max_attempts` times with `policy.delay` between
/// attempts, returning the first success or the last error.
pub fn retry<T>(
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_attempts => {
                debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "attempt failed, retrying after delay"
                );
                sleeper.sleep(policy.delay);
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Mutex;

    use super::*;
    use crate::error::SysError;

    #[derive(Default)]
    struct FakeSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl FakeSleeper {
        fn delays(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    impl Sleeper for FakeSleeper {
        fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn default_policy_is_twenty_attempts_three_seconds_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 20);
        assert_eq!(policy.delay, Duration::from_secs(3));
    }

    #[test]
    fn first_success_sleeps_never() {
        let sleeper = FakeSleeper::default();
        let result = retry(RetryPolicy::default(), &sleeper, || Ok(7));
        assert_eq!(result.unwrap(), 7);
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn sleeps_between_failed_attempts_until_one_succeeds() {
        let sleeper = FakeSleeper::default();
        let attempts = Cell::new(0_u32);

        let result = retry(RetryPolicy::default(), &sleeper, || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 4 {
                Err(SysError::ParseFailed("not yet".to_string()))
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(attempts.get(), 4);
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(3); 3]);
    }

    #[test]
    fn returns_the_last_error_once_attempts_run_out() {
        let policy = RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_millis(10),
        };
        let sleeper = FakeSleeper::default();
        let attempts = Cell::new(0_u32);

        let result: Result<()> = retry(policy, &sleeper, || {
            attempts.set(attempts.get() + 1);
            Err(SysError::ParseFailed(format!("attempt {}", attempts.get())))
        });

        match result.unwrap_err() {
            SysError::ParseFailed(message) => assert_eq!(message, "attempt 5"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(attempts.get(), 5);
        assert_eq!(sleeper.delays().len(), 4);
    }
}
