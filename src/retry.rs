//! Exponential backoff around fallible calls.
//!
//! [`Retrier`] wraps any closure returning [`Result`]. Only
//! [`Error::Transient`] failures are retried; everything else is returned
//! immediately. Waiting goes through a [`Sleeper`] so callers (and tests) can
//! observe the schedule without real time passing.

use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Parameters governing retry delay growth and the attempt ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Growth factor applied per attempt (must be >= 1)
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl BackoffPolicy {
    /// Creates a validated policy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any parameter is out of range.
    pub fn new(
        initial_delay: Duration,
        max_attempts: u32,
        max_delay: Duration,
        multiplier: f64,
    ) -> Result<Self> {
        let policy = Self {
            initial_delay,
            max_attempts,
            max_delay,
            multiplier,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - A delay is zero
    /// - `max_attempts` is zero
    /// - `multiplier` is below 1 or not finite
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay.is_zero() {
            return Err(Error::config("backoff initial_delay must be greater than 0"));
        }

        if self.max_delay.is_zero() {
            return Err(Error::config("backoff max_delay must be greater than 0"));
        }

        if self.max_attempts == 0 {
            return Err(Error::config("backoff max_attempts must be at least 1"));
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::config(format!(
                "backoff multiplier must be a finite number >= 1 (got {})",
                self.multiplier
            )));
        }

        Ok(())
    }

    /// Returns the wait after the given failed attempt (1-based).
    ///
    /// `min(initial_delay * multiplier^(attempt - 1), max_delay)`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Returns every wait the policy can produce, in order.
    ///
    /// There is one wait between each pair of attempts, so the schedule has
    /// `max_attempts - 1` entries.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|attempt| self.delay_for_attempt(attempt))
    }
}

/// Capability used to wait between attempts.
pub trait Sleeper: Send + Sync {
    /// Blocks the current thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the delays requested so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// Per-call retry bookkeeping. Never outlives one [`Retrier::call`].
#[derive(Debug)]
struct RetryContext {
    attempt: u32,
    next_delay: Duration,
}

impl RetryContext {
    fn new(policy: &BackoffPolicy) -> Self {
        Self {
            attempt: 0,
            next_delay: policy.delay_for_attempt(1),
        }
    }

    fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Returns the delay to wait now and prepares the following one.
    fn advance(&mut self, policy: &BackoffPolicy) -> Duration {
        let delay = self.next_delay;
        self.next_delay = policy.delay_for_attempt(self.attempt + 1);
        delay
    }
}

/// Retries transient failures with exponential backoff.
#[derive(Clone)]
pub struct Retrier {
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Retrier {
    /// Creates a retrier that sleeps through `sleeper`.
    #[must_use]
    pub fn new(policy: BackoffPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Returns the policy in use.
    #[must_use]
    pub const fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `label` identifies the call in log output.
    ///
    /// # Errors
    ///
    /// - Any non-transient error from `op`, unchanged and without retrying
    /// - [`Error::RetryExhausted`] carrying the last transient error once
    ///   `max_attempts` calls have failed
    pub fn call<T, F>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut ctx = RetryContext::new(&self.policy);

        loop {
            let attempt = ctx.begin_attempt();

            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    if attempt >= self.policy.max_attempts {
                        warn!("{} failed after {} attempt(s): {}", label, attempt, e);
                        return Err(Error::retry_exhausted(attempt, e));
                    }

                    let delay = ctx.advance(&self.policy);
                    warn!(
                        "{} attempt {}/{} failed ({}), retrying in {:.2}s",
                        label,
                        attempt,
                        self.policy.max_attempts,
                        e,
                        delay.as_secs_f64()
                    );
                    self.sleeper.sleep(delay);
                }
                Err(e) => {
                    debug!("{} failed permanently on attempt {}: {}", label, attempt, e);
                    return Err(e);
                }
            }
        }
    }
}
