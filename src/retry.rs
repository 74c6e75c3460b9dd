//! Retry policies and backoff between attempts.
//!
//! A [`RetryPolicy`] decides *whether* a failed attempt is repeated; a
//! [`Backoff`] decides *when*. Only [`Error::Api`] answers are ever offered to
//! a policy: transport failures, decode failures and configuration errors are
//! terminal.
//!
//! The client imposes no retry cap of its own. A policy that always returns
//! `true` keeps retrying for as long as the server keeps failing, so bound it
//! with [`MaxAttempts`] or your own counter.

use crate::Error;
use rand::Rng;
use std::time::Duration;

/// Decides whether a failed attempt should be repeated.
///
/// `attempt` counts the retries already made for this call, starting at `0`
/// for the first failure.
///
/// Any `Fn(u32, &Error) -> bool` closure is a policy:
///
/// ```
/// use livechat_webapi::{Error, RetryPolicy};
///
/// // Retry expired credentials up to three times.
/// let policy = |attempt: u32, error: &Error| {
///     attempt < 3 && error.api_error().is_some_and(|e| e.is("authentication"))
/// };
/// # let _: &dyn RetryPolicy = &policy;
/// ```
pub trait RetryPolicy: Send + Sync {
    /// Returns `true` to retry after `error`.
    fn should_retry(&self, attempt: u32, error: &Error) -> bool;
}

impl<F> RetryPolicy for F
where
    F: Fn(u32, &Error) -> bool + Send + Sync,
{
    fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        self(attempt, error)
    }
}

/// Retry while fewer than `n` retries have been made.
#[derive(Debug, Clone, Copy)]
pub struct MaxAttempts(pub u32);

impl RetryPolicy for MaxAttempts {
    fn should_retry(&self, attempt: u32, _error: &Error) -> bool {
        attempt < self.0
    }
}

/// Retry only API errors whose category is in the list.
///
/// ```
/// use livechat_webapi::retry::RetryOnErrorType;
///
/// let policy = RetryOnErrorType::new(["authentication", "service_unavailable"]);
/// ```
#[derive(Debug, Clone)]
pub struct RetryOnErrorType {
    kinds: Vec<String>,
}

impl RetryOnErrorType {
    /// Creates a policy matching any of `kinds`, ignoring ASCII case.
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }
}

impl RetryPolicy for RetryOnErrorType {
    fn should_retry(&self, _attempt: u32, error: &Error) -> bool {
        match error.api_error() {
            Some(api) => self.kinds.iter().any(|k| api.is(k)),
            None => false,
        }
    }
}

/// Combine multiple policies with OR logic.
///
/// Retries if ANY of the policies return `true`.
pub struct AnyOf {
    policies: Vec<Box<dyn RetryPolicy>>,
}

impl AnyOf {
    /// Creates a new `AnyOf` from a list of policies.
    pub fn new(policies: Vec<Box<dyn RetryPolicy>>) -> Self {
        Self { policies }
    }
}

impl RetryPolicy for AnyOf {
    fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        self.policies
            .iter()
            .any(|p| p.should_retry(attempt, error))
    }
}

/// Combine multiple policies with AND logic.
///
/// Retries only if ALL of the policies return `true`.
///
/// # Examples
///
/// ```
/// use livechat_webapi::retry::{AllOf, MaxAttempts, RetryOnErrorType};
///
/// // Retry authentication failures, at most 3 times.
/// let policy = AllOf::new(vec![
///     Box::new(RetryOnErrorType::new(["authentication"])),
///     Box::new(MaxAttempts(3)),
/// ]);
/// ```
pub struct AllOf {
    policies: Vec<Box<dyn RetryPolicy>>,
}

impl AllOf {
    /// Creates a new `AllOf` from a list of policies.
    pub fn new(policies: Vec<Box<dyn RetryPolicy>>) -> Self {
        Self { policies }
    }
}

impl RetryPolicy for AllOf {
    fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        self.policies
            .iter()
            .all(|p| p.should_retry(attempt, error))
    }
}

/// Pause inserted before each retry.
///
/// # Examples
///
/// ```
/// use livechat_webapi::Backoff;
/// use std::time::Duration;
///
/// // Retry immediately (the default)
/// let immediate = Backoff::None;
///
/// // 100ms, 200ms, 400ms, ... capped at 5s
/// let exponential = Backoff::Exponential {
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(5),
///     jitter: true,
/// };
/// ```
#[derive(Debug, Clone, Default)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,

    /// Wait the same delay before every retry.
    Fixed {
        /// The delay between attempts.
        delay: Duration,
    },

    /// Wait `initial_delay * 2^attempt`, capped at `max_delay`.
    /// Jitter scales each delay to a random 50-100% of its value.
    Exponential {
        /// The delay before the first retry.
        initial_delay: Duration,
        /// The maximum delay between retries.
        max_delay: Duration,
        /// Whether to add random jitter to delays.
        jitter: bool,
    },
}

impl Backoff {
    /// Returns the pause before retry number `attempt` (0-indexed), or `None`
    /// for an immediate retry.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Backoff::None => None,
            Backoff::Fixed { delay } => Some(*delay),
            Backoff::Exponential {
                initial_delay,
                max_delay,
                jitter,
            } => {
                let multiplier = 2u32.saturating_pow(attempt);
                let delay = initial_delay.saturating_mul(multiplier).min(*max_delay);

                if *jitter {
                    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                    Some(delay.mul_f64(jitter_factor))
                } else {
                    Some(delay)
                }
            }
        }
    }
}
