//! Reconnect policy for endpoints whose connection drops.

use std::{num::NonZeroU32, time::Duration};

/// Exponential back-off between reconnect attempts.
///
/// The first attempt waits `initial_delay`; each later attempt doubles the
/// wait, capped at `max_delay`.
///
/// # Default Values
/// - `initial_delay`: 10 milliseconds
/// - `max_delay`: 1 second
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Clamp both delays to at least one millisecond and ensure
    /// `initial_delay <= max_delay`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use streamframe::endpoint::BackoffConfig;
    ///
    /// let cfg = BackoffConfig {
    ///     initial_delay: Duration::from_secs(2),
    ///     max_delay: Duration::from_millis(0),
    /// }
    /// .normalized();
    /// assert_eq!(cfg.initial_delay, Duration::from_millis(1));
    /// assert_eq!(cfg.max_delay, Duration::from_secs(2));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.initial_delay = self.initial_delay.max(Duration::from_millis(1));
        self.max_delay = self.max_delay.max(Duration::from_millis(1));
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }
}

/// What an endpoint does after its connection drops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Stay disconnected.
    #[default]
    Disabled,
    /// Retry with back-off, giving up after `max_attempts` if set.
    Enabled {
        max_attempts: Option<NonZeroU32>,
        backoff: BackoffConfig,
    },
}

impl ReconnectPolicy {
    /// Retry forever with the default back-off.
    #[must_use]
    pub fn enabled() -> Self {
        Self::Enabled {
            max_attempts: None,
            backoff: BackoffConfig::default(),
        }
    }

    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Disabled => Self::Disabled,
            Self::Enabled {
                max_attempts,
                backoff,
            } => Self::Enabled {
                max_attempts,
                backoff: backoff.normalized(),
            },
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool { matches!(self, Self::Enabled { .. }) }

    /// Delays to wait before each reconnect attempt, in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::{num::NonZeroU32, time::Duration};
    ///
    /// use streamframe::endpoint::{BackoffConfig, ReconnectPolicy};
    ///
    /// let policy = ReconnectPolicy::Enabled {
    ///     max_attempts: NonZeroU32::new(4),
    ///     backoff: BackoffConfig {
    ///         initial_delay: Duration::from_millis(10),
    ///         max_delay: Duration::from_millis(25),
    ///     },
    /// };
    /// let delays: Vec<_> = policy.delays().map(|d| d.as_millis()).collect();
    /// assert_eq!(delays, vec![10, 20, 25, 25]);
    /// ```
    pub fn delays(&self) -> impl Iterator<Item = Duration> + Send + 'static {
        let (attempts, backoff) = match self {
            Self::Disabled => (Some(0), BackoffConfig::default()),
            Self::Enabled {
                max_attempts,
                backoff,
            } => (max_attempts.map(NonZeroU32::get), backoff.normalized()),
        };
        let schedule = std::iter::successors(Some(backoff.initial_delay), move |delay| {
            Some(delay.saturating_mul(2).min(backoff.max_delay))
        });
        let limit = attempts.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        schedule.take(limit)
    }
}
