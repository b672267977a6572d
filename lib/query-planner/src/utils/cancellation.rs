use std::{
    num::NonZeroU32,
    time::{Duration, Instant},
};

/// Cooperative cancellation for a planning call.
///
/// Wraps a `tokio_util` token (so an outer request can cancel it) with an optional deadline.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(duration: Duration) -> Self {
        Self {
            inner: tokio_util::sync::CancellationToken::new(),
            deadline: Instant::now().checked_add(duration),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    #[inline]
    pub fn bail_if_cancelled(&self) -> Result<(), CancellationError> {
        if let Some(deadline) = self.deadline {
            if deadline <= Instant::now() {
                self.cancel();
                return Err(CancellationError::TimedOut);
            }
        }

        if self.inner.is_cancelled() {
            return Err(CancellationError::Cancelled);
        }

        Ok(())
    }

    /// Returns a checker that only consults the token every `every` calls.
    /// `every` is rounded up to the next power of two.
    #[inline]
    pub fn throttle_check(&self, every: NonZeroU32) -> CancelTick<'_> {
        CancelTick::new(self, every)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancellationError {
    #[error("planning was cancelled")]
    Cancelled,
    #[error("planning timed out")]
    TimedOut,
}

#[derive(Debug)]
pub struct CancelTick<'a> {
    cancellation_token: &'a CancellationToken,
    mask: u32,
    ticks: u32,
}

impl<'a> CancelTick<'a> {
    #[inline]
    pub fn new(cancellation_token: &'a CancellationToken, every: NonZeroU32) -> Self {
        let every = every.get().checked_next_power_of_two().unwrap_or(1 << 31);

        Self {
            cancellation_token,
            mask: every - 1,
            ticks: 0,
        }
    }

    #[inline(always)]
    pub fn bail_if_cancelled(&mut self) -> Result<(), CancellationError> {
        // x & (n - 1) == x % n for a power of two n
        if self.ticks & self.mask == 0 {
            self.cancellation_token.bail_if_cancelled()?;
        }
        self.ticks = self.ticks.wrapping_add(1);

        Ok(())
    }
}
