//! Per-invocation attempt bookkeeping.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Mutable counters scoped to one top-level invocation.
///
/// Created fresh for every call and dropped when the call settles. Policies
/// share it by reference as execution threads down the chain; it is never
/// stored inside a policy.
#[derive(Debug)]
pub struct AttemptContext {
    attempts: AtomicU32,
    started: Instant,
    cancel: CancellationToken,
}

impl AttemptContext {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            started: Instant::now(),
            cancel,
        }
    }

    /// Record the start of one underlying attempt and return its 1-based number.
    pub fn begin_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Underlying attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The settled error for a call cancelled at this point.
    pub fn cancelled_error(&self) -> crate::Error {
        crate::Error::Cancelled {
            attempts: self.attempts(),
        }
    }
}

impl Default for AttemptContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What a hook learns about the attempt that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptInfo {
    /// 1-based attempt number as seen by the policy that fired.
    pub attempt: u32,
    /// Underlying attempts made so far in the whole invocation.
    pub total_attempts: u32,
    /// Time since the top-level invocation started.
    pub elapsed: Duration,
    /// Delay the policy will wait before its next attempt; `None` when it will not retry.
    pub next_delay: Option<Duration>,
}
