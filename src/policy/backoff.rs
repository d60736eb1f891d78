//! Inter-attempt delay functions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maps a 1-based retry number to the delay before that retry.
#[derive(Clone)]
pub enum Backoff {
    /// Same delay every time.
    Constant(Duration),
    /// `step * n`, capped.
    Linear { step: Duration, max: Duration },
    /// `base * 2^(n-1)`, capped.
    Exponential { base: Duration, max: Duration },
    /// Any caller-supplied function, e.g. a jittered one.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Backoff {
    pub fn constant(delay: Duration) -> Self {
        Backoff::Constant(delay)
    }

    pub fn linear(step: Duration, max: Duration) -> Self {
        Backoff::Linear { step, max }
    }

    pub fn exponential(base: Duration, max: Duration) -> Self {
        Backoff::Exponential { base, max }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Backoff::Custom(Arc::new(f))
    }

    /// Delay before retry number `attempt` (1-based; 0 is treated as 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let n = attempt.max(1);
        match self {
            Backoff::Constant(d) => *d,
            Backoff::Linear { step, max } => step.saturating_mul(n).min(*max),
            Backoff::Exponential { base, max } => {
                let factor = 1u32.checked_shl(n - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(*max)
            }
            Backoff::Custom(f) => f(n),
        }
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::Constant(d) => f.debug_tuple("Constant").field(d).finish(),
            Backoff::Linear { step, max } => f
                .debug_struct("Linear")
                .field("step", step)
                .field("max", max)
                .finish(),
            Backoff::Exponential { base, max } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("max", max)
                .finish(),
            Backoff::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Constant(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_ignores_attempt() {
        let b = Backoff::constant(Duration::from_secs(1));
        assert_eq!(b.delay(1), Duration::from_secs(1));
        assert_eq!(b.delay(1_000), Duration::from_secs(1));
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let b = Backoff::exponential(Duration::from_millis(100), Duration::from_millis(1_000));
        assert_eq!(b.delay(1), Duration::from_millis(100));
        assert_eq!(b.delay(2), Duration::from_millis(200));
        assert_eq!(b.delay(4), Duration::from_millis(800));
        assert_eq!(b.delay(5), Duration::from_millis(1_000));
        // shift overflow saturates instead of panicking
        assert_eq!(b.delay(64), Duration::from_millis(1_000));
    }

    #[test]
    fn linear_caps() {
        let b = Backoff::linear(Duration::from_millis(250), Duration::from_millis(600));
        assert_eq!(b.delay(0), Duration::from_millis(250));
        assert_eq!(b.delay(2), Duration::from_millis(500));
        assert_eq!(b.delay(3), Duration::from_millis(600));
    }

    #[test]
    fn custom_receives_one_based_attempt() {
        let b = Backoff::custom(|n| Duration::from_millis(u64::from(n) * 7));
        assert_eq!(b.delay(0), Duration::from_millis(7));
        assert_eq!(b.delay(3), Duration::from_millis(21));
    }
}
