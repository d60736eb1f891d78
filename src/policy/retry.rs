//! The retry / observe policy.
//!
//! One engine covers both roles the client needs: a forever-retry policy keyed
//! on transient faults, and a single-shot observer keyed on successful results
//! that fires a hook and never retries.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use super::backoff::Backoff;
use super::context::{AttemptContext, AttemptInfo};
use super::hooks::Hook;
use super::{Operation, Outcome, Policy};
use crate::Error;

/// What a policy reacts to. A trigger inspects exactly one branch of the
/// outcome; a result trigger can never match a fault and vice versa.
pub enum Trigger<T> {
    Fault(Arc<dyn Fn(&Error) -> bool + Send + Sync>),
    Result(Arc<dyn Fn(&T) -> bool + Send + Sync>),
}

impl<T> Trigger<T> {
    pub fn matches(&self, outcome: &Outcome<T>) -> bool {
        match (self, outcome) {
            // terminal errors settle the call regardless of the classifier
            (_, Err(e)) if e.is_terminal() => false,
            (Trigger::Fault(pred), Err(e)) => pred(e),
            (Trigger::Result(pred), Ok(v)) => pred(v),
            _ => false,
        }
    }
}

impl<T> Clone for Trigger<T> {
    fn clone(&self) -> Self {
        match self {
            Trigger::Fault(p) => Trigger::Fault(p.clone()),
            Trigger::Result(p) => Trigger::Result(p.clone()),
        }
    }
}

impl<T> fmt::Debug for Trigger<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Fault(_) => f.write_str("Fault(<fn>)"),
            Trigger::Result(_) => f.write_str("Result(<fn>)"),
        }
    }
}

/// How many times a policy re-invokes its operation after a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Fire the hook, never retry.
    Once,
    /// Retry at most `n` times, then hand back the last outcome.
    Bounded(u32),
    /// Retry until the trigger stops matching or the call is cancelled.
    Forever,
}

impl Repeat {
    /// Whether a retry may follow attempt number `attempt` (1-based).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        match self {
            Repeat::Once => false,
            Repeat::Bounded(n) => attempt <= *n,
            Repeat::Forever => true,
        }
    }
}

/// A trigger, an optional hook and a repeat behavior with its backoff.
///
/// Note: with [`Repeat::Forever`] and a fault trigger, `execute` does not
/// return while the fault persists. That is the point of the policy (block
/// until connectivity is back); callers with a deadline must cancel through
/// the [`AttemptContext`].
pub struct RetryPolicy<T: Send + Sync + 'static> {
    name: String,
    trigger: Trigger<T>,
    hook: Option<Arc<dyn Hook<T>>>,
    repeat: Repeat,
    backoff: Backoff,
}

impl<T: Send + Sync + 'static> RetryPolicy<T> {
    pub fn builder() -> RetryPolicyBuilder<T> {
        RetryPolicyBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    async fn fire_hook(&self, outcome: &Outcome<T>, info: AttemptInfo) -> crate::Result<()> {
        let Some(hook) = &self.hook else {
            return Ok(());
        };
        hook.on_trigger(outcome, info).await.map_err(|e| {
            error!(
                policy = self.name.as_str(),
                hook = hook.name(),
                attempt = info.attempt,
                error = %e,
                "policy hook failed, aborting invocation"
            );
            Error::CallbackFault {
                hook: hook.name().to_string(),
                attempt: info.attempt,
                message: e.to_string(),
            }
        })
    }
}

impl<T: Send + Sync + 'static> Clone for RetryPolicy<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            trigger: self.trigger.clone(),
            hook: self.hook.clone(),
            repeat: self.repeat,
            backoff: self.backoff.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for RetryPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("hook", &self.hook.as_ref().map(|_| "<hook>"))
            .field("repeat", &self.repeat)
            .field("backoff", &self.backoff)
            .finish()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Policy<T> for RetryPolicy<T> {
    async fn execute(&self, op: &dyn Operation<T>, ctx: &AttemptContext) -> Outcome<T> {
        let mut attempt: u32 = 1;
        loop {
            if ctx.is_cancelled() {
                return Err(ctx.cancelled_error());
            }

            let outcome = op.call(ctx).await;
            if !self.trigger.matches(&outcome) {
                return outcome;
            }

            let next_delay = self
                .repeat
                .allows_retry(attempt)
                .then(|| self.backoff.delay(attempt));
            let info = AttemptInfo {
                attempt,
                total_attempts: ctx.attempts(),
                elapsed: ctx.elapsed(),
                next_delay,
            };
            self.fire_hook(&outcome, info).await?;

            let Some(delay) = next_delay else {
                return outcome;
            };

            debug!(
                policy = self.name.as_str(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "waiting before retry"
            );
            // The only suspension point; nothing is held across it.
            tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => {
                    debug!(policy = self.name.as_str(), attempt, "cancelled while waiting");
                    return Err(ctx.cancelled_error());
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

/// Builder for [`RetryPolicy`].
///
/// Defaults: trigger on transient faults, no hook, three retries, constant 1s delay.
pub struct RetryPolicyBuilder<T: Send + Sync + 'static> {
    name: String,
    trigger: Trigger<T>,
    hook: Option<Arc<dyn Hook<T>>>,
    repeat: Repeat,
    backoff: Backoff,
}

impl<T: Send + Sync + 'static> RetryPolicyBuilder<T> {
    pub fn new() -> Self {
        Self {
            name: "retry".to_string(),
            trigger: Trigger::Fault(Arc::new(Error::is_transient)),
            hook: None,
            repeat: Repeat::Bounded(3),
            backoff: Backoff::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// React to faults for which `classifier` returns true.
    pub fn handle_fault<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.trigger = Trigger::Fault(Arc::new(classifier));
        self
    }

    /// React to successful values for which `predicate` returns true.
    pub fn handle_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.trigger = Trigger::Result(Arc::new(predicate));
        self
    }

    pub fn hook<H: Hook<T> + 'static>(mut self, hook: H) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn shared_hook(mut self, hook: Arc<dyn Hook<T>>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn once(mut self) -> Self {
        self.repeat = Repeat::Once;
        self
    }

    pub fn retry(mut self, max_retries: u32) -> Self {
        self.repeat = Repeat::Bounded(max_retries);
        self
    }

    pub fn forever(mut self) -> Self {
        self.repeat = Repeat::Forever;
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn build(self) -> RetryPolicy<T> {
        RetryPolicy {
            name: self.name,
            trigger: self.trigger,
            hook: self.hook,
            repeat: self.repeat,
            backoff: self.backoff,
        }
    }
}

impl<T: Send + Sync + 'static> Default for RetryPolicyBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
