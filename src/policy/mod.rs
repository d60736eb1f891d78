//! 策略模块：重试策略、成功观察策略及其组合执行模型。
//!
//! # Policy Execution Model
//!
//! A [`Policy`] wraps an [`Operation`] and decides, from each attempt's
//! [`Outcome`], whether to fire a hook and whether to try again. Policies
//! compose with [`compose`]: the outer policy sees the inner policy (and
//! everything under it) as its operation, so every outer retry re-runs the whole
//! inner stack from scratch.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RetryPolicy`] | Trigger + hook + repeat behavior (single-shot, bounded, forever) |
//! | [`Backoff`] | Retry number to delay |
//! | [`Wrap`] / [`PolicyChain`] | Ordered composition, outer to inner |
//! | [`Executor`] | Runs one invocation through a policy with a fresh context |
//! | [`AttemptContext`] | Per-call attempt counter, clock and cancellation |
//! | [`Hook`] | Side effect run when a trigger matches |
//!
//! ```rust
//! use resilient_http::policy::{compose, operation_fn, AttemptContext, Policy, RetryPolicy, Backoff};
//! use std::time::Duration;
//!
//! # async fn demo() -> resilient_http::Result<()> {
//! let retry = RetryPolicy::<u32>::builder()
//!     .handle_fault(|e| e.is_transient())
//!     .forever()
//!     .backoff(Backoff::constant(Duration::from_millis(10)))
//!     .build();
//! let observe = RetryPolicy::<u32>::builder()
//!     .handle_result(|v| *v == 200)
//!     .once()
//!     .build();
//! let chain = compose(retry, observe);
//!
//! let op = operation_fn(|| async { Ok(200u32) });
//! let status = chain.execute(&op, &AttemptContext::new()).await?;
//! assert_eq!(status, 200);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

pub mod backoff;
pub mod context;
pub mod executor;
pub mod hooks;
pub mod retry;
pub mod wrap;

pub use backoff::Backoff;
pub use context::{AttemptContext, AttemptInfo};
pub use executor::Executor;
pub use hooks::{
    CompositeHook, ConnectivitySignal, FnHook, HoldConnectivityHook, Hook, LogRetryHook,
    ReleaseConnectivityHook,
};
pub use retry::{Repeat, RetryPolicy, RetryPolicyBuilder, Trigger};
pub use wrap::{compose, PolicyChain, PolicyChainBuilder, Wrap};

/// The settled result of one attempt.
pub type Outcome<T> = crate::Result<T>;

/// The unit of work a policy guards. Called once per attempt.
#[async_trait]
pub trait Operation<T: Send + Sync + 'static>: Send + Sync {
    async fn call(&self, ctx: &AttemptContext) -> Outcome<T>;
}

/// A rule that runs an operation and reacts to its outcome.
///
/// Implementations are immutable templates: all per-call state lives in the
/// [`AttemptContext`], so one instance is safely shared across concurrent calls.
#[async_trait]
pub trait Policy<T: Send + Sync + 'static>: Send + Sync {
    async fn execute(&self, op: &dyn Operation<T>, ctx: &AttemptContext) -> Outcome<T>;
}

#[async_trait]
impl<T: Send + Sync + 'static> Policy<T> for Arc<dyn Policy<T>> {
    async fn execute(&self, op: &dyn Operation<T>, ctx: &AttemptContext) -> Outcome<T> {
        self.as_ref().execute(op, ctx).await
    }
}

/// Adapts a zero-argument async closure into an [`Operation`].
pub struct FnOperation<F> {
    func: F,
}

pub fn operation_fn<T, F, Fut>(func: F) -> FnOperation<F>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<T>> + Send,
{
    FnOperation { func }
}

#[async_trait]
impl<T, F, Fut> Operation<T> for FnOperation<F>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<T>> + Send,
{
    async fn call(&self, _ctx: &AttemptContext) -> Outcome<T> {
        (self.func)().await
    }
}
