//! Runtime entry point: run an operation under a policy for one invocation.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::context::AttemptContext;
use super::{Operation, Outcome, Policy};

/// Runs operations through a shared policy.
///
/// Every invocation gets its own [`AttemptContext`]; the executor only counts
/// attempts and honours cancellation before each one. It never retries or
/// inspects outcomes itself.
pub struct Executor<T: Send + Sync + 'static> {
    policy: Arc<dyn Policy<T>>,
}

impl<T: Send + Sync + 'static> Executor<T> {
    pub fn new(policy: Arc<dyn Policy<T>>) -> Self {
        Self { policy }
    }

    pub async fn execute(&self, op: &dyn Operation<T>) -> Outcome<T> {
        self.execute_in(op, &AttemptContext::new()).await
    }

    pub async fn execute_with_cancel(
        &self,
        op: &dyn Operation<T>,
        cancel: CancellationToken,
    ) -> Outcome<T> {
        self.execute_in(op, &AttemptContext::with_cancellation(cancel))
            .await
    }

    /// Run with a caller-owned context, e.g. to read the attempt count afterwards.
    pub async fn execute_in(&self, op: &dyn Operation<T>, ctx: &AttemptContext) -> Outcome<T> {
        let counted = Counted { op };
        self.policy.execute(&counted, ctx).await
    }
}

impl<T: Send + Sync + 'static> Clone for Executor<T> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
        }
    }
}

/// The underlying operation as the innermost policy sees it.
struct Counted<'a, T: Send + Sync + 'static> {
    op: &'a dyn Operation<T>,
}

#[async_trait]
impl<'a, T: Send + Sync + 'static> Operation<T> for Counted<'a, T> {
    async fn call(&self, ctx: &AttemptContext) -> Outcome<T> {
        if ctx.is_cancelled() {
            return Err(ctx.cancelled_error());
        }
        let attempt = ctx.begin_attempt();
        trace!(attempt, "attempt started");
        self.op.call(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{operation_fn, RetryPolicy};

    #[tokio::test]
    async fn pre_cancelled_invocation_makes_no_attempt() {
        let executor = Executor::new(Arc::new(RetryPolicy::<u16>::builder().forever().build()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let ctx = AttemptContext::with_cancellation(cancel);
        let op = operation_fn(|| async { Ok(200u16) });
        let out = executor.execute_in(&op, &ctx).await;

        assert!(matches!(out, Err(crate::Error::Cancelled { attempts: 0 })));
        assert_eq!(ctx.attempts(), 0);
    }

    #[tokio::test]
    async fn attempts_are_counted_per_invocation() {
        let executor = Executor::new(Arc::new(RetryPolicy::<u16>::builder().once().build()));
        let op = operation_fn(|| async { Ok(200u16) });

        for _ in 0..3 {
            let ctx = AttemptContext::new();
            executor.execute_in(&op, &ctx).await.unwrap();
            assert_eq!(ctx.attempts(), 1);
        }
    }
}
