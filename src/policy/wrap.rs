//! Policy composition.
//!
//! `Wrap { outer, inner }.execute(op)` is `outer.execute(|| inner.execute(op))`.
//! Each retry of `outer` therefore re-runs `inner` and the operation from the
//! top; nothing resumes half-way.

use async_trait::async_trait;
use std::sync::Arc;

use super::context::AttemptContext;
use super::{Operation, Outcome, Policy};
use crate::{Error, ErrorContext, Result};

/// Two policies composed outer-to-inner.
pub struct Wrap<T: Send + Sync + 'static> {
    outer: Arc<dyn Policy<T>>,
    inner: Arc<dyn Policy<T>>,
}

impl<T: Send + Sync + 'static> Wrap<T> {
    pub fn new(outer: Arc<dyn Policy<T>>, inner: Arc<dyn Policy<T>>) -> Self {
        Self { outer, inner }
    }
}

impl<T: Send + Sync + 'static> Clone for Wrap<T> {
    fn clone(&self) -> Self {
        Self {
            outer: self.outer.clone(),
            inner: self.inner.clone(),
        }
    }
}

/// Compose two policies; `outer` sees `inner` (plus the operation) as one operation.
pub fn compose<T, O, I>(outer: O, inner: I) -> Wrap<T>
where
    T: Send + Sync + 'static,
    O: Policy<T> + 'static,
    I: Policy<T> + 'static,
{
    Wrap::new(Arc::new(outer), Arc::new(inner))
}

/// The inner policy bound to the operation, presented to the outer policy as
/// a plain operation.
struct Nested<'a, T: Send + Sync + 'static> {
    policy: &'a dyn Policy<T>,
    op: &'a dyn Operation<T>,
}

#[async_trait]
impl<'a, T: Send + Sync + 'static> Operation<T> for Nested<'a, T> {
    async fn call(&self, ctx: &AttemptContext) -> Outcome<T> {
        self.policy.execute(self.op, ctx).await
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Policy<T> for Wrap<T> {
    async fn execute(&self, op: &dyn Operation<T>, ctx: &AttemptContext) -> Outcome<T> {
        let nested = Nested {
            policy: self.inner.as_ref(),
            op,
        };
        self.outer.execute(&nested, ctx).await
    }
}

/// An ordered, non-empty list of policies folded into nested [`Wrap`]s.
///
/// `policies[0]` is outermost. A chain that contains a [`Repeat::Forever`]
/// policy may never settle on its own.
///
/// [`Repeat::Forever`]: super::Repeat::Forever
pub struct PolicyChain<T: Send + Sync + 'static> {
    len: usize,
    root: Arc<dyn Policy<T>>,
}

impl<T: Send + Sync + 'static> PolicyChain<T> {
    pub fn new(policies: Vec<Arc<dyn Policy<T>>>) -> Result<Self> {
        let len = policies.len();
        let mut rev = policies.into_iter().rev();
        let Some(innermost) = rev.next() else {
            return Err(Error::configuration_with_context(
                "policy chain must contain at least one policy",
                ErrorContext::new().with_source("policy_chain"),
            ));
        };
        let root = rev.fold(innermost, |inner, outer| {
            Arc::new(Wrap::new(outer, inner)) as Arc<dyn Policy<T>>
        });
        Ok(Self { len, root })
    }

    pub fn builder() -> PolicyChainBuilder<T> {
        PolicyChainBuilder {
            policies: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The composed policy, for sharing outside the chain.
    pub fn as_policy(&self) -> Arc<dyn Policy<T>> {
        self.root.clone()
    }
}

impl<T: Send + Sync + 'static> Clone for PolicyChain<T> {
    fn clone(&self) -> Self {
        Self {
            len: self.len,
            root: self.root.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for PolicyChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyChain").field("len", &self.len).finish()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Policy<T> for PolicyChain<T> {
    async fn execute(&self, op: &dyn Operation<T>, ctx: &AttemptContext) -> Outcome<T> {
        self.root.execute(op, ctx).await
    }
}

/// Collects policies outermost first.
pub struct PolicyChainBuilder<T: Send + Sync + 'static> {
    policies: Vec<Arc<dyn Policy<T>>>,
}

impl<T: Send + Sync + 'static> PolicyChainBuilder<T> {
    /// Append a policy inside the ones added so far.
    pub fn then<P: Policy<T> + 'static>(mut self, policy: P) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    pub fn then_shared(mut self, policy: Arc<dyn Policy<T>>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn build(self) -> Result<PolicyChain<T>> {
        PolicyChain::new(self.policies)
    }
}
