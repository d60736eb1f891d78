//! A named, preconfigured HTTP channel bound to a policy chain.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::CallStats;
use crate::policy::{AttemptContext, ConnectivitySignal, Executor, Operation, Outcome, Policy};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Name → (base endpoint, default headers, policy chain).
///
/// Immutable once built; shared across concurrent calls behind an `Arc`.
pub struct ClientBinding {
    pub(crate) name: String,
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) executor: Executor<HttpResponse>,
    pub(crate) connectivity: Option<ConnectivitySignal>,
}

impl ClientBinding {
    pub fn builder(name: impl Into<String>) -> super::builder::ClientBindingBuilder {
        super::builder::ClientBindingBuilder::new(name)
    }

    pub(crate) fn new(
        name: String,
        transport: HttpTransport,
        policy: Arc<dyn Policy<HttpResponse>>,
        connectivity: Option<ConnectivitySignal>,
    ) -> Self {
        Self {
            name,
            transport: Arc::new(transport),
            executor: Executor::new(policy),
            connectivity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &url::Url {
        self.transport.base_url()
    }

    /// The connectivity lock driven by the standard chain, if this binding uses it.
    pub fn connectivity(&self) -> Option<&ConnectivitySignal> {
        self.connectivity.as_ref()
    }

    /// Run `request` through the bound chain until it settles or `cancel` fires.
    ///
    /// With the standard chain this does not return while the upstream keeps
    /// failing transiently.
    pub async fn send(
        &self,
        request: &HttpRequest,
        cancel: CancellationToken,
    ) -> (Outcome<HttpResponse>, CallStats) {
        let ctx = AttemptContext::with_cancellation(cancel);
        let op = HttpOperation {
            client: &self.name,
            transport: &self.transport,
            request,
        };

        let outcome = self.executor.execute_in(&op, &ctx).await;

        let stats = CallStats {
            client: self.name.clone(),
            attempts: ctx.attempts(),
            duration_ms: ctx.elapsed().as_millis(),
            http_status: match &outcome {
                Ok(resp) => Some(resp.status),
                Err(e) => e.status_code(),
            },
            cancelled: matches!(outcome, Err(ref e) if e.is_cancelled()),
        };
        info!(
            client = self.name.as_str(),
            attempts = stats.attempts,
            duration_ms = stats.duration_ms as u64,
            http_status = stats.http_status,
            ok = outcome.is_ok(),
            "invocation settled"
        );
        (outcome, stats)
    }
}

impl std::fmt::Debug for ClientBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBinding")
            .field("name", &self.name)
            .field("base_url", &self.transport.base_url().as_str())
            .finish()
    }
}

/// One HTTP attempt against a binding; each attempt gets a fresh request id.
struct HttpOperation<'a> {
    client: &'a str,
    transport: &'a HttpTransport,
    request: &'a HttpRequest,
}

#[async_trait]
impl<'a> Operation<HttpResponse> for HttpOperation<'a> {
    async fn call(&self, ctx: &AttemptContext) -> Outcome<HttpResponse> {
        let request_id = Uuid::new_v4().to_string();
        debug!(
            client = self.client,
            attempt = ctx.attempts(),
            request_id = request_id.as_str(),
            method = %self.request.method,
            path = self.request.path.as_str(),
            "sending request"
        );
        self.transport.send(self.request, &request_id).await
    }
}
