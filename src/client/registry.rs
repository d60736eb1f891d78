//! Named client registry: the `invoke(client_name, request)` surface.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::binding::ClientBinding;
use super::builder::ClientRegistryBuilder;
use super::types::CallStats;
use crate::transport::{HttpRequest, HttpResponse};
use crate::{Error, Result};

/// Resolves client names to bindings and runs requests through their chains.
///
/// Cloning is cheap; bindings are shared.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    bindings: Arc<HashMap<String, Arc<ClientBinding>>>,
}

impl ClientRegistry {
    pub fn builder() -> ClientRegistryBuilder {
        ClientRegistryBuilder::new()
    }

    pub(crate) fn from_bindings(bindings: HashMap<String, Arc<ClientBinding>>) -> Self {
        Self {
            bindings: Arc::new(bindings),
        }
    }

    /// Look up a binding. Unknown names fail before any attempt is made.
    pub fn get(&self, name: &str) -> Result<Arc<ClientBinding>> {
        self.bindings
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownClient {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Send `request` through the named client's chain.
    ///
    /// Resolves only once the chain settles: a success, a non-retried fault,
    /// or a callback fault.
    pub async fn invoke(&self, client: &str, request: HttpRequest) -> Result<HttpResponse> {
        self.invoke_with_cancel(client, request, CancellationToken::new())
            .await
    }

    /// Like [`invoke`](Self::invoke), but settles as `Cancelled` once `cancel` fires.
    pub async fn invoke_with_cancel(
        &self,
        client: &str,
        request: HttpRequest,
        cancel: CancellationToken,
    ) -> Result<HttpResponse> {
        self.invoke_with_stats(client, request, cancel).await.0
    }

    /// Give up after `deadline`.
    ///
    /// Passing the deadline cancels the call the same way
    /// [`invoke_with_cancel`](Self::invoke_with_cancel) does: a pending delay
    /// settles as `Cancelled` at once, while an attempt already in flight runs
    /// to completion (bounded by the transport timeout) and the chain settles
    /// on its outcome, success included.
    pub async fn invoke_with_deadline(
        &self,
        client: &str,
        request: HttpRequest,
        deadline: Duration,
    ) -> Result<HttpResponse> {
        let cancel = CancellationToken::new();
        let call = self.invoke_with_stats(client, request, cancel.clone());
        tokio::pin!(call);

        tokio::select! {
            (outcome, _) = &mut call => outcome,
            _ = tokio::time::sleep(deadline) => {
                warn!(client, deadline_ms = deadline.as_millis() as u64, "invocation deadline reached");
                cancel.cancel();
                let (outcome, _) = call.await;
                outcome
            }
        }
    }

    /// Invoke and report [`CallStats`] alongside the outcome.
    pub async fn invoke_with_stats(
        &self,
        client: &str,
        request: HttpRequest,
        cancel: CancellationToken,
    ) -> (Result<HttpResponse>, CallStats) {
        let binding = match self.get(client) {
            Ok(binding) => binding,
            Err(e) => {
                warn!(client, "unknown client");
                let stats = CallStats {
                    client: client.to_string(),
                    ..CallStats::default()
                };
                return (Err(e), stats);
            }
        };
        binding.send(&request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_client_makes_no_attempt() {
        let registry = ClientRegistry::builder().build().unwrap();
        let (outcome, stats) = registry
            .invoke_with_stats("missing", HttpRequest::get(""), CancellationToken::new())
            .await;
        match outcome {
            Err(Error::UnknownClient { name }) => assert_eq!(name, "missing"),
            other => panic!("expected UnknownClient, got {:?}", other.map(|r| r.status)),
        }
        assert_eq!(stats.attempts, 0);
        assert_eq!(stats.client, "missing");
    }

    #[test]
    fn names_are_sorted() {
        let make = |name: &str| {
            ClientBinding::builder(name)
                .base_url("https://example.com")
                .build()
                .unwrap()
        };
        let registry = ClientRegistry::builder()
            .register(make("secondary"))
            .register(make("primary"))
            .build()
            .unwrap();
        assert_eq!(registry.names(), vec!["primary", "secondary"]);
        assert!(registry.contains("primary"));
        assert_eq!(registry.len(), 2);
    }
}
