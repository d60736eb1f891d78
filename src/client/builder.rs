use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::binding::ClientBinding;
use super::presets;
use super::registry::ClientRegistry;
use crate::policy::{ConnectivitySignal, Policy, PolicyChain};
use crate::transport::{HttpResponse, HttpTransport, TransientStatuses, TransportConfig};
use crate::{Error, ErrorContext, Result};

/// Builder for one named client binding.
///
/// Without an explicit policy the binding gets the standard chain:
/// forever-retry on transient faults (constant delay, 1s unless
/// `RESILIENT_HTTP_RETRY_DELAY_MS` says otherwise) wrapped around a success
/// observer that releases the binding's connectivity signal.
pub struct ClientBindingBuilder {
    name: String,
    transport: TransportConfig,
    retry_delay: Option<Duration>,
    connectivity: Option<ConnectivitySignal>,
    policy: Option<Arc<dyn Policy<HttpResponse>>>,
}

impl ClientBindingBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportConfig::new(String::new()),
            retry_delay: None,
            connectivity: None,
            policy: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.transport.base_url = url.into();
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport
            .default_headers
            .insert(name.into(), value.into());
        self
    }

    pub fn default_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.transport.default_headers.extend(headers);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = timeout;
        self
    }

    pub fn transient_statuses(mut self, statuses: TransientStatuses) -> Self {
        self.transport.transient_statuses = statuses;
        self
    }

    /// Delay of the standard chain's forever-retry policy.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Share a connectivity signal with the standard chain.
    pub fn connectivity(mut self, signal: ConnectivitySignal) -> Self {
        self.connectivity = Some(signal);
        self
    }

    /// Replace the standard chain with any policy.
    pub fn policy<P: Policy<HttpResponse> + 'static>(mut self, policy: P) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn chain(mut self, chain: PolicyChain<HttpResponse>) -> Self {
        self.policy = Some(chain.as_policy());
        self
    }

    pub fn build(self) -> Result<ClientBinding> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "client name must not be empty",
                ErrorContext::new()
                    .with_field_path("name")
                    .with_source("client_builder"),
            ));
        }
        if self.transport.base_url.is_empty() {
            return Err(Error::configuration_with_context(
                format!("client '{}' has no base url", self.name),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("client_builder"),
            ));
        }

        let transport = HttpTransport::new(&self.transport)?;

        let (policy, connectivity) = match self.policy {
            Some(policy) => (policy, self.connectivity),
            None => {
                let delay = self.retry_delay.unwrap_or_else(default_retry_delay);
                let signal = self.connectivity.unwrap_or_default();
                let chain = presets::standard_chain(delay, signal.clone())?;
                (chain.as_policy(), Some(signal))
            }
        };

        Ok(ClientBinding::new(self.name, transport, policy, connectivity))
    }
}

fn default_retry_delay() -> Duration {
    std::env::var("RESILIENT_HTTP_RETRY_DELAY_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(presets::DEFAULT_RETRY_DELAY)
}

/// Collects bindings; names must be unique.
#[derive(Default)]
pub struct ClientRegistryBuilder {
    bindings: Vec<ClientBinding>,
}

impl ClientRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, binding: ClientBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn build(self) -> Result<ClientRegistry> {
        let mut map = HashMap::with_capacity(self.bindings.len());
        for binding in self.bindings {
            let name = binding.name.clone();
            if map.insert(name.clone(), Arc::new(binding)).is_some() {
                return Err(Error::configuration_with_context(
                    format!("client '{}' registered twice", name),
                    ErrorContext::new()
                        .with_field_path("clients")
                        .with_source("client_registry"),
                ));
            }
        }
        Ok(ClientRegistry::from_bindings(map))
    }
}
