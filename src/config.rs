//! 配置加载 - YAML client definitions plus environment overrides.
//!
//! ```yaml
//! clients:
//!   - name: primary
//!     base_url: https://google.com
//!     headers:
//!       accept: application/json
//!     policy:
//!       retry: { mode: forever, delay_ms: 1000 }
//!       observe_success: true
//! ```
//!
//! Environment overrides apply after parsing:
//! `RESILIENT_HTTP_TIMEOUT_SECS` replaces every client's timeout and
//! `RESILIENT_HTTP_RETRY_DELAY_MS` every retry delay.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::client::{presets, ClientBinding, ClientRegistry};
use crate::policy::{Backoff, ConnectivitySignal, PolicyChain, Repeat};
use crate::transport::{HttpResponse, TransientStatuses};
use crate::{Error, ErrorContext, Result};

pub const CONFIG_PATH_ENV: &str = "RESILIENT_HTTP_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub transient_statuses: TransientStatuses,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub retry: RetryConfig,
    /// Wrap a single-shot success observer that releases the client's
    /// connectivity signal.
    pub observe_success: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            observe_success: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    Forever,
    Bounded,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Constant,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub mode: RetryMode,
    /// Only read in `bounded` mode.
    pub max_retries: u32,
    pub delay_ms: u64,
    pub backoff: BackoffKind,
    /// Cap for linear and exponential backoff.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            mode: RetryMode::Forever,
            max_retries: 3,
            delay_ms: presets::DEFAULT_RETRY_DELAY.as_millis() as u64,
            backoff: BackoffKind::Constant,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    fn to_backoff(&self) -> Backoff {
        let delay = Duration::from_millis(self.delay_ms);
        let max = Duration::from_millis(self.max_delay_ms);
        match self.backoff {
            BackoffKind::Constant => Backoff::constant(delay),
            BackoffKind::Linear => Backoff::linear(delay, max),
            BackoffKind::Exponential => Backoff::exponential(delay, max),
        }
    }
}

impl Config {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(content).map_err(|e| {
            let msg = e.to_string();
            let structural = msg.contains("missing field")
                || msg.contains("unknown field")
                || msg.contains("invalid type")
                || msg.contains("unknown variant");
            if structural {
                Error::configuration_with_context(
                    format!("invalid config structure: {}", msg),
                    ErrorContext::new().with_source("config"),
                )
            } else {
                Error::Yaml(e)
            }
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config"),
            )
        })?;
        debug!(path = %path.display(), "loaded client config");
        Self::from_yaml_str(&content)
    }

    /// Load from `RESILIENT_HTTP_CONFIG` when set.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_path(path).map(Some),
            _ => Ok(None),
        }
    }

    fn apply_env_overrides(&mut self) {
        let timeout = env_u64("RESILIENT_HTTP_TIMEOUT_SECS");
        let delay = env_u64("RESILIENT_HTTP_RETRY_DELAY_MS");
        for client in &mut self.clients {
            if let Some(secs) = timeout {
                client.timeout_secs = Some(secs);
            }
            if let Some(ms) = delay {
                client.policy.retry.delay_ms = ms;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for (i, client) in self.clients.iter().enumerate() {
            if client.name.trim().is_empty() {
                return Err(invalid(format!("clients[{}].name", i), "name must not be empty"));
            }
            if !seen.insert(client.name.as_str()) {
                return Err(invalid(
                    format!("clients[{}].name", i),
                    format!("duplicate client '{}'", client.name),
                ));
            }
            if url::Url::parse(&client.base_url).is_err() {
                return Err(invalid(
                    format!("clients[{}].base_url", i),
                    format!("invalid url '{}'", client.base_url),
                ));
            }
            if client.timeout_secs == Some(0) {
                return Err(invalid(
                    format!("clients[{}].timeout_secs", i),
                    "timeout must be positive",
                ));
            }
            let retry = &client.policy.retry;
            if retry.mode == RetryMode::Bounded && retry.max_retries == 0 {
                return Err(invalid(
                    format!("clients[{}].policy.retry.max_retries", i),
                    "bounded mode needs at least one retry",
                ));
            }
            if retry.backoff != BackoffKind::Constant && retry.delay_ms > retry.max_delay_ms {
                return Err(invalid(
                    format!("clients[{}].policy.retry.delay_ms", i),
                    "delay exceeds max_delay_ms",
                ));
            }
        }
        Ok(())
    }

    /// Build one binding per configured client.
    pub fn build_registry(&self) -> Result<ClientRegistry> {
        let mut builder = ClientRegistry::builder();
        for client in &self.clients {
            builder = builder.register(client.build_binding()?);
        }
        builder.build()
    }
}

impl ClientConfig {
    pub fn build_binding(&self) -> Result<ClientBinding> {
        let mut builder = ClientBinding::builder(&self.name)
            .base_url(&self.base_url)
            .default_headers(self.headers.clone())
            .transient_statuses(self.transient_statuses.clone());
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if self.policy.observe_success {
            let signal = ConnectivitySignal::default();
            let chain = self.policy_chain(Some(&signal))?;
            builder.connectivity(signal).chain(chain).build()
        } else {
            builder.chain(self.policy_chain(None)?).build()
        }
    }

    /// The retry policy, plus the release observer when `signal` is given.
    /// Without an observer nothing would ever release the signal, so the
    /// retry policy only holds it when one is present.
    fn policy_chain(
        &self,
        signal: Option<&ConnectivitySignal>,
    ) -> Result<PolicyChain<HttpResponse>> {
        let retry = &self.policy.retry;
        let repeat = match retry.mode {
            RetryMode::Forever => Repeat::Forever,
            RetryMode::Bounded => Repeat::Bounded(retry.max_retries),
            RetryMode::None => Repeat::Once,
        };

        let mut builder = PolicyChain::builder().then(presets::retry_transient(
            format!("{}.retry", self.name),
            repeat,
            retry.to_backoff(),
            signal.cloned(),
        ));
        if let Some(signal) = signal {
            builder = builder.then(presets::release_on_success(signal.clone()));
        }
        builder.build()
    }
}

fn invalid(field_path: String, message: impl Into<String>) -> Error {
    Error::configuration_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field_path)
            .with_source("config"),
    )
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
