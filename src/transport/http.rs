use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Proxy};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::env;
use std::time::{Duration, Instant};
use tracing::info;
use url::Url;

use super::classification::{is_transient_reqwest_error, StatusClass, TransientStatuses};
use crate::policy::Outcome;
use crate::{Error, ErrorContext, Result};

/// Header carrying our own correlation id on every attempt.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Connection settings of one named client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub default_headers: HashMap<String, String>,
    pub timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub transient_statuses: TransientStatuses,
}

impl TransportConfig {
    /// Defaults, overridable through the environment:
    /// - `RESILIENT_HTTP_TIMEOUT_SECS` (default 30)
    /// - `RESILIENT_HTTP_POOL_MAX_IDLE_PER_HOST` (default 32)
    /// - `RESILIENT_HTTP_POOL_IDLE_TIMEOUT_SECS` (default 90)
    pub fn new(base_url: impl Into<String>) -> Self {
        let timeout_secs = env::var("RESILIENT_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let pool_max_idle_per_host = env::var("RESILIENT_HTTP_POOL_MAX_IDLE_PER_HOST")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(32);
        let pool_idle_secs = env::var("RESILIENT_HTTP_POOL_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(90);

        Self {
            base_url: base_url.into(),
            default_headers: HashMap::new(),
            timeout: Duration::from_secs(timeout_secs),
            pool_max_idle_per_host,
            pool_idle_timeout: Duration::from_secs(pool_idle_secs),
            transient_statuses: TransientStatuses::default(),
        }
    }
}

/// One outbound request, relative to a client's base URL.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        let mut req = Self::new(Method::POST, path);
        req.body = Some(body);
        req
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A fully read response. Bodies are buffered so an outcome can be inspected
/// by every policy in the chain.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    transient_statuses: TransientStatuses,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url '{}': {}", config.base_url, e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("http_transport"),
            )
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let (name, value) = parse_header(name, value).map_err(|msg| {
                Error::configuration_with_context(
                    msg,
                    ErrorContext::new()
                        .with_field_path(format!("headers.{}", name))
                        .with_source("http_transport"),
                )
            })?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(config.pool_idle_timeout));

        if let Ok(proxy_url) = env::var("RESILIENT_HTTP_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("failed to build http client: {}", e),
                ErrorContext::new().with_source("http_transport"),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            transient_statuses: config.transient_statuses.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a request path against the base URL. An empty path means the
    /// base URL itself. An absolute URL must share the base URL's origin, since
    /// the binding's default headers go out with every request.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        if path.is_empty() {
            return Ok(self.base_url.clone());
        }
        if path.starts_with("http://") || path.starts_with("https://") {
            let url = Url::parse(path).map_err(|e| invalid_url(path, e))?;
            if url.origin() != self.base_url.origin() {
                return Err(Error::non_transient(
                    format!(
                        "request url '{}' is outside the client origin '{}'",
                        url,
                        self.base_url.origin().ascii_serialization()
                    ),
                    ErrorContext::new()
                        .with_field_path("path")
                        .with_source("http_transport"),
                ));
            }
            return Ok(url);
        }
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| invalid_url(&joined, e))
    }

    /// Execute a single attempt and classify its result.
    pub async fn send(&self, request: &HttpRequest, request_id: &str) -> Outcome<HttpResponse> {
        let url = self.resolve(&request.path)?;

        let mut req = self
            .client
            .request(request.method.clone(), url.clone())
            .header(REQUEST_ID_HEADER, request_id);
        for (name, value) in &request.headers {
            let (name, value) = parse_header(name, value).map_err(|msg| {
                Error::non_transient(
                    msg,
                    ErrorContext::new()
                        .with_request_id(request_id)
                        .with_source("http_transport"),
                )
            })?;
            req = req.header(name, value);
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let start = Instant::now();
        let resp = req
            .send()
            .await
            .map_err(|e| fault_from_reqwest(e, request_id))?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| fault_from_reqwest(e, request_id))?;

        match self.transient_statuses.classify(status) {
            StatusClass::Success => Ok(HttpResponse {
                status,
                headers,
                body,
            }),
            class => {
                info!(
                    http_status = status,
                    request_id,
                    url = url.as_str(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    transient = class == StatusClass::Transient,
                    "request failed"
                );
                let context = ErrorContext::new()
                    .with_status_code(status)
                    .with_request_id(request_id)
                    .with_source("http_transport");
                let message = format!("HTTP {} from {}", status, url);
                if class == StatusClass::Transient {
                    Err(Error::transient(message, context))
                } else {
                    let snippet = String::from_utf8_lossy(&body);
                    let snippet: String = snippet.chars().take(256).collect();
                    Err(Error::non_transient(
                        message,
                        context.with_details(snippet),
                    ))
                }
            }
        }
    }
}

fn parse_header(name: &str, value: &str) -> std::result::Result<(HeaderName, HeaderValue), String> {
    let n = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| format!("invalid header name '{}': {}", name, e))?;
    let v = HeaderValue::from_str(value)
        .map_err(|e| format!("invalid value for header '{}': {}", name, e))?;
    Ok((n, v))
}

fn invalid_url(url: &str, err: url::ParseError) -> Error {
    Error::non_transient(
        format!("invalid request url '{}': {}", url, err),
        ErrorContext::new().with_source("http_transport"),
    )
}

fn fault_from_reqwest(err: reqwest::Error, request_id: &str) -> Error {
    let mut context = ErrorContext::new()
        .with_request_id(request_id)
        .with_source("http_transport");
    if let Some(status) = err.status() {
        context = context.with_status_code(status.as_u16());
    }
    if is_transient_reqwest_error(&err) {
        Error::transient(err.to_string(), context)
    } else {
        Error::non_transient(err.to_string(), context)
    }
}
