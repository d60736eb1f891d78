//! # resilient-http
//!
//! 可组合的重试策略与命名 HTTP 客户端：瞬时故障无限重试，首次成功时释放连通锁。
//!
//! Composable retry policies for named HTTP clients.
//!
//! ## Overview
//!
//! Outbound calls go through a named [`ClientBinding`]. Each binding carries a
//! policy chain that decides, per attempt, whether to fire a hook and whether to
//! try again. The standard chain is:
//!
//! 1. a forever-retry policy on transient faults (network errors, timeouts,
//!    5xx, 408) with a constant 1s delay, logging every failed attempt;
//! 2. wrapped around a single-shot observer that releases the binding's
//!    [`ConnectivitySignal`] on the first successful response.
//!
//! Non-transient faults (e.g. 4xx) settle the call immediately. A failing hook
//! aborts the chain with [`Error::CallbackFault`]. Cancellation is observed
//! before each attempt and during each delay.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resilient_http::{ClientBinding, ClientRegistry, HttpRequest};
//!
//! #[tokio::main]
//! async fn main() -> resilient_http::Result<()> {
//!     let registry = ClientRegistry::builder()
//!         .register(
//!             ClientBinding::builder("primary")
//!                 .base_url("https://google.com")
//!                 .default_header("accept", "application/json")
//!                 .build()?,
//!         )
//!         .build()?;
//!
//!     let response = registry.invoke("primary", HttpRequest::get("")).await?;
//!     println!("status {}", response.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`policy`] | Policies, hooks, composition and the executor |
//! | [`transport`] | reqwest transport and fault classification |
//! | [`client`] | Client bindings, registry and policy presets |
//! | [`config`] | YAML client definitions with environment overrides |
//! | [`forecast`] | Demo forecast service |

pub mod client;
pub mod config;
pub mod error;
pub mod forecast;
pub mod policy;
pub mod transport;

pub use client::{CallStats, ClientBinding, ClientBindingBuilder, ClientRegistry};
pub use error::{Error, ErrorContext};
pub use policy::{
    compose, AttemptContext, AttemptInfo, Backoff, ConnectivitySignal, Executor, Hook, Operation,
    Outcome, Policy, PolicyChain, RetryPolicy,
};
pub use transport::{HttpRequest, HttpResponse};

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;
