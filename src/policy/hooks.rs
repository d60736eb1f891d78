//! Side-effect hooks fired by a policy when its trigger matches.
//!
//! The engine never assumes an observability backend: logging, lock release and
//! anything else a caller wants to happen on a trigger goes through [`Hook`].
//! A hook returning `Err` is fatal to the whole chain (`Error::CallbackFault`).

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{info, warn};

use super::context::AttemptInfo;
use super::Outcome;
use crate::Result;

fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[async_trait]
pub trait Hook<T: Send + Sync + 'static>: Send + Sync {
    /// Name used in logs and in `Error::CallbackFault`.
    fn name(&self) -> &str {
        "hook"
    }

    async fn on_trigger(&self, outcome: &Outcome<T>, info: AttemptInfo) -> Result<()>;
}

/// Adapts a plain closure into a [`Hook`].
pub struct FnHook<F> {
    name: String,
    func: F,
}

impl<F> FnHook<F> {
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<T, F> Hook<T> for FnHook<F>
where
    T: Send + Sync + 'static,
    F: Fn(&Outcome<T>, AttemptInfo) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_trigger(&self, outcome: &Outcome<T>, info: AttemptInfo) -> Result<()> {
        (self.func)(outcome, info)
    }
}

/// Logs every retry decision at `warn` level: the fault (if any), the attempt
/// number and a wall-clock timestamp.
#[derive(Debug, Clone)]
pub struct LogRetryHook {
    label: String,
}

impl LogRetryHook {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for LogRetryHook {
    fn default() -> Self {
        Self::new("retry")
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Hook<T> for LogRetryHook {
    fn name(&self) -> &str {
        &self.label
    }

    async fn on_trigger(&self, outcome: &Outcome<T>, info: AttemptInfo) -> Result<()> {
        let fault = outcome.as_ref().err().map(|e| e.to_string());
        warn!(
            policy = self.label.as_str(),
            attempt = info.attempt,
            total_attempts = info.total_attempts,
            elapsed_ms = info.elapsed.as_millis() as u64,
            delay_ms = info.next_delay.map(|d| d.as_millis() as u64),
            timestamp = timestamp(),
            fault = fault.as_deref().unwrap_or(""),
            "attempt failed"
        );
        Ok(())
    }
}

/// The "connectivity lock": offline while requests keep failing, released
/// (back online) the moment one succeeds.
///
/// Clones share the same state. Waiters block in [`ConnectivitySignal::wait_online`].
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    tx: Arc<watch::Sender<bool>>,
    releases: Arc<AtomicU64>,
}

impl ConnectivitySignal {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self {
            tx: Arc::new(tx),
            releases: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start held (offline).
    pub fn held() -> Self {
        Self::new(false)
    }

    pub fn hold(&self) {
        self.tx.send_replace(false);
    }

    pub fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(true);
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Number of times `release` was called.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }

    pub async fn wait_online(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|online| *online).await;
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Releases a [`ConnectivitySignal`] on every attempt its policy observes.
#[derive(Debug, Clone)]
pub struct ReleaseConnectivityHook {
    signal: ConnectivitySignal,
}

impl ReleaseConnectivityHook {
    pub fn new(signal: ConnectivitySignal) -> Self {
        Self { signal }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Hook<T> for ReleaseConnectivityHook {
    fn name(&self) -> &str {
        "release_connectivity"
    }

    async fn on_trigger(&self, _outcome: &Outcome<T>, info: AttemptInfo) -> Result<()> {
        let was_online = self.signal.is_online();
        self.signal.release();
        if !was_online {
            info!(
                attempt = info.attempt,
                elapsed_ms = info.elapsed.as_millis() as u64,
                "connectivity restored, lock released"
            );
        }
        Ok(())
    }
}

/// Marks a [`ConnectivitySignal`] as held (offline) whenever its policy fires.
#[derive(Debug, Clone)]
pub struct HoldConnectivityHook {
    signal: ConnectivitySignal,
}

impl HoldConnectivityHook {
    pub fn new(signal: ConnectivitySignal) -> Self {
        Self { signal }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Hook<T> for HoldConnectivityHook {
    fn name(&self) -> &str {
        "hold_connectivity"
    }

    async fn on_trigger(&self, _outcome: &Outcome<T>, _info: AttemptInfo) -> Result<()> {
        self.signal.hold();
        Ok(())
    }
}

/// Runs several hooks in order. The first failure stops the rest and is
/// returned, so it still aborts the invocation.
pub struct CompositeHook<T: Send + Sync + 'static> {
    name: String,
    hooks: Vec<Arc<dyn Hook<T>>>,
}

impl<T: Send + Sync + 'static> CompositeHook<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Vec::new(),
        }
    }

    pub fn add_hook<H: Hook<T> + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Hook<T> for CompositeHook<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_trigger(&self, outcome: &Outcome<T>, info: AttemptInfo) -> Result<()> {
        for hook in &self.hooks {
            hook.on_trigger(outcome, info).await?;
        }
        Ok(())
    }
}
