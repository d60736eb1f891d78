//! Ready-made policies for HTTP bindings.

use std::time::Duration;

use crate::policy::{
    Backoff, CompositeHook, ConnectivitySignal, HoldConnectivityHook, LogRetryHook, PolicyChain,
    ReleaseConnectivityHook, Repeat, RetryPolicy,
};
use crate::transport::HttpResponse;
use crate::Result;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Retry transient faults per `repeat` and `backoff`, logging each failure.
///
/// With `hold` set, every failed attempt also marks that connectivity signal
/// offline; pair it with [`release_on_success`] on the same signal.
pub fn retry_transient(
    name: impl Into<String>,
    repeat: Repeat,
    backoff: Backoff,
    hold: Option<ConnectivitySignal>,
) -> RetryPolicy<HttpResponse> {
    let name = name.into();
    let mut hook = CompositeHook::<HttpResponse>::new(name.clone())
        .add_hook(LogRetryHook::new(name.clone()));
    if let Some(signal) = hold {
        hook = hook.add_hook(HoldConnectivityHook::new(signal));
    }
    RetryPolicy::<HttpResponse>::builder()
        .name(name)
        .handle_fault(|e| e.is_transient())
        .repeat(repeat)
        .backoff(backoff)
        .hook(hook)
        .build()
}

/// Retry transient faults forever with a constant delay.
pub fn forever_retry_transient(delay: Duration) -> RetryPolicy<HttpResponse> {
    retry_transient("forever_retry", Repeat::Forever, Backoff::constant(delay), None)
}

/// Single-shot observer: on a successful response, release the connectivity
/// lock. Never retries.
pub fn release_on_success(signal: ConnectivitySignal) -> RetryPolicy<HttpResponse> {
    RetryPolicy::<HttpResponse>::builder()
        .name("release_on_success")
        .handle_result(HttpResponse::is_success)
        .once()
        .hook(ReleaseConnectivityHook::new(signal))
        .build()
}

/// `[forever-retry, success-observer]`: transient failures are logged and
/// hold `signal`; the first successful attempt releases it.
pub fn standard_chain(delay: Duration, signal: ConnectivitySignal) -> Result<PolicyChain<HttpResponse>> {
    PolicyChain::builder()
        .then(retry_transient(
            "forever_retry",
            Repeat::Forever,
            Backoff::constant(delay),
            Some(signal.clone()),
        ))
        .then(release_on_success(signal))
        .build()
}

/// Retry transient faults at most `max_retries` times.
pub fn bounded_retry_transient(max_retries: u32, backoff: Backoff) -> RetryPolicy<HttpResponse> {
    retry_transient("bounded_retry", Repeat::Bounded(max_retries), backoff, None)
}
