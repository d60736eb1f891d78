//! Registry invocations against a mock upstream.

use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use resilient_http::client::presets;
use resilient_http::config::Config;
use resilient_http::forecast::{ForecastService, FORECAST_DAYS};
use resilient_http::policy::{Backoff, ConnectivitySignal};
use resilient_http::{ClientBinding, ClientRegistry, Error, HttpRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const RETRY_DELAY: Duration = Duration::from_millis(20);

/// A mock upstream plus a registry with one `primary` binding pointed at it.
struct Fixture {
    server: ServerGuard,
    registry: ClientRegistry,
    signal: ConnectivitySignal,
}

impl Fixture {
    async fn new() -> Self {
        Self::with_delay(RETRY_DELAY).await
    }

    async fn with_delay(delay: Duration) -> Self {
        let server = Server::new_async().await;
        let signal = ConnectivitySignal::held();
        let binding = ClientBinding::builder("primary")
            .base_url(server.url())
            .default_header("accept", "application/json")
            .timeout(Duration::from_secs(5))
            .retry_delay(delay)
            .connectivity(signal.clone())
            .build()
            .expect("binding");
        let registry = ClientRegistry::builder()
            .register(binding)
            .build()
            .expect("registry");
        Self {
            server,
            registry,
            signal,
        }
    }
}

#[tokio::test]
async fn retries_transient_statuses_until_success() {
    let mut fx = Fixture::new().await;
    let unavailable = fx
        .server
        .mock("GET", "/")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;
    let ok = fx
        .server
        .mock("GET", "/")
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    let (outcome, stats) = fx
        .registry
        .invoke_with_stats("primary", HttpRequest::get(""), CancellationToken::new())
        .await;

    let response = outcome.expect("eventually succeeds");
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), r#"{"ok":true}"#);
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.retry_count(), 2);
    assert_eq!(stats.http_status, Some(200));
    assert!(stats.duration_ms >= (RETRY_DELAY * 2).as_millis());
    assert!(fx.signal.is_online());
    assert_eq!(fx.signal.releases(), 1);

    unavailable.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut fx = Fixture::new().await;
    let missing = fx
        .server
        .mock("GET", "/forecast")
        .with_status(404)
        .with_body("no such resource")
        .expect(1)
        .create_async()
        .await;

    let err = fx
        .registry
        .invoke("primary", HttpRequest::get("forecast"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NonTransient { .. }));
    assert_eq!(err.status_code(), Some(404));
    let details = err.context().and_then(|c| c.details.clone());
    assert_eq!(details.as_deref(), Some("no such resource"));
    assert!(!fx.signal.is_online());
    missing.assert_async().await;
}

#[tokio::test]
async fn sends_default_headers_and_request_id() {
    let mut fx = Fixture::new().await;
    let mock = fx
        .server
        .mock("POST", "/items")
        .match_header("accept", "application/json")
        .match_header(
            "x-request-id",
            Matcher::Regex("^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[0-9a-f]{4}-[0-9a-f]{12}$".into()),
        )
        .match_header("x-trace", "abc")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .match_body(Matcher::Json(serde_json::json!({"name": "widget"})))
        .with_status(201)
        .create_async()
        .await;

    let request = HttpRequest::post_json("/items", serde_json::json!({"name": "widget"}))
        .with_header("x-trace", "abc")
        .with_query("page", "2");
    let response = fx.registry.invoke("primary", request).await.unwrap();

    assert_eq!(response.status, 201);
    mock.assert_async().await;
}

#[tokio::test]
async fn unknown_client_fails_fast() {
    let fx = Fixture::new().await;
    let (outcome, stats) = fx
        .registry
        .invoke_with_stats("secondary", HttpRequest::get(""), CancellationToken::new())
        .await;

    assert!(matches!(outcome, Err(Error::UnknownClient { ref name }) if name == "secondary"));
    assert_eq!(stats.attempts, 0);
}

#[tokio::test]
async fn deadline_cancels_a_pending_retry() {
    let mut fx = Fixture::with_delay(Duration::from_secs(30)).await;
    let down = fx
        .server
        .mock("GET", "/")
        .with_status(502)
        .expect(1)
        .create_async()
        .await;

    let err = fx
        .registry
        .invoke_with_deadline("primary", HttpRequest::get(""), Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { attempts: 1 }));
    down.assert_async().await;
}

#[tokio::test]
async fn explicit_cancellation_settles_the_call() {
    let mut fx = Fixture::with_delay(Duration::from_secs(30)).await;
    let _down = fx
        .server
        .mock("GET", "/")
        .with_status(500)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let (outcome, stats) = fx
        .registry
        .invoke_with_stats("primary", HttpRequest::get(""), cancel)
        .await;

    assert!(outcome.unwrap_err().is_cancelled());
    assert!(stats.cancelled);
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.http_status, None);
}

#[tokio::test]
async fn forecast_waits_for_upstream() {
    let mut fx = Fixture::new().await;
    // mocks are removed from the server when dropped
    let _timeout = fx
        .server
        .mock("GET", "/")
        .with_status(504)
        .expect(1)
        .create_async()
        .await;
    let _ok = fx
        .server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<html></html>")
        .create_async()
        .await;

    let forecasts = ForecastService::new(fx.registry.clone()).get().await.unwrap();

    assert_eq!(forecasts.len(), FORECAST_DAYS);
    assert_eq!(fx.signal.releases(), 1);
    assert_eq!(
        forecasts,
        resilient_http::forecast::forecasts_for_body(b"<html></html>")
    );
}

#[tokio::test]
async fn forecast_propagates_non_transient_faults() {
    let mut fx = Fixture::new().await;
    let _unauthorized = fx
        .server
        .mock("GET", "/")
        .with_status(401)
        .create_async()
        .await;

    let err = ForecastService::new(fx.registry.clone())
        .get()
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(401));
}

fn registry_with(binding: ClientBinding) -> ClientRegistry {
    ClientRegistry::builder()
        .register(binding)
        .build()
        .expect("registry")
}

#[tokio::test]
async fn absolute_urls_stay_on_the_client_origin() {
    let mut fx = Fixture::new().await;
    let mut other = Server::new_async().await;
    let stolen = other
        .mock("GET", "/steal")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;
    let own = fx
        .server
        .mock("GET", "/status")
        .match_header("accept", "application/json")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let err = fx
        .registry
        .invoke("primary", HttpRequest::get(format!("{}/steal", other.url())))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NonTransient { .. }));

    let response = fx
        .registry
        .invoke("primary", HttpRequest::get(format!("{}/status", fx.server.url())))
        .await
        .unwrap();
    assert_eq!(response.status, 200);

    stolen.assert_async().await;
    own.assert_async().await;
}

#[tokio::test]
async fn config_without_observer_exposes_no_signal() {
    let mut server = Server::new_async().await;
    let _unavailable = server
        .mock("GET", "/")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let _ok = server
        .mock("GET", "/")
        .with_status(200)
        .create_async()
        .await;

    let yaml = format!(
        "clients:\n  - name: primary\n    base_url: {}\n    policy:\n      retry: {{ mode: forever, delay_ms: 10 }}\n      observe_success: false\n",
        server.url()
    );
    let registry = Config::from_yaml_str(&yaml).unwrap().build_registry().unwrap();

    let (outcome, stats) = registry
        .invoke_with_stats("primary", HttpRequest::get(""), CancellationToken::new())
        .await;

    assert_eq!(outcome.unwrap().status, 200);
    assert_eq!(stats.attempts, 2);
    assert!(registry.get("primary").unwrap().connectivity().is_none());
}

/// Accepts one connection, reads the request, then answers 200 after `delay`.
async fn slow_upstream(delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        tokio::time::sleep(delay).await;
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
            .await;
        let _ = socket.shutdown().await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn deadline_keeps_an_in_flight_success() {
    let base = slow_upstream(Duration::from_millis(300)).await;
    let signal = ConnectivitySignal::held();
    let registry = registry_with(
        ClientBinding::builder("primary")
            .base_url(base)
            .retry_delay(RETRY_DELAY)
            .connectivity(signal.clone())
            .build()
            .unwrap(),
    );

    let response = registry
        .invoke_with_deadline("primary", HttpRequest::get(""), Duration::from_millis(100))
        .await
        .expect("the attempt in flight settles the call");

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "ok");
    assert!(signal.is_online());
}

#[tokio::test]
async fn connection_refused_is_transient() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let registry = registry_with(
        ClientBinding::builder("primary")
            .base_url(format!("http://{}", addr))
            .policy(presets::bounded_retry_transient(
                2,
                Backoff::constant(Duration::from_millis(10)),
            ))
            .build()
            .unwrap(),
    );

    let (outcome, stats) = registry
        .invoke_with_stats("primary", HttpRequest::get(""), CancellationToken::new())
        .await;

    assert!(outcome.unwrap_err().is_transient());
    assert_eq!(stats.attempts, 3);
}

#[tokio::test]
async fn timeout_is_transient() {
    // accepted by the OS backlog, never answered
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = registry_with(
        ClientBinding::builder("primary")
            .base_url(format!("http://{}", addr))
            .timeout(Duration::from_millis(100))
            .policy(presets::bounded_retry_transient(
                1,
                Backoff::constant(Duration::from_millis(10)),
            ))
            .build()
            .unwrap(),
    );

    let (outcome, stats) = registry
        .invoke_with_stats("primary", HttpRequest::get(""), CancellationToken::new())
        .await;

    assert!(outcome.unwrap_err().is_transient());
    assert_eq!(stats.attempts, 2);
    drop(listener);
}

#[tokio::test]
async fn unsupported_scheme_is_not_retried() {
    let registry = registry_with(
        ClientBinding::builder("primary")
            .base_url("ftp://127.0.0.1:21/")
            .retry_delay(RETRY_DELAY)
            .build()
            .unwrap(),
    );

    let (outcome, stats) = registry
        .invoke_with_stats("primary", HttpRequest::get(""), CancellationToken::new())
        .await;

    let err = outcome.unwrap_err();
    assert!(matches!(err, Error::NonTransient { .. }));
    assert_eq!(stats.attempts, 1);
}
