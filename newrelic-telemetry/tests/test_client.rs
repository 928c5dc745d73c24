use std::time::{Duration, SystemTime, UNIX_EPOCH};

use httpmock::prelude::*;
use serde_json::json;

use newrelic_telemetry::{
    attributes, ClientOptions, Common, Error, Event, EventBatch, EventClient, GaugeMetric, Log,
    LogClient, MetricBatch, MetricClient, Snapshot, Span, SpanClient, USER_AGENT,
};

fn options(server: &MockServer) -> ClientOptions {
    ClientOptions::new()
        .license_key("test-key")
        .host(format!("http://{}", server.host()))
        .port(server.port())
        .allow_plaintext(true)
}

fn at_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}

#[test]
fn test_sends_gzipped_request_with_headers() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/log/v1")
            .header("api-key", "test-key")
            .header("content-type", "application/json")
            .header("content-encoding", "gzip")
            .header("user-agent", USER_AGENT.as_str())
            .header_exists("x-request-id");
        then.status(202).body(r#"{"requestId":"abc"}"#);
    });

    let client = LogClient::new(&options(&server)).unwrap();
    let response = client.send(Log::new("Hello World")).unwrap();

    mock.assert();
    assert_eq!(response.status(), 202);
    assert!(response.ok());
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["requestId"], "abc");
}

#[test]
fn test_paths_per_kind() {
    let server = MockServer::start();
    let mocks = ["/metric/v1", "/v1/accounts/events", "/trace/v1", "/log/v1"].map(|path| {
        server.mock(|when, then| {
            when.method(POST).path(path);
            then.status(202);
        })
    });

    let options = options(&server);
    MetricClient::new(&options)
        .unwrap()
        .send(GaugeMetric::new("temperature", 78.6))
        .unwrap();
    EventClient::new(&options)
        .unwrap()
        .send(Event::new("RateLimitEvent"))
        .unwrap();
    SpanClient::new(&options)
        .unwrap()
        .send(Span::new("GET /users"))
        .unwrap();
    LogClient::new(&options)
        .unwrap()
        .send(Log::new("Hello World"))
        .unwrap();

    for mock in &mocks {
        mock.assert_hits(1);
    }
}

#[test]
fn test_event_body_is_flat() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/accounts/events").json_body(json!([
            {"eventType": "Purchase", "timestamp": 1600000000000u64, "amount": 12.5},
        ]));
        then.status(200);
    });

    let client = EventClient::new(&options(&server).compress(false)).unwrap();
    let event = Event::new("Purchase")
        .with_timestamp(at_millis(1_600_000_000_000))
        .with_attribute("amount", 12.5);
    let response = client.send(event).unwrap();

    mock.assert();
    assert!(response.ok());
}

#[test]
fn test_metric_body_carries_common_block() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/metric/v1")
            .body_contains(r#""common":"#)
            .body_contains(r#""interval.ms":"#)
            .body_contains(r#""host":"web-1""#)
            .body_contains(r#""name":"requests""#)
            .body_contains(r#""type":"count""#);
        then.status(202);
    });

    let batch = MetricBatch::new().with_attributes(attributes! { "host" => "web-1" });
    batch
        .record_count("requests", 3.0, Default::default())
        .unwrap();
    let snapshot = batch.flush();

    let client = MetricClient::new(&options(&server).compress(false)).unwrap();
    client.send_snapshot(&snapshot).unwrap();
    mock.assert();
}

#[test]
fn test_hand_built_log_snapshot() {
    let snapshot = Snapshot::new(
        vec![Log::new("Hello World")],
        Some(Common::from_attributes(attributes! { "service.name" => "billing" })),
    );
    let request_id = snapshot.batch_id().to_string();

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/log/v1")
            .header("x-request-id", request_id.as_str())
            .body_contains(r#""common":{"attributes":{"service.name":"billing"}}"#)
            .body_contains(r#""message":"Hello World""#);
        then.status(202);
    });

    let client = LogClient::new(&options(&server).compress(false)).unwrap();
    assert!(client.send_snapshot(&snapshot).unwrap().ok());
    mock.assert();
}

#[test]
fn test_snapshot_batch_id_is_request_id() {
    let server = MockServer::start();
    let batch = EventBatch::new();
    batch.record(Event::new("Deploy")).unwrap();
    let snapshot = batch.flush();

    let request_id = snapshot.batch_id().to_string();
    let mock = server.mock(|when, then| {
        when.method(POST).header("x-request-id", request_id.as_str());
        then.status(202);
    });

    let client = EventClient::new(&options(&server)).unwrap();
    client.send_snapshot(&snapshot).unwrap();
    mock.assert();
}

#[test]
fn test_version_info_in_user_agent() {
    let server = MockServer::start();
    let expected = format!("{} my-product/1.0.0", USER_AGENT.as_str());
    let mock = server.mock(|when, then| {
        when.method(POST).header("user-agent", expected.as_str());
        then.status(202);
    });

    let client = SpanClient::new(&options(&server)).unwrap();
    client.add_version_info("my-product", "1.0.0");
    client.send(Span::new("work")).unwrap();
    mock.assert();
}

#[test]
fn test_error_status_is_a_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/log/v1");
        then.status(413)
            .header("retry-after", "30")
            .body("payload too large");
    });

    let client = LogClient::new(&options(&server)).unwrap();
    let response = client.send(Log::new("big")).unwrap();
    assert!(!response.ok());
    assert_eq!(response.header("Retry-After"), Some("30"));
    assert_eq!(response.text(), "payload too large");

    match response.raise_for_status() {
        Err(err @ Error::Http { .. }) => {
            assert_eq!(err.status(), Some(413));
            assert!(!err.is_retryable());
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_connection_failure_is_transport_error() {
    let options = ClientOptions::new()
        .license_key("test-key")
        .host("http://127.0.0.1")
        .port(1)
        .allow_plaintext(true)
        .connect_timeout(Duration::from_millis(500));

    let client = LogClient::new(&options).unwrap();
    match client.send(Log::new("unreachable")) {
        Err(err @ Error::Transport(_)) => assert!(err.is_retryable()),
        other => panic!("unexpected result: {other:?}"),
    }
}
