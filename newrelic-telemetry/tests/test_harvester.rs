use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;

use newrelic_telemetry::{
    attributes, ClientOptions, Error, Event, Harvester, HarvesterState, Log, LogBatch,
    LogClient, Span, TelemetryGuard,
};
use newrelic_telemetry_core::test::TestTransport;

const PROXY_VARS: [&str; 2] = ["HTTPS_PROXY", "https_proxy"];

fn init(options: ClientOptions) -> Result<TelemetryGuard, Error> {
    let _ = pretty_env_logger::try_init();
    temp_env::with_vars_unset(PROXY_VARS, || newrelic_telemetry::init(options))
}

fn options(server: &MockServer) -> ClientOptions {
    ClientOptions::new()
        .license_key("test-key")
        .host(format!("http://{}", server.host()))
        .port(server.port())
        .allow_plaintext(true)
        .harvest_interval(Duration::from_secs(60))
        .shutdown_timeout(Duration::from_secs(5))
}

#[test]
fn test_shutdown_delivers_everything() {
    let server = MockServer::start();
    let mocks = ["/metric/v1", "/v1/accounts/events", "/trace/v1", "/log/v1"].map(|path| {
        server.mock(|when, then| {
            when.method(POST).path(path).header("api-key", "test-key");
            then.status(202);
        })
    });

    let telemetry = init(options(&server)).unwrap();
    assert_eq!(telemetry.harvester().state(), HarvesterState::Running);

    telemetry
        .metrics()
        .record_gauge("temperature", 78.6, attributes! { "units" => "F" })
        .unwrap();
    telemetry.events().record(Event::new("Deploy")).unwrap();
    let mut span = Span::new("GET /users");
    span.finish().unwrap();
    telemetry.spans().record(span).unwrap();
    telemetry.logs().record(Log::new("Hello World")).unwrap();

    assert!(telemetry.shutdown());
    for mock in &mocks {
        mock.assert_hits(1);
    }
}

#[test]
fn test_empty_batches_are_not_sent() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST);
        then.status(202);
    });

    let telemetry = init(options(&server)).unwrap();
    telemetry.logs().record(Log::new("only logs")).unwrap();
    drop(telemetry);

    assert_eq!(mock.hits(), 1);
}

#[test]
fn test_rejected_requests_are_dropped() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/log/v1");
        then.status(500).body("internal error");
    });

    let telemetry = init(options(&server)).unwrap();
    telemetry.logs().record(Log::new("lost")).unwrap();
    assert!(telemetry.shutdown());

    mock.assert_hits(1);
}

#[test]
fn test_init_requires_license_key() {
    let _ = pretty_env_logger::try_init();
    let result = temp_env::with_vars_unset(
        ["NEW_RELIC_LICENSE_KEY", "NEW_RELIC_INSERT_KEY"],
        || newrelic_telemetry::init(ClientOptions::new()),
    );
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_init_rejects_zero_harvest_interval() {
    let server = MockServer::start();
    let result = init(options(&server).harvest_interval(Duration::ZERO));
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_harvester_closes_http_clients() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/log/v1");
        then.status(202);
    });

    let batch = Arc::new(LogBatch::new());
    let client = Arc::new(LogClient::new(&options(&server)).unwrap());
    let harvester = Harvester::new(&ClientOptions::default());
    harvester.register(batch.clone(), client.clone()).unwrap();
    harvester.start().unwrap();

    batch.record(Log::new("Hello World")).unwrap();
    assert!(harvester.stop());

    mock.assert_hits(1);
    assert!(client.is_closed());
    assert_eq!(harvester.state(), HarvesterState::Stopped);
}

#[test]
fn test_periodic_harvest() {
    let batch = Arc::new(LogBatch::new());
    let transport = TestTransport::new();
    let harvester = Harvester::new(&ClientOptions::default())
        .with_interval(Duration::from_millis(50));
    harvester.register(batch.clone(), transport.clone()).unwrap();
    harvester.start().unwrap();

    batch.record(Log::new("first")).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(batch.is_empty());
    assert_eq!(transport.sent_count(), 1);

    batch.record(Log::new("second")).unwrap();
    assert!(harvester.stop());

    let messages: Vec<_> = transport
        .fetch_and_clear()
        .into_iter()
        .flat_map(|snapshot| snapshot.into_items())
        .map(|log| log.message)
        .collect();
    assert_eq!(messages, ["first", "second"]);
    assert_eq!(transport.close_count(), 1);
}
