mod common;

use chrono::{TimeZone, Utc};
use std::time::{Duration, Instant};

use common::{CZ_EIC, MockResponse, MockUpstream, TOKEN, acknowledgement, gl_document, no_data_acknowledgement};
use entsoe_backend::services::entsoe::{
    ClientError, Endpoint, EntsoeClient, EntsoeTransport, FetchOutcome, HttpTransport, RetryPolicy,
    TransportConfig, TransportError,
};

fn config(base_url: &str) -> TransportConfig {
    let mut config = TransportConfig::new(TOKEN);
    config.base_url = base_url.to_string();
    config.retry = RetryPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        ..RetryPolicy::default()
    };
    config
}

fn params() -> Vec<(&'static str, String)> {
    vec![
        ("documentType", "A65".to_string()),
        ("processType", "A16".to_string()),
        ("outBiddingZone_Domain", CZ_EIC.to_string()),
        ("periodStart", "202401010000".to_string()),
        ("periodEnd", "202401020000".to_string()),
    ]
}

fn day_document() -> String {
    gl_document(CZ_EIC, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 24)
}

#[tokio::test]
async fn test_retries_server_errors_until_success() {
    let upstream = MockUpstream::start(vec![
        MockResponse::status(503, "maintenance"),
        MockResponse::status(503, "maintenance"),
        MockResponse::ok(day_document()),
    ])
    .await;

    let transport = HttpTransport::new(config(&upstream.base_url)).unwrap();
    let body = transport.get(&params()).await.unwrap();

    assert!(body.contains("GL_MarketDocument"));
    assert_eq!(upstream.request_count(), 3);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let upstream = MockUpstream::start(vec![
        MockResponse::status(502, "bad gateway"),
        MockResponse::status(502, "bad gateway"),
        MockResponse::status(502, "bad gateway"),
        MockResponse::ok(day_document()),
    ])
    .await;

    let transport = HttpTransport::new(config(&upstream.base_url)).unwrap();
    let err = transport.get(&params()).await.unwrap_err();

    match err {
        TransportError::Server { attempts, status, .. } => {
            assert_eq!(attempts, 3);
            assert_eq!(status, 502);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(upstream.request_count(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    for status in [401u16, 404, 500] {
        let upstream = MockUpstream::start(vec![
            MockResponse::status(status, "nope"),
            MockResponse::ok(day_document()),
        ])
        .await;

        let transport = HttpTransport::new(config(&upstream.base_url)).unwrap();
        let err = transport.get(&params()).await.unwrap_err();

        let classified = match status {
            401 => matches!(err, TransportError::Authentication { status: 401 }),
            404 => matches!(err, TransportError::NotFound),
            _ => matches!(err, TransportError::UnexpectedStatus { status: 500, .. }),
        };
        assert!(classified, "status {} produced {:?}", status, err);
        assert_eq!(upstream.request_count(), 1, "status {} was retried", status);
    }
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let upstream = MockUpstream::start(vec![
        MockResponse::status(429, "slow down").retry_after(1),
        MockResponse::ok(day_document()),
    ])
    .await;

    let mut config = config(&upstream.base_url);
    config.retry.max_delay = Duration::from_secs(5);
    let transport = HttpTransport::new(config).unwrap();

    let started = Instant::now();
    transport.get(&params()).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(upstream.request_count(), 2);
}

#[tokio::test]
async fn test_token_and_parameters_are_sent() {
    let upstream = MockUpstream::start(vec![MockResponse::ok(day_document())]).await;
    let transport = HttpTransport::new(config(&upstream.base_url)).unwrap();

    transport.get(&params()).await.unwrap();

    let request = &upstream.requests()[0];
    assert_eq!(request["securityToken"], TOKEN);
    assert_eq!(request["documentType"], "A65");
    assert_eq!(request["outBiddingZone_Domain"], CZ_EIC);
    assert_eq!(request["periodStart"], "202401010000");
}

#[tokio::test]
async fn test_bad_request_acknowledgement_is_no_data() {
    let upstream = MockUpstream::start(vec![MockResponse::status(400, no_data_acknowledgement())]).await;
    let client = EntsoeClient::from_config(config(&upstream.base_url)).unwrap();

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let outcome = client
        .fetch_load(Endpoint::ActualLoad, CZ_EIC, start, start + chrono::Duration::days(1))
        .await
        .unwrap();

    assert_eq!(outcome, FetchOutcome::NoData);
    assert_eq!(upstream.request_count(), 1);
}

#[tokio::test]
async fn test_rejection_and_exhaustion_surface_through_client() {
    let upstream = MockUpstream::start(vec![
        MockResponse::status(400, acknowledgement("A01", "Invalid query attributes")),
        MockResponse::status(504, ""),
        MockResponse::status(504, ""),
        MockResponse::status(504, ""),
    ])
    .await;
    let client = EntsoeClient::from_config(config(&upstream.base_url)).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let end = start + chrono::Duration::days(1);

    match client.fetch_load(Endpoint::ActualLoad, CZ_EIC, start, end).await.unwrap() {
        FetchOutcome::Rejected(reason) => {
            assert_eq!(reason.code, "A01");
            assert_eq!(reason.text.as_deref(), Some("Invalid query attributes"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let err = client
        .fetch_load(Endpoint::ActualLoad, CZ_EIC, start, end)
        .await
        .unwrap_err();
    match &err {
        ClientError::Transport { context, source } => {
            assert_eq!(context.endpoint, "actual_load");
            assert_eq!(context.period_start, start);
            assert_eq!(source.status(), Some(504));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(upstream.request_count(), 4);
}
