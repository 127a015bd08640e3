mod common;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::{
    CZ_EIC, InMemoryDataPointStore, InMemoryProgressStore, MockResponse, MockUpstream,
    ScriptedTransport, TOKEN, acknowledgement, gl_document, hourly_load_response,
    no_data_acknowledgement, parse_period,
};
use entsoe_backend::jobs::gap_analysis_sync::run_gap_analysis;
use entsoe_backend::jobs::realtime_collection_sync::run_realtime_collection;
use entsoe_backend::models::backfill::TimeRange;
use entsoe_backend::models::data_point::DataType;
use entsoe_backend::services::backfill::{BackfillConfig, BackfillService};
use entsoe_backend::models::backfill::BackfillStatus;
use entsoe_backend::services::entsoe::{
    DataTarget, Endpoint, EntsoeClient, FetchOutcome, RetryPolicy, TransportConfig,
    TransportError,
};
use entsoe_backend::services::processor::EntsoeDataProcessor;
use entsoe_backend::services::storage::DataPointStore;

#[tokio::test]
async fn test_fetch_process_store_over_http() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let upstream = MockUpstream::start(vec![MockResponse::ok(gl_document(CZ_EIC, start, 24))]).await;

    let mut config = TransportConfig::new(TOKEN);
    config.base_url = upstream.base_url.clone();
    config.retry = RetryPolicy {
        base_delay: std::time::Duration::from_millis(10),
        ..RetryPolicy::default()
    };
    let client = EntsoeClient::from_config(config).unwrap();

    let target = DataTarget::new(Endpoint::ActualLoad, "CZ").unwrap();
    let document = match client.fetch_target(&target, start, start + Duration::days(1)).await.unwrap() {
        FetchOutcome::Data(document) => document,
        other => panic!("unexpected outcome: {:?}", other),
    };

    let points = EntsoeDataProcessor::new().process(&target, &document).unwrap();
    assert_eq!(points.len(), 24);

    let store = InMemoryDataPointStore::new();
    assert_eq!(store.upsert_points(&points).await.unwrap(), 24);
    // Re-running the same document must not add rows
    store.upsert_points(&points).await.unwrap();
    assert_eq!(store.len(), 24);

    let stored = store.all();
    assert_eq!(stored[0].timestamp, start);
    assert_eq!(stored[23].timestamp, start + Duration::hours(23));
    assert_eq!(stored[0].value, dec!(6001));
    assert_eq!(stored[0].area_code, "CZ");
    assert_eq!(stored[0].data_type, DataType::ActualLoad);
    assert_eq!(stored[0].business_type, "A04");
    assert_eq!(stored[0].unit, "MAW");

    let request = &upstream.requests()[0];
    assert_eq!(request["documentType"], "A65");
    assert_eq!(request["processType"], "A16");
    assert_eq!(request["periodStart"], "202401010000");
    assert_eq!(request["periodEnd"], "202401020000");
}

#[tokio::test]
async fn test_realtime_collection_isolates_failures() {
    let transport = ScriptedTransport::new(|params| match params.get("processType").map(String::as_str) {
        Some("A16") => Ok(hourly_load_response(params)),
        Some("A01") => Ok(no_data_acknowledgement()),
        _ => Ok(acknowledgement("A01", "Invalid query attributes")),
    });
    let client = EntsoeClient::new(transport.clone());
    let store = InMemoryDataPointStore::new();

    let targets = vec![
        DataTarget::new(Endpoint::ActualLoad, "CZ").unwrap(),
        DataTarget::new(Endpoint::DayAheadLoadForecast, "CZ").unwrap(),
        DataTarget::new(Endpoint::WeekAheadLoadForecast, "CZ").unwrap(),
    ];
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let window = TimeRange::new(start, start + Duration::hours(72));

    let summary = run_realtime_collection(&client, store.as_ref(), &targets, window).await;

    assert!(!summary.success);
    assert_eq!(summary.targets, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.no_data, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.data_points, 72);
    assert!(summary.failure_reasons[0].contains("week_ahead_load_forecast/CZ"));
    assert_eq!(transport.call_count(), 3);
    assert_eq!(store.len(), 72);
}

#[tokio::test]
async fn test_gap_analysis_backfills_only_targets_with_gaps() {
    let transport = ScriptedTransport::hourly_load();
    let client = EntsoeClient::new(transport.clone());
    let points = InMemoryDataPointStore::new();
    let progress = InMemoryProgressStore::new();

    let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let window = TimeRange::new(start, start + Duration::days(2));
    let complete = DataTarget::new(Endpoint::DayAheadLoadForecast, "CZ").unwrap();
    let partial = DataTarget::new(Endpoint::ActualLoad, "CZ").unwrap();

    // Day-ahead forecast is already complete, actual load is missing day two
    let processor = EntsoeDataProcessor::new();
    let seed = |target: &DataTarget, hours: usize| {
        let xml = gl_document(CZ_EIC, start, hours);
        let doc = entsoe_backend::services::entsoe::parser::parse_gl_document(&xml).unwrap();
        processor
            .process(target, &entsoe_backend::services::entsoe::MarketDocument::Load(doc))
            .unwrap()
    };
    points.insert(seed(&complete, 48));
    points.insert(seed(&partial, 24));

    let service = BackfillService::new(
        client,
        points.clone(),
        progress.clone(),
        BackfillConfig {
            rate_limit_delay_ms: 0,
            chunk_days: Some(1),
        },
    );

    let summary = run_gap_analysis(&service, &[complete, partial], window).await;

    assert!(summary.success, "{:?}", summary.failure_reasons);
    assert_eq!(summary.targets_analyzed, 2);
    assert_eq!(summary.targets_with_gaps, 1);
    assert_eq!(summary.backfills_started, 1);
    assert_eq!(summary.backfills_completed, 1);
    assert_eq!(summary.data_points, 24);

    // Only the missing day was requested
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["periodStart"], "202402020000");

    let gap = service.analyze_gaps(&partial, window).await.unwrap();
    assert!(!gap.has_gaps());
    assert_eq!(gap.coverage_percentage, dec!(100.00));
}

fn gap_service(
    transport: Arc<ScriptedTransport>,
    points: Arc<InMemoryDataPointStore>,
    progress: Arc<InMemoryProgressStore>,
) -> BackfillService {
    BackfillService::new(
        EntsoeClient::new(transport),
        points,
        progress,
        BackfillConfig {
            rate_limit_delay_ms: 0,
            chunk_days: Some(1),
        },
    )
}

#[tokio::test]
async fn test_repeated_gap_analysis_skips_ranges_without_data() {
    let transport = ScriptedTransport::new(|_| Ok(no_data_acknowledgement()));
    let points = InMemoryDataPointStore::new();
    let progress = InMemoryProgressStore::new();
    let service = gap_service(transport.clone(), points.clone(), progress.clone());

    let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let window = TimeRange::new(start, start + Duration::days(2));
    let target = DataTarget::new(Endpoint::ActualLoad, "CZ").unwrap();
    let xml = gl_document(CZ_EIC, start, 24);
    let doc = entsoe_backend::services::entsoe::parser::parse_gl_document(&xml).unwrap();
    points.insert(
        EntsoeDataProcessor::new()
            .process(&target, &entsoe_backend::services::entsoe::MarketDocument::Load(doc))
            .unwrap(),
    );

    let first = run_gap_analysis(&service, &[target], window).await;
    assert!(first.success);
    assert_eq!(first.backfills_started, 1);
    assert_eq!(first.backfills_completed, 1);
    assert_eq!(transport.call_count(), 1);

    // Day two still has no upstream data; later ticks must not pile up jobs
    for _ in 0..3 {
        let again = run_gap_analysis(&service, &[target], window).await;
        assert!(again.success);
        assert_eq!(again.targets_with_gaps, 1);
        assert_eq!(again.backfills_started, 0);
        assert_eq!(again.backfills_skipped, 1);
    }

    assert_eq!(progress.len(), 1);
    assert_eq!(transport.call_count(), 1);
    let job = progress.snapshot(1).unwrap();
    assert_eq!(job.status(), BackfillStatus::Completed);
    assert_eq!(job.no_data_chunks, 1);
}

#[tokio::test]
async fn test_gap_analysis_resumes_failed_backfill() {
    let failing = Arc::new(AtomicBool::new(true));
    let flag = failing.clone();
    let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let transport = ScriptedTransport::new(move |params| {
        let day_three = start + Duration::days(2);
        if flag.load(Ordering::SeqCst) && parse_period(&params["periodStart"]) == day_three {
            return Err(TransportError::Timeout { attempts: 3 });
        }
        Ok(hourly_load_response(params))
    });
    let points = InMemoryDataPointStore::new();
    let progress = InMemoryProgressStore::new();
    let service = gap_service(transport.clone(), points.clone(), progress.clone());

    let window = TimeRange::new(start, start + Duration::days(3));
    let target = DataTarget::new(Endpoint::ActualLoad, "CZ").unwrap();

    let first = run_gap_analysis(&service, &[target], window).await;
    assert!(!first.success);
    assert_eq!(first.backfills_started, 1);
    assert_eq!(first.backfills_failed, 1);
    assert_eq!(transport.call_count(), 3);

    failing.store(false, Ordering::SeqCst);
    let second = run_gap_analysis(&service, &[target], window).await;

    assert!(second.success, "{:?}", second.failure_reasons);
    assert_eq!(second.backfills_started, 0);
    assert_eq!(second.backfills_resumed, 1);
    assert_eq!(second.backfills_completed, 1);
    assert_eq!(progress.len(), 1);
    assert_eq!(progress.snapshot(1).unwrap().status(), BackfillStatus::Completed);

    // Only the failed day was fetched again
    let calls = transport.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[3]["periodStart"], "202402030000");
    assert_eq!(points.len(), 72);
}
