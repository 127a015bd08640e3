//! Shared fixtures for integration tests
//!
//! In-memory stores, a scripted in-process transport and an axum mock of the
//! upstream API bound to an ephemeral local port.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use entsoe_backend::models::backfill::{BackfillProgress, TimeRange};
use entsoe_backend::models::data_point::{DataType, NaturalKey, NormalizedDataPoint};
use entsoe_backend::services::entsoe::{EntsoeTransport, TransportError};
use entsoe_backend::services::storage::{DataPointStore, ProgressStore, StoreError};

pub const CZ_EIC: &str = "10YCZ-CEPS-----N";
pub const TOKEN: &str = "test-token";

fn interval_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%MZ").to_string()
}

/// GL document with one hourly series of `points` values starting at `start`
pub fn gl_document(zone: &str, start: DateTime<Utc>, points: usize) -> String {
    let end = start + Duration::hours(points as i64);
    let body: String = (1..=points)
        .map(|pos| {
            format!(
                "<Point><position>{}</position><quantity>{}</quantity></Point>",
                pos,
                6000 + pos
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<GL_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-6:generationloaddocument:3:0">
  <mRID>doc-{stamp}</mRID>
  <revisionNumber>1</revisionNumber>
  <type>A65</type>
  <process.processType>A16</process.processType>
  <sender_MarketParticipant.mRID codingScheme="A01">10X1001A1001A450</sender_MarketParticipant.mRID>
  <sender_MarketParticipant.marketRole.type>A32</sender_MarketParticipant.marketRole.type>
  <receiver_MarketParticipant.mRID codingScheme="A01">10X1001A1001A450</receiver_MarketParticipant.mRID>
  <receiver_MarketParticipant.marketRole.type>A33</receiver_MarketParticipant.marketRole.type>
  <createdDateTime>2024-06-01T10:15:33Z</createdDateTime>
  <time_Period.timeInterval>
    <start>{start}</start>
    <end>{end}</end>
  </time_Period.timeInterval>
  <TimeSeries>
    <mRID>1</mRID>
    <businessType>A04</businessType>
    <objectAggregation>A01</objectAggregation>
    <outBiddingZone_Domain.mRID codingScheme="A01">{zone}</outBiddingZone_Domain.mRID>
    <quantity_Measure_Unit.name>MAW</quantity_Measure_Unit.name>
    <curveType>A01</curveType>
    <Period>
      <timeInterval>
        <start>{start}</start>
        <end>{end}</end>
      </timeInterval>
      <resolution>PT60M</resolution>
      {body}
    </Period>
  </TimeSeries>
</GL_MarketDocument>"#,
        stamp = start.format("%Y%m%d%H%M"),
        start = interval_stamp(start),
        end = interval_stamp(end),
        zone = zone,
        body = body,
    )
}

pub fn acknowledgement(code: &str, text: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Acknowledgement_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-1:acknowledgementdocument:7:0">
  <mRID>ack-1</mRID>
  <createdDateTime>2024-06-01T10:15:33Z</createdDateTime>
  <sender_MarketParticipant.mRID codingScheme="A01">10X1001A1001A450</sender_MarketParticipant.mRID>
  <sender_MarketParticipant.marketRole.type>A32</sender_MarketParticipant.marketRole.type>
  <receiver_MarketParticipant.mRID codingScheme="A01">10X1001A1001A450</receiver_MarketParticipant.mRID>
  <receiver_MarketParticipant.marketRole.type>A39</receiver_MarketParticipant.marketRole.type>
  <received_MarketDocument.createdDateTime>2024-06-01T10:15:33Z</received_MarketDocument.createdDateTime>
  <Reason><code>{code}</code><text>{text}</text></Reason>
</Acknowledgement_MarketDocument>"#
    )
}

pub fn no_data_acknowledgement() -> String {
    acknowledgement("999", "No matching data found for Data item ACTUAL_TOTAL_LOAD_R3")
}

/// Parses a `YYYYMMDDHHMM` query value
pub fn parse_period(value: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M")
        .expect("period parameter")
        .and_utc()
}

pub type Params = HashMap<String, String>;

type Responder = dyn Fn(&Params) -> Result<String, TransportError> + Send + Sync;

/// In-process transport that answers from a closure and records every call
pub struct ScriptedTransport {
    responder: Box<Responder>,
    calls: Mutex<Vec<Params>>,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&Params) -> Result<String, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answers every load request with hourly data covering the requested period
    pub fn hourly_load() -> Arc<Self> {
        Self::new(|params| Ok(hourly_load_response(params)))
    }

    pub fn calls(&self) -> Vec<Params> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub fn hourly_load_response(params: &Params) -> String {
    let start = parse_period(&params["periodStart"]);
    let end = parse_period(&params["periodEnd"]);
    let zone = params
        .get("outBiddingZone_Domain")
        .map(String::as_str)
        .unwrap_or(CZ_EIC);
    gl_document(zone, start, (end - start).num_hours() as usize)
}

#[async_trait]
impl EntsoeTransport for ScriptedTransport {
    async fn get(&self, params: &[(&'static str, String)]) -> Result<String, TransportError> {
        let params: Params = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.calls.lock().unwrap().push(params.clone());
        (self.responder)(&params)
    }
}

#[derive(Default)]
pub struct InMemoryDataPointStore {
    points: Mutex<HashMap<NaturalKey, NormalizedDataPoint>>,
    fail_writes: AtomicBool,
}

impl InMemoryDataPointStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.points.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<NormalizedDataPoint> {
        let mut points: Vec<_> = self.points.lock().unwrap().values().cloned().collect();
        points.sort_by_key(|p| p.timestamp);
        points
    }

    pub fn insert(&self, points: Vec<NormalizedDataPoint>) {
        let mut stored = self.points.lock().unwrap();
        for point in points {
            stored.insert(point.natural_key(), point);
        }
    }
}

#[async_trait]
impl DataPointStore for InMemoryDataPointStore {
    async fn upsert_points(&self, points: &[NormalizedDataPoint]) -> Result<u64, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sea_orm::DbErr::Custom(
                "connection reset".to_string(),
            )));
        }
        self.insert(points.to_vec());
        Ok(points.len() as u64)
    }

    async fn covered_timestamps(
        &self,
        area_code: &str,
        data_type: DataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let mut stamps: Vec<_> = self
            .points
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.area_code == area_code && p.data_type == data_type)
            .filter(|p| p.timestamp >= start && p.timestamp < end)
            .map(|p| p.timestamp)
            .collect();
        stamps.sort_unstable();
        stamps.dedup();
        Ok(stamps)
    }
}

#[derive(Default)]
pub struct InMemoryProgressStore {
    records: Mutex<HashMap<i64, BackfillProgress>>,
    next_id: AtomicI64,
}

impl InMemoryProgressStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self, id: i64) -> Option<BackfillProgress> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Cancels the stored record directly, as the CLI would from another process
    pub fn cancel(&self, id: i64) {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).expect("backfill record");
        record.cancel(Utc::now()).expect("cancellable backfill");
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn create(&self, progress: &BackfillProgress) -> Result<BackfillProgress, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut created = progress.clone();
        created.id = id;
        self.records.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<BackfillProgress>, StoreError> {
        Ok(self.snapshot(id))
    }

    async fn update(&self, progress: &BackfillProgress) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&progress.id) {
            Some(record) if record.status().can_be_replaced_by(progress.status()) => {
                *record = progress.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound { id: progress.id }),
        }
    }

    async fn find_latest(
        &self,
        area_code: &str,
        endpoint_name: &str,
        period: TimeRange,
    ) -> Result<Option<BackfillProgress>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.area_code == area_code && r.endpoint_name == endpoint_name)
            .filter(|r| r.period() == period)
            .max_by_key(|r| r.id)
            .cloned())
    }
}

/// One canned HTTP response of the mock upstream
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<u64>,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }
}

#[derive(Default)]
struct MockState {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<Params>>,
}

/// axum server standing in for the transparency platform
pub struct MockUpstream {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        let state = Arc::new(MockState {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api", get(mock_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api", addr),
            state,
        }
    }

    pub fn requests(&self) -> Vec<Params> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

async fn mock_handler(
    State(state): State<Arc<MockState>>,
    Query(params): Query<Params>,
) -> Response {
    state.requests.lock().unwrap().push(params);

    let Some(next) = state.responses.lock().unwrap().pop_front() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no scripted response left").into_response();
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/xml"));
    if let Some(secs) = next.retry_after {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }

    let status = StatusCode::from_u16(next.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, headers, next.body).into_response()
}
