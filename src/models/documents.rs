//! Typed ENTSO-E XML documents
//!
//! Field names follow the wire element names through serde renames, so the same
//! structs parse and serialize (`@` marks an attribute, `$text` element text).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::codes::{BusinessType, CurveType, DocumentType, MarketRoleType, ProcessType};

/// Reason code an acknowledgement uses for "no matching data"
pub const NO_DATA_REASON_CODE: &str = "999";

/// Identifier element with a coding scheme attribute, e.g.
/// `<in_Domain.mRID codingScheme="A01">10YCZ-CEPS-----N</in_Domain.mRID>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedId {
    #[serde(rename = "@codingScheme", default, skip_serializing_if = "Option::is_none")]
    pub coding_scheme: Option<String>,
    #[serde(rename = "$text")]
    pub value: String,
}

impl CodedId {
    pub fn eic(value: impl Into<String>) -> Self {
        Self {
            coding_scheme: Some("A01".to_string()),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    #[serde(with = "xml_datetime::minutes")]
    pub start: DateTime<Utc>,
    #[serde(with = "xml_datetime::minutes")]
    pub end: DateTime<Utc>,
}

/// One value sample; `quantity` for load and flows, `price.amount` for prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub position: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub quantity: Option<Decimal>,
    #[serde(
        rename = "price.amount",
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub price_amount: Option<Decimal>,
}

impl Point {
    pub fn value(&self) -> Option<Decimal> {
        self.quantity.or(self.price_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    #[serde(rename = "timeInterval")]
    pub time_interval: TimeInterval,
    /// ISO-8601 duration, e.g. `PT15M`, `P1D`
    pub resolution: String,
    #[serde(rename = "Point", default)]
    pub points: Vec<Point>,
}

/// Load-domain document (actual load, load forecasts, forecast margin)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlMarketDocument {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "revisionNumber")]
    pub revision_number: u32,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    #[serde(rename = "process.processType")]
    pub process_type: ProcessType,
    #[serde(rename = "sender_MarketParticipant.mRID")]
    pub sender: CodedId,
    #[serde(rename = "sender_MarketParticipant.marketRole.type")]
    pub sender_role: MarketRoleType,
    #[serde(rename = "receiver_MarketParticipant.mRID")]
    pub receiver: CodedId,
    #[serde(rename = "receiver_MarketParticipant.marketRole.type")]
    pub receiver_role: MarketRoleType,
    #[serde(rename = "createdDateTime", with = "xml_datetime::seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "time_Period.timeInterval")]
    pub time_period: TimeInterval,
    #[serde(rename = "TimeSeries", default)]
    pub time_series: Vec<GlTimeSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlTimeSeries {
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "businessType")]
    pub business_type: BusinessType,
    #[serde(rename = "objectAggregation", default, skip_serializing_if = "Option::is_none")]
    pub object_aggregation: Option<String>,
    #[serde(rename = "outBiddingZone_Domain.mRID")]
    pub out_bidding_zone: CodedId,
    #[serde(rename = "quantity_Measure_Unit.name")]
    pub quantity_unit: String,
    #[serde(rename = "curveType")]
    pub curve_type: CurveType,
    #[serde(rename = "Period", default)]
    pub periods: Vec<Period>,
}

/// Market-domain document (day-ahead prices, physical flows)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationMarketDocument {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "revisionNumber")]
    pub revision_number: u32,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    #[serde(rename = "process.processType", default, skip_serializing_if = "Option::is_none")]
    pub process_type: Option<ProcessType>,
    #[serde(rename = "sender_MarketParticipant.mRID")]
    pub sender: CodedId,
    #[serde(rename = "sender_MarketParticipant.marketRole.type")]
    pub sender_role: MarketRoleType,
    #[serde(rename = "receiver_MarketParticipant.mRID")]
    pub receiver: CodedId,
    #[serde(rename = "receiver_MarketParticipant.marketRole.type")]
    pub receiver_role: MarketRoleType,
    #[serde(rename = "createdDateTime", with = "xml_datetime::seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "period.timeInterval")]
    pub time_period: TimeInterval,
    #[serde(rename = "TimeSeries", default)]
    pub time_series: Vec<PublicationTimeSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationTimeSeries {
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "auction.type", default, skip_serializing_if = "Option::is_none")]
    pub auction_type: Option<String>,
    #[serde(rename = "businessType")]
    pub business_type: BusinessType,
    #[serde(rename = "in_Domain.mRID")]
    pub in_domain: CodedId,
    #[serde(rename = "out_Domain.mRID")]
    pub out_domain: CodedId,
    #[serde(rename = "contract_MarketAgreement.type", default, skip_serializing_if = "Option::is_none")]
    pub contract_type: Option<String>,
    #[serde(rename = "currency_Unit.name", default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(rename = "price_Measure_Unit.name", default, skip_serializing_if = "Option::is_none")]
    pub price_unit: Option<String>,
    #[serde(rename = "quantity_Measure_Unit.name", default, skip_serializing_if = "Option::is_none")]
    pub quantity_unit: Option<String>,
    #[serde(rename = "curveType")]
    pub curve_type: CurveType,
    #[serde(rename = "Period", default)]
    pub periods: Vec<Period>,
}

impl PublicationTimeSeries {
    /// Unit label for the series values: `EUR/MWH` for prices, `MAW` for flows
    pub fn unit(&self) -> String {
        match (&self.currency, &self.price_unit, &self.quantity_unit) {
            (Some(currency), Some(per), _) => format!("{}/{}", currency, per),
            (Some(currency), None, _) => currency.clone(),
            (None, _, Some(quantity)) => quantity.clone(),
            (None, Some(per), None) => per.clone(),
            (None, None, None) => String::new(),
        }
    }
}

/// Response shape used instead of a data document for "no data" and errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcknowledgementMarketDocument {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "createdDateTime", with = "xml_datetime::seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "sender_MarketParticipant.mRID")]
    pub sender: CodedId,
    #[serde(rename = "sender_MarketParticipant.marketRole.type")]
    pub sender_role: MarketRoleType,
    #[serde(rename = "receiver_MarketParticipant.mRID")]
    pub receiver: CodedId,
    #[serde(rename = "receiver_MarketParticipant.marketRole.type")]
    pub receiver_role: MarketRoleType,
    #[serde(
        rename = "received_MarketDocument.createdDateTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub received_document_created_at: Option<String>,
    #[serde(rename = "Reason", default)]
    pub reasons: Vec<AcknowledgementReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgementReason {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl AcknowledgementReason {
    pub fn is_no_data(&self) -> bool {
        self.code.trim() == NO_DATA_REASON_CODE
    }

    pub fn is_error(&self) -> bool {
        !self.is_no_data()
    }
}

impl std::fmt::Display for AcknowledgementReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.text {
            Some(text) => write!(f, "reason {}: {}", self.code, text),
            None => write!(f, "reason {}", self.code),
        }
    }
}

/// Timestamp formats used on the wire
///
/// Interval bounds carry minute precision (`2024-01-01T23:00Z`), creation
/// stamps carry seconds. Both parsers accept either form.
pub(crate) mod xml_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const MINUTES: &str = "%Y-%m-%dT%H:%MZ";
    const SECONDS: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(value, MINUTES).map(|naive| naive.and_utc())
    }

    fn deserialize_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{}': {}", raw, e)))
    }

    pub mod minutes {
        use super::*;

        pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&dt.format(MINUTES).to_string())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
            deserialize_any(deserializer)
        }
    }

    pub mod seconds {
        use super::*;

        pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&dt.format(SECONDS).to_string())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
            deserialize_any(deserializer)
        }
    }
}
