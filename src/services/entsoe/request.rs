//! Typed ENTSO-E request construction
//!
//! Every logical endpoint maps to a fixed `(documentType, processType |
//! businessType)` pair. Validation runs here, before any network call.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

use super::error::RequestValidationError;
use crate::models::area::AreaCode;
use crate::models::codes::{AreaType, BusinessType, DocumentType, ProcessType};
use crate::models::data_point::DataType;

const QUARTER_HOUR_SECS: i64 = 15 * 60;

/// Which parser family an endpoint's data document belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointFamily {
    /// `GL_MarketDocument`, one bidding zone
    Load,
    /// `Publication_MarketDocument`, in/out domains
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ActualLoad,
    DayAheadLoadForecast,
    WeekAheadLoadForecast,
    MonthAheadLoadForecast,
    YearAheadLoadForecast,
    YearAheadForecastMargin,
    DayAheadPrices,
    PhysicalFlows,
}

/// Second half of the endpoint's fixed parameter pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeParameter {
    Process(ProcessType),
    Business(BusinessType),
}

impl Endpoint {
    pub const ALL: [Endpoint; 8] = [
        Endpoint::ActualLoad,
        Endpoint::DayAheadLoadForecast,
        Endpoint::WeekAheadLoadForecast,
        Endpoint::MonthAheadLoadForecast,
        Endpoint::YearAheadLoadForecast,
        Endpoint::YearAheadForecastMargin,
        Endpoint::DayAheadPrices,
        Endpoint::PhysicalFlows,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::ActualLoad => "actual_load",
            Endpoint::DayAheadLoadForecast => "day_ahead_load_forecast",
            Endpoint::WeekAheadLoadForecast => "week_ahead_load_forecast",
            Endpoint::MonthAheadLoadForecast => "month_ahead_load_forecast",
            Endpoint::YearAheadLoadForecast => "year_ahead_load_forecast",
            Endpoint::YearAheadForecastMargin => "year_ahead_forecast_margin",
            Endpoint::DayAheadPrices => "day_ahead_prices",
            Endpoint::PhysicalFlows => "physical_flows",
        }
    }

    pub fn family(&self) -> EndpointFamily {
        match self {
            Endpoint::DayAheadPrices | Endpoint::PhysicalFlows => EndpointFamily::Market,
            _ => EndpointFamily::Load,
        }
    }

    pub fn document_type(&self) -> DocumentType {
        match self {
            Endpoint::YearAheadForecastMargin => DocumentType::LoadForecastMargin,
            Endpoint::DayAheadPrices => DocumentType::PriceDocument,
            Endpoint::PhysicalFlows => DocumentType::AggregatedEnergyDataReport,
            _ => DocumentType::SystemTotalLoad,
        }
    }

    pub fn type_parameter(&self) -> TypeParameter {
        match self {
            Endpoint::ActualLoad => TypeParameter::Process(ProcessType::Realised),
            Endpoint::DayAheadLoadForecast => TypeParameter::Process(ProcessType::DayAhead),
            Endpoint::WeekAheadLoadForecast => TypeParameter::Process(ProcessType::WeekAhead),
            Endpoint::MonthAheadLoadForecast => TypeParameter::Process(ProcessType::MonthAhead),
            Endpoint::YearAheadLoadForecast | Endpoint::YearAheadForecastMargin => {
                TypeParameter::Process(ProcessType::YearAhead)
            }
            Endpoint::DayAheadPrices => TypeParameter::Business(BusinessType::SpotPrice),
            Endpoint::PhysicalFlows => TypeParameter::Business(BusinessType::EnergyFlow),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Endpoint::ActualLoad => DataType::ActualLoad,
            Endpoint::DayAheadLoadForecast => DataType::DayAheadLoadForecast,
            Endpoint::WeekAheadLoadForecast => DataType::WeekAheadLoadForecast,
            Endpoint::MonthAheadLoadForecast => DataType::MonthAheadLoadForecast,
            Endpoint::YearAheadLoadForecast => DataType::YearAheadLoadForecast,
            Endpoint::YearAheadForecastMargin => DataType::YearAheadForecastMargin,
            Endpoint::DayAheadPrices => DataType::DayAheadPrice,
            Endpoint::PhysicalFlows => DataType::PhysicalFlow,
        }
    }

    /// Coarsest resolution the platform publishes for this endpoint; one stored
    /// point is taken to cover this much time during gap detection
    pub fn nominal_resolution(&self) -> Duration {
        match self {
            Endpoint::WeekAheadLoadForecast => Duration::days(1),
            Endpoint::MonthAheadLoadForecast | Endpoint::YearAheadLoadForecast => {
                Duration::days(7)
            }
            Endpoint::YearAheadForecastMargin => Duration::days(365),
            _ => Duration::hours(1),
        }
    }

    /// Chunk length for backfills, sized to keep responses small
    pub fn default_chunk_days(&self) -> i64 {
        match self {
            Endpoint::ActualLoad
            | Endpoint::DayAheadLoadForecast
            | Endpoint::DayAheadPrices
            | Endpoint::PhysicalFlows => 30,
            Endpoint::WeekAheadLoadForecast | Endpoint::MonthAheadLoadForecast => 90,
            Endpoint::YearAheadLoadForecast | Endpoint::YearAheadForecastMargin => 365,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = RequestValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Endpoint::ALL
            .iter()
            .copied()
            .find(|e| e.name() == wanted)
            .ok_or_else(|| RequestValidationError::UnknownEndpoint(wanted.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainParameters {
    OutBiddingZone(String),
    InOut { in_domain: String, out_domain: String },
}

impl fmt::Display for DomainParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainParameters::OutBiddingZone(zone) => write!(f, "outBiddingZone_Domain={}", zone),
            DomainParameters::InOut {
                in_domain,
                out_domain,
            } => write!(f, "in_Domain={}, out_Domain={}", in_domain, out_domain),
        }
    }
}

/// Validated, immutable API request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntsoeApiRequest {
    pub endpoint: Endpoint,
    pub document_type: DocumentType,
    pub type_parameter: TypeParameter,
    pub domains: DomainParameters,
    /// Rounded down to a quarter hour
    pub period_start: DateTime<Utc>,
    /// Rounded up to a quarter hour
    pub period_end: DateTime<Utc>,
    pub offset: Option<u32>,
}

impl EntsoeApiRequest {
    /// Query parameters, without the security token
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("documentType", self.document_type.code().to_string())];

        match self.type_parameter {
            TypeParameter::Process(p) => params.push(("processType", p.code().to_string())),
            TypeParameter::Business(b) => params.push(("businessType", b.code().to_string())),
        }

        match &self.domains {
            DomainParameters::OutBiddingZone(zone) => {
                params.push(("outBiddingZone_Domain", zone.clone()));
            }
            DomainParameters::InOut {
                in_domain,
                out_domain,
            } => {
                params.push(("in_Domain", in_domain.clone()));
                params.push(("out_Domain", out_domain.clone()));
            }
        }

        params.push(("periodStart", format_period(self.period_start)));
        params.push(("periodEnd", format_period(self.period_end)));

        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }

        params
    }
}

/// `YYYYMMDDHHMM` in UTC
pub fn format_period(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H%M").to_string()
}

pub fn floor_to_quarter_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    let secs = dt.timestamp();
    let floored = secs - secs.rem_euclid(QUARTER_HOUR_SECS);
    Utc.timestamp_opt(floored, 0).single().unwrap_or(dt)
}

pub fn ceil_to_quarter_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    let floored = floor_to_quarter_hour(dt);
    if floored == dt {
        floored
    } else {
        floored + Duration::seconds(QUARTER_HOUR_SECS)
    }
}

/// Collects request inputs; `build` validates and aligns them
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: Endpoint,
    bidding_zone: Option<String>,
    in_domain: Option<String>,
    out_domain: Option<String>,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
    offset: Option<u32>,
}

impl RequestBuilder {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            bidding_zone: None,
            in_domain: None,
            out_domain: None,
            period_start: None,
            period_end: None,
            offset: None,
        }
    }

    /// EIC or short code of the zone for load endpoints
    pub fn bidding_zone(mut self, zone: impl Into<String>) -> Self {
        self.bidding_zone = Some(zone.into());
        self
    }

    pub fn in_domain(mut self, domain: impl Into<String>) -> Self {
        self.in_domain = Some(domain.into());
        self
    }

    pub fn out_domain(mut self, domain: impl Into<String>) -> Self {
        self.out_domain = Some(domain.into());
        self
    }

    pub fn period(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.period_start = Some(start);
        self.period_end = Some(end);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn build(self) -> Result<EntsoeApiRequest, RequestValidationError> {
        let endpoint = self.endpoint.name();

        let start = self.period_start.ok_or(RequestValidationError::MissingField {
            endpoint,
            field: "periodStart",
        })?;
        let end = self.period_end.ok_or(RequestValidationError::MissingField {
            endpoint,
            field: "periodEnd",
        })?;
        let (period_start, period_end) = validate_period(endpoint, start, end)?;

        let domains = match self.endpoint.family() {
            EndpointFamily::Load => self.load_domains()?,
            EndpointFamily::Market => self.market_domains()?,
        };

        Ok(EntsoeApiRequest {
            endpoint: self.endpoint,
            document_type: self.endpoint.document_type(),
            type_parameter: self.endpoint.type_parameter(),
            domains,
            period_start,
            period_end,
            offset: self.offset,
        })
    }

    fn load_domains(&self) -> Result<DomainParameters, RequestValidationError> {
        let endpoint = self.endpoint.name();

        if self.in_domain.is_some() {
            return Err(RequestValidationError::UnsupportedParameter {
                endpoint,
                field: "in_Domain",
            });
        }
        if self.out_domain.is_some() {
            return Err(RequestValidationError::UnsupportedParameter {
                endpoint,
                field: "out_Domain",
            });
        }

        let zone = self
            .bidding_zone
            .as_deref()
            .ok_or(RequestValidationError::MissingField {
                endpoint,
                field: "outBiddingZone_Domain",
            })?;
        let area = resolve_area(endpoint, zone)?;

        if !area.has_area_type(AreaType::BiddingZone) {
            return Err(RequestValidationError::InvalidAreaType {
                endpoint,
                code: area.code.to_string(),
                required: AreaType::BiddingZone,
            });
        }

        Ok(DomainParameters::OutBiddingZone(area.code.to_string()))
    }

    fn market_domains(&self) -> Result<DomainParameters, RequestValidationError> {
        let endpoint = self.endpoint.name();

        if self.bidding_zone.is_some() {
            return Err(RequestValidationError::UnsupportedParameter {
                endpoint,
                field: "outBiddingZone_Domain",
            });
        }

        let in_code = self
            .in_domain
            .as_deref()
            .ok_or(RequestValidationError::MissingField {
                endpoint,
                field: "in_Domain",
            })?;
        let out_code = self
            .out_domain
            .as_deref()
            .ok_or(RequestValidationError::MissingField {
                endpoint,
                field: "out_Domain",
            })?;

        let in_area = resolve_area(endpoint, in_code)?;
        let out_area = resolve_area(endpoint, out_code)?;

        match self.endpoint {
            Endpoint::DayAheadPrices if in_area.code != out_area.code => {
                return Err(RequestValidationError::DomainsMustMatch {
                    endpoint,
                    in_domain: in_area.code.to_string(),
                    out_domain: out_area.code.to_string(),
                });
            }
            Endpoint::PhysicalFlows if in_area.code == out_area.code => {
                return Err(RequestValidationError::DomainsMustDiffer {
                    endpoint,
                    domain: in_area.code.to_string(),
                });
            }
            _ => {}
        }

        Ok(DomainParameters::InOut {
            in_domain: in_area.code.to_string(),
            out_domain: out_area.code.to_string(),
        })
    }
}

fn resolve_area(endpoint: &'static str, code: &str) -> Result<&'static AreaCode, RequestValidationError> {
    AreaCode::lookup(code).ok_or_else(|| RequestValidationError::UnknownArea {
        endpoint,
        code: code.to_string(),
    })
}

/// Aligns the bounds to quarter hours; the one-year limit applies to the
/// aligned period that is actually sent
fn validate_period(
    endpoint: &'static str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), RequestValidationError> {
    if start >= end {
        return Err(RequestValidationError::InvalidPeriod {
            endpoint,
            start,
            end,
        });
    }

    let start = floor_to_quarter_hour(start);
    let end = ceil_to_quarter_hour(end);

    let one_year_later = start
        .checked_add_months(Months::new(12))
        .ok_or(RequestValidationError::PeriodTooLong {
            endpoint,
            start,
            end,
        })?;
    if end > one_year_later {
        return Err(RequestValidationError::PeriodTooLong {
            endpoint,
            start,
            end,
        });
    }

    Ok((start, end))
}

/// One (endpoint, area) pair that collection and backfill operate on
///
/// The area key is the short code (`"CZ"`); physical flows use
/// `"<from>-><to>"`, where `from` is the out_Domain and `to` the in_Domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataTarget {
    pub endpoint: Endpoint,
    pub area: &'static AreaCode,
    pub counterpart: Option<&'static AreaCode>,
}

impl DataTarget {
    pub fn new(endpoint: Endpoint, area_key: &str) -> Result<Self, RequestValidationError> {
        let name = endpoint.name();

        let (area, counterpart) = match area_key.split_once("->") {
            Some((from, to)) => (
                resolve_area(name, from)?,
                Some(resolve_area(name, to)?),
            ),
            None => (resolve_area(name, area_key)?, None),
        };

        match (endpoint, counterpart) {
            (Endpoint::PhysicalFlows, None) => Err(RequestValidationError::MissingField {
                endpoint: name,
                field: "in_Domain",
            }),
            (Endpoint::PhysicalFlows, Some(_)) => Ok(Self {
                endpoint,
                area,
                counterpart,
            }),
            (_, Some(_)) => Err(RequestValidationError::UnsupportedParameter {
                endpoint: name,
                field: "in_Domain",
            }),
            (_, None) => Ok(Self {
                endpoint,
                area,
                counterpart: None,
            }),
        }
    }

    pub fn area_key(&self) -> String {
        match self.counterpart {
            Some(to) => format!("{}->{}", self.area.short_code(), to.short_code()),
            None => self.area.short_code().to_string(),
        }
    }

    /// Domain parameters this target sends
    pub fn domains(&self) -> DomainParameters {
        match (self.endpoint, self.counterpart) {
            (Endpoint::DayAheadPrices, _) => DomainParameters::InOut {
                in_domain: self.area.code.to_string(),
                out_domain: self.area.code.to_string(),
            },
            (Endpoint::PhysicalFlows, Some(to)) => DomainParameters::InOut {
                in_domain: to.code.to_string(),
                out_domain: self.area.code.to_string(),
            },
            _ => DomainParameters::OutBiddingZone(self.area.code.to_string()),
        }
    }

    pub fn build_request(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<EntsoeApiRequest, RequestValidationError> {
        let builder = RequestBuilder::new(self.endpoint).period(start, end);

        let builder = match self.domains() {
            DomainParameters::InOut {
                in_domain,
                out_domain,
            } => builder.in_domain(in_domain).out_domain(out_domain),
            DomainParameters::OutBiddingZone(zone) => builder.bidding_zone(zone),
        };

        builder.build()
    }
}

impl fmt::Display for DataTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.endpoint, self.area_key())
    }
}
