use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::detector::{DocumentKind, detect_document_kind};
use super::error::{
    ClientError, DocumentError, RequestContext, RequestValidationError, TransportError,
};
use super::parser::{
    acknowledgement_reason, parse_acknowledgement_document, parse_gl_document,
    parse_publication_document,
};
use super::request::{
    DataTarget, DomainParameters, Endpoint, EndpointFamily, EntsoeApiRequest, RequestBuilder,
};
use super::transport::{EntsoeTransport, HttpTransport, TransportConfig};
use crate::models::documents::{AcknowledgementReason, GlMarketDocument, PublicationMarketDocument};

/// Result of one fetch that reached the upstream
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Data(T),
    /// Acknowledgement with the no-data reason code
    NoData,
    /// Acknowledgement with any other reason code
    Rejected(AcknowledgementReason),
}

/// Parsed data document of either family
#[derive(Debug, Clone, PartialEq)]
pub enum MarketDocument {
    Load(GlMarketDocument),
    Publication(PublicationMarketDocument),
}

impl MarketDocument {
    pub fn mrid(&self) -> &str {
        match self {
            MarketDocument::Load(doc) => &doc.mrid,
            MarketDocument::Publication(doc) => &doc.mrid,
        }
    }

    pub fn time_series_count(&self) -> usize {
        match self {
            MarketDocument::Load(doc) => doc.time_series.len(),
            MarketDocument::Publication(doc) => doc.time_series.len(),
        }
    }
}

/// Build -> fetch -> detect -> parse
#[derive(Clone)]
pub struct EntsoeClient {
    transport: Arc<dyn EntsoeTransport>,
}

impl EntsoeClient {
    pub fn new(transport: Arc<dyn EntsoeTransport>) -> Self {
        Self { transport }
    }

    pub fn from_config(config: TransportConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub async fn execute(
        &self,
        request: &EntsoeApiRequest,
    ) -> Result<FetchOutcome<MarketDocument>, ClientError> {
        let context = request_context(request);

        tracing::debug!(
            endpoint = request.endpoint.name(),
            domains = %request.domains,
            period_start = %request.period_start,
            period_end = %request.period_end,
            "Fetching ENTSO-E document"
        );

        let body = self
            .transport
            .get(&request.query_params())
            .await
            .map_err(|source| ClientError::Transport {
                context: context.clone(),
                source,
            })?;

        self.interpret(request.endpoint.family(), &body)
            .map_err(|source| ClientError::Document { context, source })
    }

    fn interpret(
        &self,
        family: EndpointFamily,
        body: &str,
    ) -> Result<FetchOutcome<MarketDocument>, DocumentError> {
        let expected = match family {
            EndpointFamily::Load => DocumentKind::GlMarket,
            EndpointFamily::Market => DocumentKind::PublicationMarket,
        };

        match detect_document_kind(body)? {
            DocumentKind::AcknowledgementMarket => {
                let ack = parse_acknowledgement_document(body)?;
                let reason = acknowledgement_reason(&ack)?;
                if reason.is_no_data() {
                    tracing::debug!(%reason, "ENTSO-E reported no data");
                    Ok(FetchOutcome::NoData)
                } else {
                    tracing::warn!(%reason, "ENTSO-E rejected request");
                    Ok(FetchOutcome::Rejected(reason.clone()))
                }
            }
            found if found != expected => Err(DocumentError::UnexpectedDocument { expected, found }),
            DocumentKind::GlMarket => Ok(FetchOutcome::Data(MarketDocument::Load(
                parse_gl_document(body)?,
            ))),
            DocumentKind::PublicationMarket => Ok(FetchOutcome::Data(
                MarketDocument::Publication(parse_publication_document(body)?),
            )),
        }
    }

    /// Load-domain fetch for one bidding zone
    pub async fn fetch_load(
        &self,
        endpoint: Endpoint,
        bidding_zone: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchOutcome<GlMarketDocument>, ClientError> {
        let supplied = RequestContext {
            endpoint: endpoint.name(),
            domains: DomainParameters::OutBiddingZone(bidding_zone.to_string()).to_string(),
            period_start: start,
            period_end: end,
        };
        let request = validated(
            RequestBuilder::new(endpoint)
                .bidding_zone(bidding_zone)
                .period(start, end)
                .build(),
            supplied,
        )?;

        match self.execute(&request).await? {
            FetchOutcome::Data(MarketDocument::Load(doc)) => Ok(FetchOutcome::Data(doc)),
            FetchOutcome::Data(MarketDocument::Publication(_)) => Err(ClientError::Document {
                context: request_context(&request),
                source: DocumentError::UnexpectedDocument {
                    expected: DocumentKind::GlMarket,
                    found: DocumentKind::PublicationMarket,
                },
            }),
            FetchOutcome::NoData => Ok(FetchOutcome::NoData),
            FetchOutcome::Rejected(reason) => Ok(FetchOutcome::Rejected(reason)),
        }
    }

    /// Market-domain fetch with explicit in/out domains
    pub async fn fetch_market(
        &self,
        endpoint: Endpoint,
        in_domain: &str,
        out_domain: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchOutcome<PublicationMarketDocument>, ClientError> {
        let supplied = RequestContext {
            endpoint: endpoint.name(),
            domains: DomainParameters::InOut {
                in_domain: in_domain.to_string(),
                out_domain: out_domain.to_string(),
            }
            .to_string(),
            period_start: start,
            period_end: end,
        };
        let request = validated(
            RequestBuilder::new(endpoint)
                .in_domain(in_domain)
                .out_domain(out_domain)
                .period(start, end)
                .build(),
            supplied,
        )?;

        match self.execute(&request).await? {
            FetchOutcome::Data(MarketDocument::Publication(doc)) => Ok(FetchOutcome::Data(doc)),
            FetchOutcome::Data(MarketDocument::Load(_)) => Err(ClientError::Document {
                context: request_context(&request),
                source: DocumentError::UnexpectedDocument {
                    expected: DocumentKind::PublicationMarket,
                    found: DocumentKind::GlMarket,
                },
            }),
            FetchOutcome::NoData => Ok(FetchOutcome::NoData),
            FetchOutcome::Rejected(reason) => Ok(FetchOutcome::Rejected(reason)),
        }
    }

    pub async fn fetch_target(
        &self,
        target: &DataTarget,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchOutcome<MarketDocument>, ClientError> {
        let supplied = RequestContext {
            endpoint: target.endpoint.name(),
            domains: target.domains().to_string(),
            period_start: start,
            period_end: end,
        };
        let request = validated(target.build_request(start, end), supplied)?;
        self.execute(&request).await
    }
}

fn validated(
    built: Result<EntsoeApiRequest, RequestValidationError>,
    supplied: RequestContext,
) -> Result<EntsoeApiRequest, ClientError> {
    built.map_err(|source| ClientError::Validation {
        context: supplied,
        source,
    })
}

fn request_context(request: &EntsoeApiRequest) -> RequestContext {
    RequestContext {
        endpoint: request.endpoint.name(),
        domains: request.domains.to_string(),
        period_start: request.period_start,
        period_end: request.period_end,
    }
}
