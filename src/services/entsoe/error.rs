//! Error types for the ENTSO-E protocol layer

use chrono::{DateTime, Utc};
use std::fmt;

use super::detector::DocumentKind;
use crate::models::codes::AreaType;

/// Raised by the request builder before any network call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestValidationError {
    #[error("{endpoint}: missing required field '{field}'")]
    MissingField {
        endpoint: &'static str,
        field: &'static str,
    },

    #[error("{endpoint}: parameter '{field}' is not valid for this endpoint")]
    UnsupportedParameter {
        endpoint: &'static str,
        field: &'static str,
    },

    #[error("{endpoint}: unknown area code '{code}'")]
    UnknownArea { endpoint: &'static str, code: String },

    #[error("{endpoint}: area '{code}' is not of required type {required}")]
    InvalidAreaType {
        endpoint: &'static str,
        code: String,
        required: AreaType,
    },

    #[error("{endpoint}: in_Domain '{in_domain}' must equal out_Domain '{out_domain}'")]
    DomainsMustMatch {
        endpoint: &'static str,
        in_domain: String,
        out_domain: String,
    },

    #[error("{endpoint}: in_Domain and out_Domain must differ (both '{domain}')")]
    DomainsMustDiffer {
        endpoint: &'static str,
        domain: String,
    },

    #[error("{endpoint}: period start {start} must be before end {end}")]
    InvalidPeriod {
        endpoint: &'static str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("{endpoint}: period {start} .. {end} exceeds one year")]
    PeriodTooLong {
        endpoint: &'static str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),
}

/// HTTP failures, classified by retryability
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("connection failed after {attempts} attempt(s): {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("rate limited after {attempts} attempt(s) (retry-after: {retry_after_secs:?}s)")]
    RateLimited {
        attempts: u32,
        retry_after_secs: Option<u64>,
    },

    #[error("server error {status} after {attempts} attempt(s): {body}")]
    Server {
        attempts: u32,
        status: u16,
        body: String,
    },

    #[error("authentication rejected with status {status}")]
    Authentication { status: u16 },

    #[error("requested data is not available (404)")]
    NotFound,

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    /// True for the failures the retry loop waits out
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. }
                | TransportError::Connection { .. }
                | TransportError::RateLimited { .. }
                | TransportError::Server { .. }
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::RateLimited { .. } => Some(429),
            TransportError::Server { status, .. }
            | TransportError::Authentication { status }
            | TransportError::UnexpectedStatus { status, .. } => Some(*status),
            TransportError::NotFound => Some(404),
            _ => None,
        }
    }
}

/// Detection, parsing and serialization failures
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("no XML root element found")]
    NoRootElement,

    #[error("unsupported document type '{0}'")]
    UnsupportedDocumentType(String),

    #[error("malformed {document}: {source}")]
    Malformed {
        document: &'static str,
        #[source]
        source: quick_xml::DeError,
    },

    #[error("failed to serialize {document}: {source}")]
    Serialization {
        document: &'static str,
        #[source]
        source: quick_xml::DeError,
    },

    #[error("{document}: missing required element '{element}'")]
    MissingElement {
        document: &'static str,
        element: &'static str,
    },

    #[error("{document}: expected exactly one Reason, found {found}")]
    InvalidReasonCount { document: &'static str, found: usize },

    #[error("expected {expected} for this endpoint, received {found}")]
    UnexpectedDocument {
        expected: DocumentKind,
        found: DocumentKind,
    },
}

/// Parameters of the failed call, carried on every client error
///
/// For validation failures these are the inputs as supplied, before any
/// area resolution or quarter-hour alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub endpoint: &'static str,
    pub domains: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entsoe {} [{}] {} .. {}",
            self.endpoint,
            self.domains,
            self.period_start.format("%Y%m%d%H%M"),
            self.period_end.format("%Y%m%d%H%M")
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{context}: {source}")]
    Validation {
        context: RequestContext,
        #[source]
        source: RequestValidationError,
    },

    #[error("{context}: {source}")]
    Transport {
        context: RequestContext,
        #[source]
        source: TransportError,
    },

    #[error("{context}: {source}")]
    Document {
        context: RequestContext,
        #[source]
        source: DocumentError,
    },
}

impl ClientError {
    pub fn context(&self) -> &RequestContext {
        match self {
            ClientError::Validation { context, .. }
            | ClientError::Transport { context, .. }
            | ClientError::Document { context, .. } => context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::Timeout { attempts: 3 }.is_retryable());
        assert!(
            TransportError::RateLimited {
                attempts: 1,
                retry_after_secs: Some(5)
            }
            .is_retryable()
        );
        assert!(
            TransportError::Server {
                attempts: 1,
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!TransportError::Authentication { status: 401 }.is_retryable());
        assert!(!TransportError::NotFound.is_retryable());
    }

    #[test]
    fn test_validation_error_names_constraint() {
        let err = RequestValidationError::DomainsMustDiffer {
            endpoint: "physical_flows",
            domain: "10YCZ-CEPS-----N".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("physical_flows"));
        assert!(message.contains("must differ"));
    }
}
