//! ENTSO-E transparency platform protocol layer
//!
//! Request construction, retrying transport, document detection and parsing,
//! and the client that ties them together.

pub mod client;
pub mod detector;
pub mod error;
pub mod parser;
pub mod request;
pub mod transport;

pub use client::{EntsoeClient, FetchOutcome, MarketDocument};
pub use detector::{DocumentKind, detect_document_kind};
pub use error::{ClientError, DocumentError, RequestContext, RequestValidationError, TransportError};
pub use request::{DataTarget, Endpoint, EndpointFamily, EntsoeApiRequest, RequestBuilder};
pub use transport::{EntsoeTransport, HttpTransport, RetryPolicy, TransportConfig};
