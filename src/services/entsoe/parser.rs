//! XML <-> typed document mapping for the three response shapes

use lazy_static::lazy_static;
use quick_xml::de::from_str;
use quick_xml::se::to_string_with_root;
use regex::Regex;

use super::detector::DocumentKind;
use super::error::DocumentError;
use crate::models::documents::{
    AcknowledgementMarketDocument, AcknowledgementReason, GlMarketDocument,
    PublicationMarketDocument,
};

lazy_static! {
    // First default namespace declaration, i.e. the one on the root element
    static ref DEFAULT_NAMESPACE: Regex = Regex::new(r#"\sxmlns\s*=\s*"([^"]*)""#).unwrap();
}

const GL: &str = "GL_MarketDocument";
const PUBLICATION: &str = "Publication_MarketDocument";
const ACKNOWLEDGEMENT: &str = "Acknowledgement_MarketDocument";

pub fn parse_gl_document(xml: &str) -> Result<GlMarketDocument, DocumentError> {
    let doc: GlMarketDocument = from_str(xml).map_err(|source| DocumentError::Malformed {
        document: GL,
        source,
    })?;

    if doc.time_series.iter().any(|ts| ts.periods.is_empty()) {
        return Err(DocumentError::MissingElement {
            document: GL,
            element: "Period",
        });
    }

    Ok(doc)
}

/// Parses a price/flow document
///
/// The default namespace differs between schema revisions (7:0, 7:3), so it is
/// removed before structural parsing and put back on the result.
pub fn parse_publication_document(xml: &str) -> Result<PublicationMarketDocument, DocumentError> {
    let (stripped, namespace) = strip_default_namespace(xml);

    let mut doc: PublicationMarketDocument =
        from_str(&stripped).map_err(|source| DocumentError::Malformed {
            document: PUBLICATION,
            source,
        })?;

    if doc.time_series.iter().any(|ts| ts.periods.is_empty()) {
        return Err(DocumentError::MissingElement {
            document: PUBLICATION,
            element: "Period",
        });
    }

    doc.namespace = namespace;
    Ok(doc)
}

pub fn parse_acknowledgement_document(
    xml: &str,
) -> Result<AcknowledgementMarketDocument, DocumentError> {
    let doc: AcknowledgementMarketDocument =
        from_str(xml).map_err(|source| DocumentError::Malformed {
            document: ACKNOWLEDGEMENT,
            source,
        })?;

    if doc.reasons.len() != 1 {
        return Err(DocumentError::InvalidReasonCount {
            document: ACKNOWLEDGEMENT,
            found: doc.reasons.len(),
        });
    }

    Ok(doc)
}

/// Single reason of an acknowledgement, already validated by the parser
pub fn acknowledgement_reason(doc: &AcknowledgementMarketDocument) -> Result<&AcknowledgementReason, DocumentError> {
    match doc.reasons.as_slice() {
        [reason] => Ok(reason),
        other => Err(DocumentError::InvalidReasonCount {
            document: ACKNOWLEDGEMENT,
            found: other.len(),
        }),
    }
}

pub fn serialize_gl_document(doc: &GlMarketDocument) -> Result<String, DocumentError> {
    to_string_with_root(DocumentKind::GlMarket.root_element(), doc).map_err(|source| {
        DocumentError::Serialization {
            document: GL,
            source,
        }
    })
}

pub fn serialize_publication_document(
    doc: &PublicationMarketDocument,
) -> Result<String, DocumentError> {
    to_string_with_root(DocumentKind::PublicationMarket.root_element(), doc).map_err(|source| {
        DocumentError::Serialization {
            document: PUBLICATION,
            source,
        }
    })
}

pub fn serialize_acknowledgement_document(
    doc: &AcknowledgementMarketDocument,
) -> Result<String, DocumentError> {
    to_string_with_root(DocumentKind::AcknowledgementMarket.root_element(), doc).map_err(
        |source| DocumentError::Serialization {
            document: ACKNOWLEDGEMENT,
            source,
        },
    )
}

fn strip_default_namespace(xml: &str) -> (std::borrow::Cow<'_, str>, Option<String>) {
    match DEFAULT_NAMESPACE.captures(xml) {
        Some(caps) => {
            let namespace = caps.get(1).map(|m| m.as_str().to_string());
            (DEFAULT_NAMESPACE.replace(xml, ""), namespace)
        }
        None => (std::borrow::Cow::Borrowed(xml), None),
    }
}
