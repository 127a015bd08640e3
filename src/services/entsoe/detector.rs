//! Cheap document-type detection from the root element name
//!
//! Only the prolog and the first start tag are looked at, so detection cost
//! does not depend on body size.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use super::error::DocumentError;

lazy_static! {
    static ref ELEMENT_NAME: Regex = Regex::new(r"^[A-Za-z_][\w.\-]*(:[A-Za-z_][\w.\-]*)?").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    GlMarket,
    PublicationMarket,
    AcknowledgementMarket,
}

impl DocumentKind {
    pub fn root_element(&self) -> &'static str {
        match self {
            DocumentKind::GlMarket => "GL_MarketDocument",
            DocumentKind::PublicationMarket => "Publication_MarketDocument",
            DocumentKind::AcknowledgementMarket => "Acknowledgement_MarketDocument",
        }
    }

    pub fn from_root_element(name: &str) -> Option<Self> {
        match name {
            "GL_MarketDocument" => Some(DocumentKind::GlMarket),
            "Publication_MarketDocument" => Some(DocumentKind::PublicationMarket),
            "Acknowledgement_MarketDocument" => Some(DocumentKind::AcknowledgementMarket),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root_element())
    }
}

/// Local name of the first element, skipping BOM, declarations, comments,
/// processing instructions, CDATA and DOCTYPE
pub fn root_element_name(xml: &str) -> Option<&str> {
    let mut rest = xml.strip_prefix('\u{feff}').unwrap_or(xml);

    loop {
        rest = rest.trim_start();
        if !rest.starts_with('<') {
            return None;
        }

        if let Some(after) = rest.strip_prefix("<?") {
            rest = skip_past(after, "?>")?;
        } else if let Some(after) = rest.strip_prefix("<!--") {
            rest = skip_past(after, "-->")?;
        } else if let Some(after) = rest.strip_prefix("<![CDATA[") {
            rest = skip_past(after, "]]>")?;
        } else if rest.starts_with("<!") {
            rest = skip_doctype(&rest[2..])?;
        } else {
            let name = ELEMENT_NAME.find(&rest[1..])?.as_str();
            return Some(match name.split_once(':') {
                Some((_, local)) => local,
                None => name,
            });
        }
    }
}

fn skip_past<'a>(input: &'a str, terminator: &str) -> Option<&'a str> {
    input
        .find(terminator)
        .map(|idx| &input[idx + terminator.len()..])
}

// DOCTYPE may carry an internal subset in brackets
fn skip_doctype(input: &str) -> Option<&str> {
    let mut depth = 0usize;
    for (idx, ch) in input.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '>' if depth == 0 => return Some(&input[idx + 1..]),
            _ => {}
        }
    }
    None
}

pub fn detect_document_kind(xml: &str) -> Result<DocumentKind, DocumentError> {
    let name = root_element_name(xml).ok_or(DocumentError::NoRootElement)?;
    DocumentKind::from_root_element(name)
        .ok_or_else(|| DocumentError::UnsupportedDocumentType(name.to_string()))
}
