//! Text extraction boundary.
//!
//! PDF parsing itself is an external collaborator; this module only defines
//! the interface the ingestion pipeline consumes. Implementations must not
//! require network access.

use crate::error::Result;

/// Per-page text extracted from one uploaded document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Page texts in document order. Blank entries are legitimate (e.g.
    /// scanned pages) and surface as warnings, not errors.
    pub pages: Vec<String>,
    /// Per-page warnings produced by the extractor.
    pub warnings: Vec<String>,
}

/// Extracts per-page text from raw document bytes.
///
/// A document that cannot be parsed at all is an [`Extraction`]
/// error; individual unreadable pages become warnings on the result.
///
/// [`Extraction`]: crate::error::RagError::Extraction
pub trait TextExtractor: Send + Sync {
    /// Extract page texts and warnings from the raw bytes of one document.
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument>;
}
