//! Opaque image-extraction collaborator.
//!
//! Converting a photographed log slip into structured entries is an
//! external concern (an LLM-backed service in practice). The tracker only
//! depends on this trait; implementations live with the integration
//! layer, and tests substitute a canned double.

use crate::error::ExtractionError;

/// One production row read off a scanned log slip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedProduction {
    pub taka_number: String,
    pub machine_number: String,
    pub meter: String,
    pub date: String,
}

/// One delivery row read off a scanned slip. Scans capture only the taka
/// number and meter; the machine number is resolved during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedDelivery {
    pub taka_number: String,
    pub meter: String,
}

/// Image-to-entries extraction. No guarantees on latency or determinism.
///
/// Implementations must return [`ExtractionError::Empty`] when the call
/// succeeds but yields no entries, and [`ExtractionError::Failed`] for an
/// underlying call failure; callers surface both to the user the same way
/// (extraction failed, try a clearer image).
pub trait Extractor: Send + Sync {
    fn extract_production(&self, image: &[u8]) -> Result<Vec<ExtractedProduction>, ExtractionError>;

    fn extract_delivery(&self, image: &[u8]) -> Result<Vec<ExtractedDelivery>, ExtractionError>;
}
