//! Reconciliation of human-drawn regions with machine tokens.
//!
//! Every token takes the label of the first human region (in export order)
//! that contains the token's centroid. Overlapping regions are therefore
//! resolved by their order in the annotation export, never by overlap area.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geometry::{BBox, HasBBox};
use crate::token::Token;

/// Label given to tokens outside every human region.
pub const OTHER_LABEL: &str = "OTHER";

/// A labeled rectangle drawn by an annotator, in normalized 0-1000 space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanRegion {
    #[serde(rename = "box")]
    pub bbox: BBox,
    pub label: String,
}

impl HumanRegion {
    pub fn new(bbox: impl Into<BBox>, label: impl Into<String>) -> Self {
        Self {
            bbox: bbox.into(),
            label: label.into(),
        }
    }
}

impl HasBBox for HumanRegion {
    fn bbox(&self) -> &BBox {
        &self.bbox
    }
}

/// One labeled token of the final training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    #[serde(rename = "word", alias = "token")]
    pub text: String,
    #[serde(rename = "box")]
    pub bbox: BBox,
    pub label: String,
}

impl HasBBox for ReconciledRecord {
    fn bbox(&self) -> &BBox {
        &self.bbox
    }
}

/// Label of the first region containing `(cx, cy)`, if any.
pub fn first_containing<'a>(regions: &'a [HumanRegion], cx: f64, cy: f64) -> Option<&'a str> {
    regions
        .iter()
        .find(|r| r.bbox.contains_point(cx, cy))
        .map(|r| r.label.as_str())
}

/// Assign each non-degenerate token the label of the first region containing
/// its centroid, or [`OTHER_LABEL`].
///
/// Output order follows token order. The function is pure, so pages can be
/// reconciled independently and in parallel.
pub fn reconcile(tokens: &[Token], regions: &[HumanRegion]) -> Vec<ReconciledRecord> {
    if tokens.is_empty() {
        warn!("reconcile called with an empty token list");
        return Vec::new();
    }
    if regions.is_empty() {
        warn!("reconcile called without human regions, every token becomes {OTHER_LABEL}");
    }

    let records: Vec<ReconciledRecord> = tokens
        .iter()
        .filter(|t| !t.bbox.is_degenerate())
        .map(|t| {
            let (cx, cy) = t.bbox.centroid();
            let label = first_containing(regions, cx, cy).unwrap_or(OTHER_LABEL);
            ReconciledRecord {
                text: t.text.clone(),
                bbox: t.bbox,
                label: label.to_string(),
            }
        })
        .collect();

    debug!(
        tokens = tokens.len(),
        records = records.len(),
        regions = regions.len(),
        "reconciled tokens"
    );
    records
}
