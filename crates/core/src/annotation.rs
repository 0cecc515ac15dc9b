//! Human annotation export (Label Studio JSON).
//!
//! Only the fields the reconciler needs are modeled; everything else in the
//! export is ignored. Rectangles arrive in percent of the image and are
//! converted to normalized space here.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::coords::percent_rect_to_normalized;
use crate::error::{Error, Result};
use crate::reconcile::HumanRegion;

/// One annotated page of the export.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationTask {
    #[serde(default)]
    pub id: Option<u64>,
    pub data: TaskData,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskData {
    /// Image reference as stored by the tool, e.g.
    /// `/data/upload/1/3f2a9c1e-page_001.png`.
    pub image: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub result: Vec<AnnotationResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationResult {
    pub value: RectValue,
}

/// Rectangle in percent of the image: top-left corner and size.
#[derive(Debug, Clone, Deserialize)]
pub struct RectValue {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rectanglelabels: Vec<String>,
}

impl AnnotationTask {
    /// File name of the source image.
    ///
    /// The tool prefixes uploads with a hash and a dash; the part after the
    /// first `-` of the base name is the original file name. A base name
    /// without a dash is used as is.
    pub fn image_file_name(&self) -> String {
        let base = self
            .data
            .image
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.data.image);
        match base.split_once('-') {
            Some((_, rest)) => rest.to_string(),
            None => base.to_string(),
        }
    }

    /// Human regions of the first annotation, in normalized space and export
    /// order. Results without a rectangle label are skipped.
    pub fn regions(&self) -> Result<Vec<HumanRegion>> {
        let Some(annotation) = self.annotations.first() else {
            warn!(image = %self.data.image, "task has no annotations");
            return Ok(Vec::new());
        };

        let mut regions = Vec::with_capacity(annotation.result.len());
        for result in &annotation.result {
            let v = &result.value;
            let Some(label) = v.rectanglelabels.first() else {
                warn!(image = %self.data.image, "annotation result without rectangle label skipped");
                continue;
            };
            let bbox = percent_rect_to_normalized(v.x, v.y, v.width, v.height).map_err(|e| {
                Error::Annotation(format!("{}: {e}", self.data.image))
            })?;
            regions.push(HumanRegion {
                bbox,
                label: label.clone(),
            });
        }
        Ok(regions)
    }
}

/// Parse a full export document.
pub fn parse_export(json: &str) -> Result<Vec<AnnotationTask>> {
    serde_json::from_str(json).map_err(|e| Error::Annotation(e.to_string()))
}

/// Read and parse an export file.
pub fn load_export(path: &Path) -> Result<Vec<AnnotationTask>> {
    let json = std::fs::read_to_string(path)?;
    parse_export(&json)
}
