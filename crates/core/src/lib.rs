//! layoutrecon - layout dataset reconstruction for token-classification models.
//!
//! Turns layout-model token streams and human region annotations into
//! word-level pre-annotations and labeled training records.

pub mod annotation;
pub mod cluster;
pub mod coords;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod gridlines;
pub mod labeler;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod token;

pub use cluster::{ClusterParams, Word, cluster, cluster_with};
pub use coords::{CoordSpace, ImageDims, from_normalized, to_normalized};
pub use error::{Error, Result};
pub use geometry::{BBox, HasBBox};
pub use gridlines::{GridlineParams, clean_page, remove_gridlines};
pub use labeler::{DraftLabel, DraftLabeler, HeuristicLabeler};
pub use model::{PageImage, TokenSource};
pub use reconcile::{HumanRegion, OTHER_LABEL, ReconciledRecord, reconcile};
pub use token::Token;
