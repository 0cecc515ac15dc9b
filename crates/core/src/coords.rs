//! Coordinate space conversions.
//!
//! Three conventions meet in this pipeline:
//! - pixel space of the rendered page image,
//! - the layout model's normalized 0-1000 space,
//! - the annotation tool's percentage-of-image space (0-100).
//!
//! Every comparison between boxes happens in normalized space, so anything
//! arriving in pixel or percentage coordinates passes through
//! [`to_normalized`] first.

use crate::error::{Error, Result};
use crate::geometry::BBox;

/// Extent of the normalized layout space.
pub const NORMALIZED_EXTENT: f64 = 1000.0;

/// Extent of the annotation tool's percentage space.
pub const PERCENT_EXTENT: f64 = 100.0;

/// How far outside `[0, 1000]` a converted coordinate may land before the
/// conversion is rejected.
pub const NORMALIZED_TOLERANCE: f64 = 1.0;

/// Coordinate convention of an incoming box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSpace {
    /// Image pixels; needs the image dimensions.
    Pixel,
    /// Percentage of the image extent, 0-100 per axis.
    Percent,
    /// Already in the 0-1000 layout space.
    Normalized,
}

/// Width and height of a page image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDims {
    pub width: u32,
    pub height: u32,
}

impl ImageDims {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for ImageDims {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Per-axis extents `(x_extent, y_extent)` of a coordinate space.
fn extents(space: CoordSpace, dims: Option<ImageDims>) -> Result<(f64, f64)> {
    match space {
        CoordSpace::Normalized => Ok((NORMALIZED_EXTENT, NORMALIZED_EXTENT)),
        CoordSpace::Percent => Ok((PERCENT_EXTENT, PERCENT_EXTENT)),
        CoordSpace::Pixel => {
            let dims = dims.ok_or_else(|| {
                Error::InvalidCoordinate("pixel coordinates require image dimensions".into())
            })?;
            if dims.width == 0 || dims.height == 0 {
                return Err(Error::InvalidCoordinate(format!(
                    "image dimensions must be non-zero, got {}x{}",
                    dims.width, dims.height
                )));
            }
            Ok((dims.width as f64, dims.height as f64))
        }
    }
}

fn check_normalized(b: &BBox) -> Result<()> {
    let lo = -NORMALIZED_TOLERANCE;
    let hi = NORMALIZED_EXTENT + NORMALIZED_TOLERANCE;
    for v in [b.x0, b.y0, b.x1, b.y1] {
        if !v.is_finite() || v < lo || v > hi {
            return Err(Error::InvalidCoordinate(format!(
                "normalized box [{}, {}, {}, {}] leaves the 0-1000 range",
                b.x0, b.y0, b.x1, b.y1
            )));
        }
    }
    Ok(())
}

/// Convert a box from `space` into the normalized 0-1000 space.
///
/// Scaling is linear per axis: `normalized = raw / extent * 1000`.
///
/// # Errors
/// `InvalidCoordinate` when `space` is [`CoordSpace::Pixel`] and `dims` is
/// missing or zero-sized, or when the result leaves `[0, 1000]` by more
/// than [`NORMALIZED_TOLERANCE`].
pub fn to_normalized(bbox: BBox, space: CoordSpace, dims: Option<ImageDims>) -> Result<BBox> {
    let (ex, ey) = extents(space, dims)?;
    let out = BBox {
        x0: bbox.x0 / ex * NORMALIZED_EXTENT,
        y0: bbox.y0 / ey * NORMALIZED_EXTENT,
        x1: bbox.x1 / ex * NORMALIZED_EXTENT,
        y1: bbox.y1 / ey * NORMALIZED_EXTENT,
    };
    check_normalized(&out)?;
    Ok(out)
}

/// Convert a normalized box back into `space`.
pub fn from_normalized(bbox: BBox, space: CoordSpace, dims: Option<ImageDims>) -> Result<BBox> {
    check_normalized(&bbox)?;
    let (ex, ey) = extents(space, dims)?;
    Ok(BBox {
        x0: bbox.x0 / NORMALIZED_EXTENT * ex,
        y0: bbox.y0 / NORMALIZED_EXTENT * ey,
        x1: bbox.x1 / NORMALIZED_EXTENT * ex,
        y1: bbox.y1 / NORMALIZED_EXTENT * ey,
    })
}

/// Normalize an annotation-tool rectangle given as top-left corner plus
/// size, all in percent of the image.
pub fn percent_rect_to_normalized(x: f64, y: f64, width: f64, height: f64) -> Result<BBox> {
    to_normalized(
        BBox::new(x, y, x + width, y + height),
        CoordSpace::Percent,
        None,
    )
}
