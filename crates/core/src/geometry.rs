//! Bounding boxes shared by every pipeline stage.
//!
//! All boxes compared by the clusterer and the reconciler live in the
//! normalized 0-1000 layout space with a top-left origin. Conversion from
//! pixel or percentage coordinates happens in [`crate::coords`].

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle `(x0, y0, x1, y1)` with `x0 <= x1` and `y0 <= y1`.
///
/// Serialized as a four-number array, matching the layout model's `bbox`
/// rows and the dataset files.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Center point `((x0 + x1) / 2, (y0 + y1) / 2)`.
    pub fn centroid(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// True for the all-zero box the layout model emits for padding and
    /// special tokens.
    pub fn is_degenerate(&self) -> bool {
        self.x0 == 0.0 && self.y0 == 0.0 && self.x1 == 0.0 && self.y1 == 0.0
    }

    /// Inclusive point containment on all four edges.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.x0 <= x && x <= self.x1 && self.y0 <= y && y <= self.y1
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Envelope of an iterator of boxes, `None` when it is empty.
    pub fn envelope<'a, I>(boxes: I) -> Option<BBox>
    where
        I: IntoIterator<Item = &'a BBox>,
    {
        boxes.into_iter().fold(None, |acc, b| match acc {
            None => Some(*b),
            Some(env) => Some(env.union(b)),
        })
    }
}

impl From<[f64; 4]> for BBox {
    fn from([x0, y0, x1, y1]: [f64; 4]) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// Anything carrying a bounding box.
pub trait HasBBox {
    fn bbox(&self) -> &BBox;

    fn x0(&self) -> f64 {
        self.bbox().x0
    }

    fn y0(&self) -> f64 {
        self.bbox().y0
    }

    fn x1(&self) -> f64 {
        self.bbox().x1
    }

    fn y1(&self) -> f64 {
        self.bbox().y1
    }

    fn width(&self) -> f64 {
        self.bbox().width()
    }

    fn height(&self) -> f64 {
        self.bbox().height()
    }
}

impl HasBBox for BBox {
    fn bbox(&self) -> &BBox {
        self
    }
}

/// Compares two floats for approximate equality.
#[inline]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_serializes_as_array() {
        let b = BBox::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");

        let back: BBox = serde_json::from_str("[10, 20, 30, 40]").unwrap();
        assert_eq!(back, BBox::new(10.0, 20.0, 30.0, 40.0));
    }

    #[test]
    fn test_envelope() {
        let boxes = [
            BBox::new(100.0, 200.0, 160.0, 220.0),
            BBox::new(162.0, 198.0, 170.0, 224.0),
        ];
        assert_eq!(
            BBox::envelope(&boxes),
            Some(BBox::new(100.0, 198.0, 170.0, 224.0))
        );
        assert_eq!(BBox::envelope(&[]), None);
    }

    #[test]
    fn test_contains_point_is_inclusive() {
        let b = BBox::new(0.0, 0.0, 500.0, 500.0);
        assert!(b.contains_point(0.0, 0.0));
        assert!(b.contains_point(500.0, 500.0));
        assert!(!b.contains_point(500.5, 10.0));
    }

    #[test]
    fn test_degenerate() {
        assert!(BBox::default().is_degenerate());
        assert!(!BBox::new(0.0, 0.0, 0.0, 1.0).is_degenerate());
    }
}
