use serde::{Deserialize, Serialize};

/// Side length, in pixels, of a normalized face crop.
pub const DEFAULT_FACE_SIZE: u32 = 100;

/// Axis-aligned face rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Returns true if every edge of `self` lies within or on the edges of `other`.
    pub fn is_inside(&self, other: &BoundingBox) -> bool {
        self.x >= other.x
            && self.y >= other.y
            && self.right() <= other.right()
            && self.bottom() <= other.bottom()
    }

    /// Intersect with an image of the given size.
    ///
    /// Returns `None` when nothing of the box is left inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let left = (self.x as i64).max(0);
        let top = (self.y as i64).max(0);
        let right = self.right().min(width as i64);
        let bottom = self.bottom().min(height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(BoundingBox {
            x: left as i32,
            y: top as i32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{x: {}, y: {}, width: {}, height: {}}}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Raw output of a recognition model for one face crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Subject id of the closest training sample.
    pub label: i32,
    /// Dissimilarity to that sample. Lower = better match.
    pub distance: f64,
}
