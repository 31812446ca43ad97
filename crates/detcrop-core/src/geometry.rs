//! Shared rectangle geometry for detection and cropping.
//!
//! All rectangles are axis-aligned in top-left/width/height form with
//! integer pixel units. Coordinates may be negative before clamping
//! (boxes scaled out of the model coordinate space can start off-image),
//! which is why `x`/`y` are signed.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// The x-coordinate of the top-left corner.
    pub x: i32,
    /// The y-coordinate of the top-left corner.
    pub y: i32,
    /// The width of the rectangle.
    pub width: i32,
    /// The height of the rectangle.
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The x-coordinate one past the right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// The y-coordinate one past the bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Returns true if both dimensions are strictly positive.
    pub fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Area of the rectangle, treating non-positive dimensions as zero.
    pub fn area(&self) -> i64 {
        if !self.is_positive() {
            return 0;
        }
        self.width as i64 * self.height as i64
    }

    /// Center point of the rectangle (integer division).
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Intersection with another rectangle.
    ///
    /// Returns `None` when the overlap has zero or negative width or height.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Intersection over Union with another rectangle.
    ///
    /// Degenerate rectangles and empty overlaps yield 0.0.
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = match self.intersect(other) {
            Some(r) => r.area(),
            None => return 0.0,
        };

        let union = self.area() + other.area() - intersection;
        if union <= 0 {
            0.0
        } else {
            intersection as f32 / union as f32
        }
    }

    /// Smallest rectangle enclosing all rectangles in the iterator.
    ///
    /// Returns `None` for an empty iterator.
    pub fn union_bounds<'a, I>(rects: I) -> Option<Rect>
    where
        I: IntoIterator<Item = &'a Rect>,
    {
        let mut iter = rects.into_iter();
        let first = *iter.next()?;

        let mut x1 = first.x;
        let mut y1 = first.y;
        let mut x2 = first.right();
        let mut y2 = first.bottom();

        for r in iter {
            x1 = x1.min(r.x);
            y1 = y1.min(r.y);
            x2 = x2.max(r.right());
            y2 = y2.max(r.bottom());
        }

        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
