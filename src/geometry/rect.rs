//! Points, sizes and half-open rectangles on an integer grid.

use serde::{Deserialize, Serialize};

/// A position on an integer sample grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Area in samples, computed without overflow.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when both dimensions are at least as large as `other`'s.
    pub fn covers(&self, other: Size) -> bool {
        self.width >= other.width && self.height >= other.height
    }

    /// True when both dimensions are at most as large as `other`'s.
    pub fn fits_within(&self, other: Size) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

/// A half-open rectangle `[x0, x1) x [y0, y1)`.
///
/// This is the bounds convention used throughout ISO/IEC 15444-1 Annex B, so
/// tile, resolution, subband and precinct extents can be expressed directly.
/// A rectangle with `x1 <= x0` or `y1 <= y0` is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Build a rectangle from an origin and a size, saturating at `u32::MAX`.
    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self {
            x0: origin.x,
            y0: origin.y,
            x1: origin.x.saturating_add(size.width),
            y1: origin.y.saturating_add(size.height),
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn area(&self) -> u64 {
        self.size().area()
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Intersection of two rectangles. Disjoint inputs yield an empty
    /// rectangle anchored at the clipped origin.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1).max(x0);
        let y1 = self.y1.min(other.y1).max(y0);
        Rect { x0, y0, x1, y1 }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Whether `other` lies entirely inside. Every rectangle contains an
    /// empty one placed within its bounds.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }

    /// Grow by `amount` samples on every side, then clip to `bounds`.
    pub fn expand_within(&self, amount: u32, bounds: &Rect) -> Rect {
        Rect {
            x0: self.x0.saturating_sub(amount),
            y0: self.y0.saturating_sub(amount),
            x1: self.x1.saturating_add(amount),
            y1: self.y1.saturating_add(amount),
        }
        .intersect(bounds)
    }

    /// Shift by the negated origin of `frame`, turning absolute grid
    /// coordinates into coordinates relative to `frame`.
    pub fn relative_to(&self, frame: &Rect) -> Rect {
        Rect {
            x0: self.x0.saturating_sub(frame.x0),
            y0: self.y0.saturating_sub(frame.y0),
            x1: self.x1.saturating_sub(frame.x0),
            y1: self.y1.saturating_sub(frame.y0),
        }
    }

    /// Fraction of this rectangle's area covered by `other`, in `[0, 1]`.
    pub fn overlap_fraction(&self, other: &Rect) -> f64 {
        let area = self.area();
        if area == 0 {
            return 0.0;
        }
        self.intersect(other).area() as f64 / area as f64
    }
}
