use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle, `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// AABB overlap test. All four comparisons are strict, so rectangles that
    /// only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Whether this rectangle lies entirely inside `bounds`.
    pub fn fits_within(&self, bounds: &Rect) -> bool {
        self.x >= bounds.x
            && self.y >= bounds.y
            && self.right() <= bounds.right()
            && self.bottom() <= bounds.bottom()
    }

    /// Copy of this rectangle moved to `(x, y)`.
    pub fn at(&self, x: f32, y: f32) -> Rect {
        Rect { x, y, ..*self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_rects_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let right = Rect::new(10.0, 0.0, 10.0, 10.0);
        let below = Rect::new(0.0, 10.0, 10.0, 10.0);
        assert!(!a.intersects(&right));
        assert!(!a.intersects(&below));
    }

    #[test]
    fn contained_rect_intersects() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        let inner = Rect::new(40.0, 40.0, 5.0, 5.0);
        assert!(outer.intersects(&inner));
        assert!(inner.fits_within(&outer));
        assert!(!outer.fits_within(&inner));
    }

    #[test]
    fn fits_within_allows_flush_edges() {
        let bounds = Rect::new(0.0, 0.0, 640.0, 480.0);
        assert!(Rect::new(600.0, 430.0, 40.0, 50.0).fits_within(&bounds));
        assert!(!Rect::new(600.5, 430.0, 40.0, 50.0).fits_within(&bounds));
        assert!(!Rect::new(-0.1, 0.0, 40.0, 50.0).fits_within(&bounds));
    }
}
