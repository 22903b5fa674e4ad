//! Conversion from caller coordinates (fractions of the page, origin at the
//! top-left) to PDF user space (points, origin at the bottom-left).

/// US Letter, used when a page carries no usable MediaBox.
pub const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointRect {
    pub x: f64,
    /// Bottom edge.
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PointRect {
    pub fn top(&self) -> f64 {
        self.y + self.height
    }
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            width,
            height,
        }
    }

    /// From a `[x0 y0 x1 y1]` box; corners may be given in any order.
    pub fn from_box(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            origin_x: x0.min(x1),
            origin_y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    pub fn to_points(&self, x: f64, y: f64, w: f64, h: f64) -> PointRect {
        let width = w * self.width;
        let height = h * self.height;
        PointRect {
            x: self.origin_x + x * self.width,
            y: self.origin_y + self.height - y * self.height - height,
            width,
            height,
        }
    }

    /// Converts a length given as a fraction of the page height.
    pub fn vertical(&self, frac: f64) -> f64 {
        frac * self.height
    }

    pub fn horizontal(&self, frac: f64) -> f64 {
        frac * self.width
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE.0, DEFAULT_PAGE_SIZE.1)
    }
}
