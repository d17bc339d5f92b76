use std::fmt;

/// Inclusive axis-aligned rectangle of tile coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridRect {
    pub xmin: usize,
    pub xmax: usize,
    pub ymin: usize,
    pub ymax: usize,
}

impl GridRect {
    pub fn new(xmin: usize, xmax: usize, ymin: usize, ymax: usize) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    pub fn point(x: usize, y: usize) -> Self {
        Self::new(x, x, y, y)
    }

    pub fn include(&mut self, x: usize, y: usize) {
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
        self.ymin = self.ymin.min(y);
        self.ymax = self.ymax.max(y);
    }

    pub fn x_span(&self) -> usize {
        self.xmax - self.xmin
    }

    pub fn y_span(&self) -> usize {
        self.ymax - self.ymin
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// True when the span `[lo, hi] x [ylo, yhi]` touches this rectangle.
    pub fn overlaps(&self, xlo: usize, xhi: usize, ylo: usize, yhi: usize) -> bool {
        xhi >= self.xmin && xlo <= self.xmax && yhi >= self.ymin && ylo <= self.ymax
    }

    /// Grows the rectangle by `margin` on every side, clipped to `[0, max_x] x [0, max_y]`.
    pub fn expanded(&self, margin: usize, max_x: usize, max_y: usize) -> Self {
        Self {
            xmin: self.xmin.saturating_sub(margin),
            xmax: (self.xmax + margin).min(max_x),
            ymin: self.ymin.saturating_sub(margin),
            ymax: (self.ymax + margin).min(max_y),
        }
    }
}

impl fmt::Display for GridRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..{}] x [{}..{}]",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}
