/// A placement location: tile column `x`, tile row `y` and sub-block slot `z`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridCoord {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl GridCoord {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    pub fn same_tile(&self, other: &GridCoord) -> bool {
        self.x == other.x && self.y == other.y
    }

    pub fn manhattan(&self, other: &GridCoord) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}
