use crate::db::arch::Architecture;
use crate::db::indices::{BlockId, TypeId};
use crate::geom::coord::GridCoord;

#[derive(Clone, Debug, Default)]
pub struct GridTile {
    /// `None` for the four corners and for rows no block can occupy.
    pub block_type: Option<TypeId>,
    /// Row offset inside a tall block; 0 on the anchor tile.
    pub offset: usize,
    pub usage: usize,
    /// Slot-indexed resident blocks; only anchor tiles hold any.
    pub blocks: Vec<Option<BlockId>>,
}

/// The `(nx + 2) x (ny + 2)` tile array: a core of `nx x ny` columns and
/// rows surrounded by the I/O ring.
#[derive(Clone, Debug)]
pub struct DeviceGrid {
    pub nx: usize,
    pub ny: usize,
    tiles: Vec<GridTile>,
    /// Relative width of the horizontal channel above row `y`, `0..=ny`.
    pub chan_width_x: Vec<f64>,
    /// Relative width of the vertical channel right of column `x`, `0..=nx`.
    pub chan_width_y: Vec<f64>,
}

impl DeviceGrid {
    pub fn build(arch: &Architecture, nx: usize, ny: usize) -> Self {
        let mut tiles = vec![GridTile::default(); (nx + 2) * (ny + 2)];
        let width = ny + 2;

        for x in 0..=nx + 1 {
            for y in 0..=ny + 1 {
                let on_x_edge = x == 0 || x == nx + 1;
                let on_y_edge = y == 0 || y == ny + 1;
                if on_x_edge && on_y_edge {
                    continue;
                }
                if on_x_edge || on_y_edge {
                    tiles[x * width + y] = GridTile {
                        block_type: Some(arch.io_type),
                        offset: 0,
                        usage: 0,
                        blocks: vec![None; arch.io_rat],
                    };
                }
            }
        }

        for x in 1..=nx {
            let type_id = arch.column_type(x);
            let block_type = arch.block_type(type_id);
            let height = block_type.height;
            let mut y = 1;
            while y + height - 1 <= ny {
                for offset in 0..height {
                    let slots = if offset == 0 { block_type.capacity } else { 0 };
                    tiles[x * width + y + offset] = GridTile {
                        block_type: Some(type_id),
                        offset,
                        usage: 0,
                        blocks: vec![None; slots],
                    };
                }
                y += height;
            }
        }

        let chan_width_x = channel_profile(
            ny,
            |pos, sep| arch.chan_width_x.width_at(pos, sep),
            arch.chan_width_io,
        );
        let chan_width_y = channel_profile(
            nx,
            |pos, sep| arch.chan_width_y.width_at(pos, sep),
            arch.chan_width_io,
        );

        Self {
            nx,
            ny,
            tiles,
            chan_width_x,
            chan_width_y,
        }
    }

    #[inline]
    pub fn tile(&self, x: usize, y: usize) -> &GridTile {
        &self.tiles[x * (self.ny + 2) + y]
    }

    #[inline]
    pub fn tile_mut(&mut self, x: usize, y: usize) -> &mut GridTile {
        &mut self.tiles[x * (self.ny + 2) + y]
    }

    pub fn width(&self) -> usize {
        self.nx + 2
    }

    pub fn height(&self) -> usize {
        self.ny + 2
    }

    pub fn is_perimeter(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x == self.nx + 1 || y == self.ny + 1
    }

    /// Anchor tiles whose type is `type_id`, in column-major order.
    pub fn anchors_of_type(&self, type_id: TypeId) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for x in 0..self.width() {
            for y in 0..self.height() {
                let tile = self.tile(x, y);
                if tile.block_type == Some(type_id) && tile.offset == 0 {
                    out.push((x, y));
                }
            }
        }
        out
    }

    pub fn slot_count(&self, type_id: TypeId) -> usize {
        self.anchors_of_type(type_id)
            .iter()
            .map(|&(x, y)| self.tile(x, y).blocks.len())
            .sum()
    }

    pub fn block_at(&self, loc: GridCoord) -> Option<BlockId> {
        self.tile(loc.x, loc.y).blocks.get(loc.z).copied().flatten()
    }

    /// Stores `block` in slot `loc.z`, keeping `usage` equal to the number of
    /// occupied slots.
    pub fn set_block(&mut self, loc: GridCoord, block: Option<BlockId>) {
        let tile = self.tile_mut(loc.x, loc.y);
        let old = tile.blocks[loc.z].is_some();
        tile.blocks[loc.z] = block;
        match (old, block.is_some()) {
            (false, true) => tile.usage += 1,
            (true, false) => tile.usage -= 1,
            _ => {}
        }
    }

    pub fn clear_blocks(&mut self) {
        for tile in &mut self.tiles {
            tile.usage = 0;
            tile.blocks.iter_mut().for_each(|b| *b = None);
        }
    }

    /// Integer channel widths for a device whose widest channel carries
    /// `width` tracks; every channel keeps at least one track.
    pub fn channel_widths(&self, width: usize) -> (Vec<usize>, Vec<usize>) {
        let scale = |rel: &f64| ((width as f64) * rel).round().max(1.0) as usize;
        (
            self.chan_width_x.iter().map(scale).collect(),
            self.chan_width_y.iter().map(scale).collect(),
        )
    }
}

fn channel_profile(n: usize, interior: impl Fn(f64, f64) -> f64, io: f64) -> Vec<f64> {
    let mut widths = vec![io; n + 1];
    let separation = 1.0 / n as f64;
    for (i, w) in widths.iter_mut().enumerate().take(n).skip(1) {
        *w = interior(i as f64 / n as f64, separation).max(0.0);
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::DeviceConfig;

    fn small_grid() -> (Architecture, DeviceGrid) {
        let mut device = DeviceConfig::default();
        device.nx = 6;
        device.ny = 5;
        device.hard_block.start = 3;
        device.hard_block.repeat = 0;
        let arch = Architecture::from_config(&device).unwrap();
        let grid = DeviceGrid::build(&arch, device.nx, device.ny);
        (arch, grid)
    }

    #[test]
    fn perimeter_and_corners() {
        let (arch, grid) = small_grid();
        assert!(grid.tile(0, 0).block_type.is_none());
        assert!(grid.tile(7, 6).block_type.is_none());
        assert_eq!(grid.tile(0, 3).block_type, Some(arch.io_type));
        assert_eq!(grid.tile(0, 3).blocks.len(), arch.io_rat);
        assert_eq!(grid.slot_count(arch.io_type), 2 * (6 + 5) * arch.io_rat);
    }

    #[test]
    fn tall_blocks_leave_remainder_rows_empty() {
        let (arch, grid) = small_grid();
        let mult = arch.type_by_name("mult").unwrap();
        assert_eq!(grid.tile(3, 1).block_type, Some(mult));
        assert_eq!(grid.tile(3, 2).offset, 1);
        assert!(grid.tile(3, 2).blocks.is_empty());
        assert_eq!(grid.tile(3, 3).offset, 0);
        assert!(grid.tile(3, 5).block_type.is_none());
        assert_eq!(grid.anchors_of_type(mult), vec![(3, 1), (3, 3)]);
    }

    #[test]
    fn set_block_tracks_usage() {
        let (_, mut grid) = small_grid();
        let loc = GridCoord::new(0, 2, 1);
        grid.set_block(loc, Some(BlockId::new(4)));
        assert_eq!(grid.tile(0, 2).usage, 1);
        assert_eq!(grid.block_at(loc), Some(BlockId::new(4)));
        grid.set_block(loc, None);
        assert_eq!(grid.tile(0, 2).usage, 0);
    }

    #[test]
    fn uniform_channels_scale_to_width() {
        let (_, grid) = small_grid();
        let (cx, cy) = grid.channel_widths(10);
        assert_eq!(cx.len(), 6);
        assert_eq!(cy.len(), 7);
        assert!(cx.iter().chain(cy.iter()).all(|&w| w == 10));
    }
}
