//! Nonlinear congestion cost: the core is cut into `num_regions x
//! num_regions` bins, each net spreads its expected wiring evenly over its
//! box, and every bin costs `occupancy^2 / capacity` per direction.

use super::bbox::cross_count;
use fabric_common::db::grid::DeviceGrid;
use fabric_common::geom::rect::GridRect;

#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceRegion {
    pub capacity: f64,
    pub inv_capacity: f64,
    pub occupancy: f64,
}

#[derive(Clone, Debug)]
pub struct RegionCostModel {
    num_regions: usize,
    /// Region `i` spans `bounds_x[i]..bounds_x[i + 1]`.
    bounds_x: Vec<f64>,
    bounds_y: Vec<f64>,
    x_bins: Vec<PlaceRegion>,
    y_bins: Vec<PlaceRegion>,
}

fn overlap(lo: f64, hi: f64, a: f64, b: f64) -> f64 {
    (hi.min(b) - lo.max(a)).max(0.0)
}

impl RegionCostModel {
    pub fn new(grid: &DeviceGrid, place_chan_width: f64, num_regions: usize) -> Self {
        let (chan_x, chan_y) = grid.channel_widths(place_chan_width.round() as usize);
        let bounds = |n: usize| -> Vec<f64> {
            let step = n as f64 / num_regions as f64;
            (0..=num_regions).map(|i| 0.5 + i as f64 * step).collect()
        };
        let bounds_x = bounds(grid.nx);
        let bounds_y = bounds(grid.ny);

        let mut x_bins = vec![PlaceRegion::default(); num_regions * num_regions];
        let mut y_bins = x_bins.clone();
        for i in 0..num_regions {
            let (xlo, xhi) = (bounds_x[i], bounds_x[i + 1]);
            for j in 0..num_regions {
                let (ylo, yhi) = (bounds_y[j], bounds_y[j + 1]);
                // Horizontal channel k runs between rows k and k + 1.
                let tracks_x: f64 = chan_x
                    .iter()
                    .enumerate()
                    .map(|(k, &w)| w as f64 * overlap(ylo, yhi, k as f64, k as f64 + 1.0))
                    .sum();
                let tracks_y: f64 = chan_y
                    .iter()
                    .enumerate()
                    .map(|(k, &w)| w as f64 * overlap(xlo, xhi, k as f64, k as f64 + 1.0))
                    .sum();
                let cap_x = (tracks_x * (xhi - xlo)).max(f64::MIN_POSITIVE);
                let cap_y = (tracks_y * (yhi - ylo)).max(f64::MIN_POSITIVE);
                x_bins[i * num_regions + j] = PlaceRegion {
                    capacity: cap_x,
                    inv_capacity: 1.0 / cap_x,
                    occupancy: 0.0,
                };
                y_bins[i * num_regions + j] = PlaceRegion {
                    capacity: cap_y,
                    inv_capacity: 1.0 / cap_y,
                    occupancy: 0.0,
                };
            }
        }

        Self {
            num_regions,
            bounds_x,
            bounds_y,
            x_bins,
            y_bins,
        }
    }

    pub fn clear(&mut self) {
        for bin in self.x_bins.iter_mut().chain(self.y_bins.iter_mut()) {
            bin.occupancy = 0.0;
        }
    }

    /// Adds (`sign = 1`) or removes (`sign = -1`) one net's spread.
    pub fn update_occupancy(&mut self, rect: &GridRect, num_pins: usize, sign: f64) {
        let crossing = cross_count(num_pins);
        let (xlo, xhi) = (rect.xmin as f64 - 0.5, rect.xmax as f64 + 0.5);
        let (ylo, yhi) = (rect.ymin as f64 - 0.5, rect.ymax as f64 + 0.5);
        let inv_width = 1.0 / (xhi - xlo);
        let inv_height = 1.0 / (yhi - ylo);

        for i in 0..self.num_regions {
            let ox = overlap(xlo, xhi, self.bounds_x[i], self.bounds_x[i + 1]);
            if ox <= 0.0 {
                continue;
            }
            for j in 0..self.num_regions {
                let oy = overlap(ylo, yhi, self.bounds_y[j], self.bounds_y[j + 1]);
                if oy <= 0.0 {
                    continue;
                }
                let k = i * self.num_regions + j;
                self.x_bins[k].occupancy += sign * ox * oy * crossing * inv_height;
                self.y_bins[k].occupancy += sign * ox * oy * crossing * inv_width;
            }
        }
    }

    pub fn cost(&self) -> f64 {
        self.x_bins
            .iter()
            .chain(self.y_bins.iter())
            .map(|b| b.occupancy * b.occupancy * b.inv_capacity)
            .sum()
    }

    pub fn regions(&self) -> (&[PlaceRegion], &[PlaceRegion]) {
        (&self.x_bins, &self.y_bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_common::db::arch::Architecture;
    use fabric_common::util::config::DeviceConfig;

    fn model(num_regions: usize) -> RegionCostModel {
        let mut device = DeviceConfig::default();
        device.nx = 8;
        device.ny = 8;
        let arch = Architecture::from_config(&device).unwrap();
        let grid = DeviceGrid::build(&arch, 8, 8);
        RegionCostModel::new(&grid, 10.0, num_regions)
    }

    #[test]
    fn remove_restores_previous_cost() {
        let mut m = model(4);
        let a = GridRect::new(1, 3, 2, 6);
        let b = GridRect::new(5, 8, 1, 1);
        m.update_occupancy(&a, 3, 1.0);
        let before = m.cost();
        m.update_occupancy(&b, 5, 1.0);
        assert!(m.cost() > before);
        m.update_occupancy(&b, 5, -1.0);
        assert!((m.cost() - before).abs() < 1e-9);
    }

    #[test]
    fn spread_conserves_total_occupancy() {
        let mut m = model(2);
        let rect = GridRect::new(2, 7, 3, 5);
        m.update_occupancy(&rect, 2, 1.0);
        let (xb, _) = m.regions();
        let total: f64 = xb.iter().map(|b| b.occupancy).sum();
        // Whole box inside the core: x occupancy sums to width * crossing.
        assert!((total - 6.0).abs() < 1e-9);
    }

    #[test]
    fn clustered_nets_cost_more_than_spread_ones() {
        let mut clustered = model(4);
        let mut spread = model(4);
        for _ in 0..2 {
            clustered.update_occupancy(&GridRect::new(1, 2, 1, 2), 2, 1.0);
        }
        spread.update_occupancy(&GridRect::new(1, 2, 1, 2), 2, 1.0);
        spread.update_occupancy(&GridRect::new(7, 8, 7, 8), 2, 1.0);
        assert!(clustered.cost() > spread.cost());
    }
}
