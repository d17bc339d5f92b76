//! Bounding-box wiring cost.
//!
//! Each net costs its box extent, scaled by an empirical crossing count for
//! its pin count and by how narrow the channels under the box are. Boxes of
//! nets with at least [`SMALL_NET`] sinks also keep per-edge pin counts so a
//! single-block move can be folded in without visiting every pin.

use fabric_common::db::core::Design;
use fabric_common::db::indices::NetId;
use fabric_common::db::netlist::NetPin;
use fabric_common::geom::coord::GridCoord;
use fabric_common::geom::rect::GridRect;

/// Nets with fewer sinks than this are rebuilt from their pins on every move.
pub const SMALL_NET: usize = 4;

const CROSS_COUNT: [f64; 50] = [
    1.0, 1.0, 1.0, 1.0828, 1.1536, 1.2206, 1.2823, 1.3385, 1.3991, 1.4493, 1.4974, 1.5455,
    1.5937, 1.6418, 1.6899, 1.7304, 1.7709, 1.8114, 1.8519, 1.8924, 1.9288, 1.9652, 2.0015,
    2.0379, 2.0743, 2.1061, 2.1379, 2.1698, 2.2016, 2.2334, 2.2646, 2.2958, 2.3271, 2.3583,
    2.3895, 2.4187, 2.4479, 2.4772, 2.5064, 2.5356, 2.5610, 2.5864, 2.6117, 2.6371, 2.6625,
    2.6887, 2.7148, 2.7410, 2.7671, 2.7933,
];

/// Expected number of channel crossings of a net's box, indexed by pin count.
pub fn cross_count(num_pins: usize) -> f64 {
    if num_pins > 50 {
        2.7933 + 0.02616 * (num_pins - 50) as f64
    } else {
        CROSS_COUNT[num_pins.max(1) - 1]
    }
}

/// Pins lying on each side of a bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeCounts {
    pub xmin: usize,
    pub xmax: usize,
    pub ymin: usize,
    pub ymax: usize,
}

/// Tile a net pin sits on: tall blocks put pins on their upper rows.
pub fn pin_tile(design: &Design, pin: NetPin, loc: GridCoord) -> (usize, usize) {
    let block_type = design.block_type_of(pin.block);
    let dy = if block_type.is_io {
        0
    } else {
        block_type.pin_locations[pin.pin].0
    };
    (loc.x, loc.y + dy)
}

#[derive(Clone, Debug)]
struct PendingBox {
    net: NetId,
    rect: GridRect,
    edges: EdgeCounts,
    cost: f64,
}

#[derive(Clone, Debug)]
pub struct BBoxCostModel {
    nx: usize,
    ny: usize,
    /// `[high][low]`: inverse average horizontal channel width over rows
    /// `low..=high`, raised to the cost exponent.
    chanx_fact: Vec<Vec<f64>>,
    chany_fact: Vec<Vec<f64>>,
    pub bb_coords: Vec<GridRect>,
    pub bb_edges: Vec<EdgeCounts>,
    pub net_cost: Vec<f64>,
    pending: Vec<PendingBox>,
}

impl BBoxCostModel {
    pub fn new(design: &Design, place_chan_width: f64, place_cost_exp: f64) -> Self {
        let (chan_x, chan_y) = design.grid.channel_widths(place_chan_width.round() as usize);
        let num_nets = design.netlist.num_nets();
        Self {
            nx: design.grid.nx,
            ny: design.grid.ny,
            chanx_fact: channel_factors(&chan_x, place_cost_exp),
            chany_fact: channel_factors(&chan_y, place_cost_exp),
            bb_coords: vec![GridRect::default(); num_nets],
            bb_edges: vec![EdgeCounts::default(); num_nets],
            net_cost: vec![0.0; num_nets],
            pending: Vec::new(),
        }
    }

    #[inline]
    fn clip(&self, (x, y): (usize, usize)) -> (usize, usize) {
        (x.clamp(1, self.nx), y.clamp(1, self.ny))
    }

    pub fn clipped_pin(&self, design: &Design, pin: NetPin) -> (usize, usize) {
        self.clip(pin_tile(design, pin, design.pin_loc(pin)))
    }

    /// Cost of a box for a net of `num_pins` pins. A direction in which the
    /// box has no extent contributes nothing.
    pub fn box_cost(&self, rect: &GridRect, num_pins: usize) -> f64 {
        let crossing = cross_count(num_pins);
        let mut cost = 0.0;
        if rect.xmax > rect.xmin {
            cost += (rect.x_span() + 1) as f64 * crossing * self.chanx_fact[rect.ymax][rect.ymin - 1];
        }
        if rect.ymax > rect.ymin {
            cost += (rect.y_span() + 1) as f64 * crossing * self.chany_fact[rect.xmax][rect.xmin - 1];
        }
        cost
    }

    /// Tight box of the net's current pins with edge counts.
    pub fn bb_from_scratch(&self, design: &Design, net: NetId) -> (GridRect, EdgeCounts) {
        let pins = &design.netlist.net(net).pins;
        let (x, y) = self.clipped_pin(design, pins[0]);
        let mut rect = GridRect::point(x, y);
        let mut edges = EdgeCounts {
            xmin: 1,
            xmax: 1,
            ymin: 1,
            ymax: 1,
        };

        for &pin in &pins[1..] {
            let (x, y) = self.clipped_pin(design, pin);

            if x == rect.xmin {
                edges.xmin += 1;
            }
            if x == rect.xmax {
                edges.xmax += 1;
            } else if x < rect.xmin {
                rect.xmin = x;
                edges.xmin = 1;
            } else if x > rect.xmax {
                rect.xmax = x;
                edges.xmax = 1;
            }

            if y == rect.ymin {
                edges.ymin += 1;
            }
            if y == rect.ymax {
                edges.ymax += 1;
            } else if y < rect.ymin {
                rect.ymin = y;
                edges.ymin = 1;
            } else if y > rect.ymax {
                rect.ymax = y;
                edges.ymax = 1;
            }
        }
        (rect, edges)
    }

    /// Box only, for small nets that never update incrementally.
    pub fn bb_without_edges(&self, design: &Design, net: NetId) -> GridRect {
        let pins = &design.netlist.net(net).pins;
        let (x, y) = self.clipped_pin(design, pins[0]);
        let mut rect = GridRect::point(x, y);
        for &pin in &pins[1..] {
            let (x, y) = self.clipped_pin(design, pin);
            rect.include(x, y);
        }
        rect
    }

    /// Folds one pin moving from `old` to `new` into a box. `None` means an
    /// edge lost its only pin and the box must be rebuilt from scratch.
    pub fn update_bb(
        &self,
        rect: &GridRect,
        edges: &EdgeCounts,
        old: (usize, usize),
        new: (usize, usize),
    ) -> Option<(GridRect, EdgeCounts)> {
        let (xold, yold) = self.clip(old);
        let (xnew, ynew) = self.clip(new);
        let (xmin, xmax, exmin, exmax) =
            update_axis(xold, xnew, rect.xmin, rect.xmax, edges.xmin, edges.xmax)?;
        let (ymin, ymax, eymin, eymax) =
            update_axis(yold, ynew, rect.ymin, rect.ymax, edges.ymin, edges.ymax)?;
        Some((
            GridRect::new(xmin, xmax, ymin, ymax),
            EdgeCounts {
                xmin: exmin,
                xmax: exmax,
                ymin: eymin,
                ymax: eymax,
            },
        ))
    }

    fn net_box(&self, design: &Design, net: NetId) -> (GridRect, EdgeCounts) {
        if design.netlist.net(net).num_sinks() >= SMALL_NET {
            self.bb_from_scratch(design, net)
        } else {
            (self.bb_without_edges(design, net), EdgeCounts::default())
        }
    }

    /// Rebuilds every box and cost from the current placement and returns
    /// the total over routed nets.
    pub fn load_from_scratch(&mut self, design: &Design) -> f64 {
        let mut total = 0.0;
        for net in design.routable_nets() {
            let (rect, edges) = self.net_box(design, net);
            let cost = self.box_cost(&rect, design.netlist.net(net).pins.len());
            self.bb_coords[net.index()] = rect;
            self.bb_edges[net.index()] = edges;
            self.net_cost[net.index()] = cost;
            total += cost;
        }
        total
    }

    /// Total cost recomputed from the pins without touching cached state.
    pub fn recompute_cost(&self, design: &Design) -> f64 {
        design
            .routable_nets()
            .map(|net| {
                let rect = self.bb_without_edges(design, net);
                self.box_cost(&rect, design.netlist.net(net).pins.len())
            })
            .sum()
    }

    /// Stages the net's box after a move and returns the change in its cost.
    /// `moved` carries the old and new tile of the single moved pin; `None`
    /// rebuilds the box from the (already moved) pins.
    pub fn propose(
        &mut self,
        design: &Design,
        net: NetId,
        moved: Option<((usize, usize), (usize, usize))>,
    ) -> f64 {
        let i = net.index();
        let large = design.netlist.net(net).num_sinks() >= SMALL_NET;
        let (rect, edges) = match moved {
            Some((old, new)) if large => self
                .update_bb(&self.bb_coords[i], &self.bb_edges[i], old, new)
                .unwrap_or_else(|| self.bb_from_scratch(design, net)),
            _ => self.net_box(design, net),
        };
        let cost = self.box_cost(&rect, design.netlist.net(net).pins.len());
        let delta = cost - self.net_cost[i];
        self.pending.push(PendingBox {
            net,
            rect,
            edges,
            cost,
        });
        delta
    }

    /// Staged boxes with the boxes they would replace.
    pub fn pending_boxes(&self) -> impl Iterator<Item = (NetId, GridRect, GridRect)> + '_ {
        self.pending
            .iter()
            .map(|p| (p.net, self.bb_coords[p.net.index()], p.rect))
    }

    pub fn commit(&mut self) {
        for p in self.pending.drain(..) {
            let i = p.net.index();
            self.bb_coords[i] = p.rect;
            self.bb_edges[i] = p.edges;
            self.net_cost[i] = p.cost;
        }
    }

    pub fn discard(&mut self) {
        self.pending.clear();
    }
}

/// One axis of [`BBoxCostModel::update_bb`]: returns the new `min, max` and
/// their edge counts.
fn update_axis(
    old: usize,
    new: usize,
    min: usize,
    max: usize,
    emin: usize,
    emax: usize,
) -> Option<(usize, usize, usize, usize)> {
    if new < old {
        let (nmax, nemax) = if old == max {
            if emax == 1 {
                return None;
            }
            (max, emax - 1)
        } else {
            (max, emax)
        };
        let (nmin, nemin) = if new < min {
            (new, 1)
        } else if new == min {
            (min, emin + 1)
        } else {
            (min, emin)
        };
        Some((nmin, nmax, nemin, nemax))
    } else if new > old {
        let (nmin, nemin) = if old == min {
            if emin == 1 {
                return None;
            }
            (min, emin - 1)
        } else {
            (min, emin)
        };
        let (nmax, nemax) = if new > max {
            (new, 1)
        } else if new == max {
            (max, emax + 1)
        } else {
            (max, emax)
        };
        Some((nmin, nmax, nemin, nemax))
    } else {
        Some((min, max, emin, emax))
    }
}

/// `fact[high][low] = ((high - low + 1) / sum(widths[low..=high])) ^ exp`.
fn channel_factors(widths: &[usize], exp: f64) -> Vec<Vec<f64>> {
    let n = widths.len();
    let mut fact = vec![vec![0.0; n]; n];
    fact[0][0] = widths[0] as f64;
    for high in 1..n {
        fact[high][high] = widths[high] as f64;
        for low in 0..high {
            fact[high][low] = fact[high - 1][low] + widths[high] as f64;
        }
    }
    for (high, row) in fact.iter_mut().enumerate() {
        for (low, v) in row.iter_mut().enumerate().take(high + 1) {
            *v = ((high - low + 1) as f64 / *v).powf(exp);
        }
    }
    fact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_count_table_and_extrapolation() {
        assert_eq!(cross_count(2), 1.0);
        assert_eq!(cross_count(50), 2.7933);
        assert!((cross_count(60) - (2.7933 + 0.2616)).abs() < 1e-12);
    }

    #[test]
    fn uniform_channels_give_inverse_width() {
        let fact = channel_factors(&[4, 4, 4], 1.0);
        assert_eq!(fact[0][0], 0.25);
        assert_eq!(fact[2][0], 0.25);
        assert_eq!(fact[2][1], 0.25);
        let squared = channel_factors(&[4, 4, 4], 2.0);
        assert_eq!(squared[1][0], 0.0625);
    }

    #[test]
    fn narrow_channel_raises_the_factor() {
        let fact = channel_factors(&[2, 6], 1.0);
        assert_eq!(fact[1][0], 2.0 / 8.0);
        assert_eq!(fact[0][0], 0.5);
    }

    #[test]
    fn axis_update_moves_edges() {
        // Pins at 2, 2, 5: moving one of the two at xmin to the right.
        assert_eq!(update_axis(2, 3, 2, 5, 2, 1), Some((2, 5, 1, 1)));
        // The only pin on xmax moves left: ambiguous.
        assert_eq!(update_axis(5, 3, 2, 5, 2, 1), None);
        // Moving past the current min.
        assert_eq!(update_axis(4, 1, 2, 5, 1, 1), Some((1, 5, 1, 1)));
        // Landing on the max edge.
        assert_eq!(update_axis(3, 5, 2, 5, 1, 1), Some((2, 5, 1, 2)));
        assert_eq!(update_axis(3, 3, 2, 5, 1, 1), Some((2, 5, 1, 1)));
    }
}
