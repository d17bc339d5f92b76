//! Move generation and evaluation: pick a block, pick a legal destination
//! within the range limit, price the swap incrementally and accept or roll
//! it back.

use crate::cost::DelayModel;
use crate::cost::bbox::pin_tile;
use crate::state::PlacementState;
use fabric_common::db::core::Design;
use fabric_common::db::indices::{BlockId, NetId};
use fabric_common::db::netlist::NetPin;
use fabric_common::geom::coord::GridCoord;
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted,
    Rejected,
    /// No legal destination in range; nothing was evaluated.
    Aborted,
}

/// Metropolis criterion. `sample` is a uniform draw in `[0, 1)`.
pub fn metropolis_accept(delta_c: f64, t: f64, sample: f64) -> bool {
    if delta_c <= 0.0 {
        return true;
    }
    if t == 0.0 {
        return false;
    }
    (-delta_c / t).exp() > sample
}

/// Random destination tile for a block of the type at `from`, within
/// `rlim` of it. `None` when the window cannot offer a different location.
pub fn find_to<R: Rng>(design: &Design, from: GridCoord, rlim: f64, rng: &mut R) -> Option<GridCoord> {
    let grid = &design.grid;
    let (nx, ny) = (grid.nx, grid.ny);
    let type_id = grid.tile(from.x, from.y).block_type?;
    let block_type = design.arch.block_type(type_id);

    let rlx = (rlim as usize).min(nx + 1).max(1);
    let rly = (rlim as usize).min(ny + 1).max(1);
    let min_x = from.x.saturating_sub(rlx);
    let max_x = (from.x + rlx).min(nx + 1);
    let min_y = from.y.saturating_sub(rly);
    let max_y = (from.y + rly).min(ny + 1);

    const MAX_TRIES: usize = 100;

    let (x, y) = if block_type.is_io {
        let perimeter = 2 * (nx + ny);
        let from_pos = perimeter_position(nx, ny, from.x, from.y)?;
        let mut found = None;
        for _ in 0..MAX_TRIES {
            let pos = if rlx >= nx {
                rng.gen_range(0..perimeter)
            } else {
                let arc = rlx.max(rly);
                let offset = rng.gen_range(0..=2 * arc);
                (from_pos + perimeter + offset - arc) % perimeter
            };
            let (x, y) = perimeter_tile(nx, ny, pos);
            if (x, y) != (from.x, from.y) {
                found = Some((x, y));
                break;
            }
        }
        found?
    } else {
        let columns: Vec<usize> = (min_x.max(1)..=max_x.min(nx))
            .filter(|&x| grid.tile(x, 1).block_type == Some(type_id))
            .collect();
        // Anchor rows repeat identically in every column of a type.
        let rows: Vec<usize> = (min_y.max(1)..=max_y.min(ny))
            .filter(|&y| {
                let tile = grid.tile(from.x, y);
                tile.block_type == Some(type_id) && tile.offset == 0
            })
            .collect();
        if columns.len() * rows.len() < 2 {
            return None;
        }
        let mut found = None;
        for _ in 0..MAX_TRIES {
            let x = columns[rng.gen_range(0..columns.len())];
            let y = rows[rng.gen_range(0..rows.len())];
            let tile = grid.tile(x, y);
            if tile.block_type != Some(type_id) || tile.offset != 0 {
                continue;
            }
            if (x, y) != (from.x, from.y) {
                found = Some((x, y));
                break;
            }
        }
        found?
    };

    let slots = grid.tile(x, y).blocks.len();
    let z = if slots > 1 { rng.gen_range(0..slots) } else { 0 };
    Some(GridCoord::new(x, y, z))
}

/// Clockwise position along the I/O ring, starting at `(1, 0)`.
fn perimeter_position(nx: usize, ny: usize, x: usize, y: usize) -> Option<usize> {
    if y == 0 && (1..=nx).contains(&x) {
        Some(x - 1)
    } else if x == nx + 1 && (1..=ny).contains(&y) {
        Some(nx + y - 1)
    } else if y == ny + 1 && (1..=nx).contains(&x) {
        Some(nx + ny + (nx - x))
    } else if x == 0 && (1..=ny).contains(&y) {
        Some(2 * nx + ny + (ny - y))
    } else {
        None
    }
}

fn perimeter_tile(nx: usize, ny: usize, pos: usize) -> (usize, usize) {
    if pos < nx {
        (pos + 1, 0)
    } else if pos < nx + ny {
        (nx + 1, pos - nx + 1)
    } else if pos < 2 * nx + ny {
        (nx - (pos - nx - ny), ny + 1)
    } else {
        (0, ny - (pos - 2 * nx - ny))
    }
}

/// Nets a swap may change, with whether both blocks touch them.
fn affected_nets(design: &Design, b_from: BlockId, b_to: Option<BlockId>) -> Vec<(NetId, bool)> {
    let mut nets: Vec<(NetId, bool)> = Vec::new();
    for block in std::iter::once(b_from).chain(b_to) {
        for net in design.netlist.block_nets(block) {
            if design.netlist.net(net).is_global {
                continue;
            }
            match nets.iter_mut().find(|(n, _)| *n == net) {
                Some(entry) => entry.1 = true,
                None => nets.push((net, false)),
            }
        }
    }
    nets
}

/// The single pin `block` has on `net`.
fn block_pin_on(design: &Design, net: NetId, block: BlockId) -> Option<NetPin> {
    design
        .netlist
        .net(net)
        .pins
        .iter()
        .copied()
        .find(|p| p.block == block)
}

/// Proposes one swap and accepts or rejects it at temperature `t`.
pub fn try_swap<R: Rng>(
    state: &mut PlacementState,
    design: &mut Design,
    model: &dyn DelayModel,
    rng: &mut R,
    t: f64,
    rlim: f64,
) -> MoveOutcome {
    if state.movable.is_empty() {
        return MoveOutcome::Aborted;
    }
    let b_from = state.movable[rng.gen_range(0..state.movable.len())];
    let from = design.netlist.block(b_from).loc;

    let rlim = if state.rlim_escape_fraction > 0.0
        && rng.gen_range(0.0..1.0) < state.rlim_escape_fraction
    {
        design.grid.nx.max(design.grid.ny) as f64 + 1.0
    } else {
        rlim
    };

    let Some(to) = find_to(design, from, rlim, rng) else {
        return MoveOutcome::Aborted;
    };
    let b_to = design.grid.block_at(to);
    if let Some(b) = b_to {
        if design.netlist.block(b).is_fixed {
            return MoveOutcome::Aborted;
        }
    }

    // Tentative move on the block records only; the grid follows on accept.
    design.netlist.blocks[b_from.index()].loc = to;
    if let Some(b) = b_to {
        design.netlist.blocks[b.index()].loc = from;
    }

    let mut bb_delta = 0.0;
    for (net, both) in affected_nets(design, b_from, b_to) {
        let duplicated = design.netlist.has_duplicate_blocks(net);
        if both && !duplicated {
            // A swap inside the net leaves its pins where they were, unless
            // the two pins sit on different rows of tall blocks.
            let row = |b: BlockId| {
                block_pin_on(design, net, b).map(|p| pin_tile(design, p, GridCoord::default()).1)
            };
            if b_to.is_some_and(|b| row(b) == row(b_from)) {
                continue;
            }
        }
        let moved = if duplicated || both {
            None
        } else {
            let (block, old_loc, new_loc) = match block_pin_on(design, net, b_from) {
                Some(_) => (b_from, from, to),
                None => (b_to.unwrap_or(b_from), to, from),
            };
            block_pin_on(design, net, block)
                .map(|pin| (pin_tile(design, pin, old_loc), pin_tile(design, pin, new_loc)))
        };
        bb_delta += state.bb.propose(design, net, moved);
    }

    if let Some(regions) = state.regions.as_mut() {
        for (net, old, new) in state.bb.pending_boxes() {
            let num_pins = design.netlist.net(net).pins.len();
            regions.update_occupancy(&old, num_pins, -1.0);
            regions.update_occupancy(&new, num_pins, 1.0);
        }
        bb_delta = regions.cost() - state.bb_cost;
    }

    let (mut timing_delta, mut delay_delta) = (0.0, 0.0);
    if let Some(timing) = state.timing.as_mut() {
        for block in std::iter::once(b_from).chain(b_to) {
            let (dt, dd) = timing.propose_block(design, model, block, b_from, b_to);
            timing_delta += dt;
            delay_delta += dd;
        }
    }

    let delta_c = state.combine(bb_delta, timing_delta);
    let sample = rng.gen_range(0.0..1.0);

    if metropolis_accept(delta_c, t, sample) {
        state.cost += delta_c;
        state.bb_cost += bb_delta;
        state.timing_cost += timing_delta;
        state.delay_cost += delay_delta;
        state.bb.commit();
        if let Some(timing) = state.timing.as_mut() {
            timing.commit();
        }

        design.grid.set_block(to, Some(b_from));
        design.grid.set_block(from, b_to);
        MoveOutcome::Accepted
    } else {
        design.netlist.blocks[b_from.index()].loc = from;
        if let Some(b) = b_to {
            design.netlist.blocks[b.index()].loc = to;
        }
        if let Some(regions) = state.regions.as_mut() {
            for (net, old, new) in state.bb.pending_boxes() {
                let num_pins = design.netlist.net(net).pins.len();
                regions.update_occupancy(&new, num_pins, -1.0);
                regions.update_occupancy(&old, num_pins, 1.0);
            }
        }
        state.bb.discard();
        if let Some(timing) = state.timing.as_mut() {
            timing.discard();
        }
        MoveOutcome::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_common::util::config::{BenchmarkConfig, DeviceConfig};
    use fabric_common::util::generator::generate_design;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    /// 8x8 core with a single column of height-2 multipliers at x = 4.
    fn mult_column_design() -> Design {
        let mut device = DeviceConfig::default();
        device.nx = 8;
        device.ny = 8;
        device.hard_block.start = 4;
        device.hard_block.repeat = 0;
        device.hard_block.height = 2;
        let bench = BenchmarkConfig {
            num_logic_blocks: 10,
            num_inputs: 2,
            num_outputs: 2,
            num_hard_blocks: 1,
            ..BenchmarkConfig::default()
        };
        generate_design(&device, &bench).unwrap()
    }

    fn destinations(design: &Design, from: GridCoord, rlim: f64) -> HashSet<(usize, usize)> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..2000)
            .filter_map(|_| find_to(design, from, rlim, &mut rng))
            .map(|to| (to.x, to.y))
            .collect()
    }

    #[test]
    fn improving_moves_always_accepted() {
        for sample in [0.0, 0.5, 0.999] {
            assert!(metropolis_accept(-5.0, 10.0, sample));
            assert!(metropolis_accept(-5.0, 0.0, sample));
            assert!(metropolis_accept(0.0, 0.0, sample));
        }
    }

    #[test]
    fn worsening_moves_rejected_when_frozen() {
        for sample in [0.0, 0.5, 0.999] {
            assert!(!metropolis_accept(5.0, 0.0, sample));
        }
    }

    #[test]
    fn acceptance_rate_matches_boltzmann_factor() {
        let mut rng = StdRng::seed_from_u64(42);
        let trials = 200_000;
        let accepted = (0..trials)
            .filter(|_| metropolis_accept(5.0, 10.0, rng.gen_range(0.0..1.0)))
            .count();
        let rate = accepted as f64 / trials as f64;
        assert!((rate - (-0.5f64).exp()).abs() < 0.01, "rate {}", rate);
    }

    #[test]
    fn perimeter_positions_round_trip() {
        let (nx, ny) = (5, 3);
        for pos in 0..2 * (nx + ny) {
            let (x, y) = perimeter_tile(nx, ny, pos);
            assert_eq!(perimeter_position(nx, ny, x, y), Some(pos));
        }
        assert_eq!(perimeter_position(nx, ny, 0, 0), None);
    }

    #[test]
    fn destinations_stay_within_range_limit() {
        let design = mult_column_design();
        let from = GridCoord::new(2, 4, 0);
        let seen = destinations(&design, from, 1.0);
        assert!(!seen.is_empty());
        for &(x, y) in &seen {
            assert!(x.abs_diff(from.x) <= 1 && y.abs_diff(from.y) <= 1, "({}, {})", x, y);
            assert_eq!(design.grid.tile(x, y).block_type, Some(design.arch.fill_type));
            assert_ne!((x, y), (from.x, from.y));
        }
    }

    #[test]
    fn unit_range_reaches_every_neighbour_row_and_column() {
        let design = mult_column_design();
        let seen = destinations(&design, GridCoord::new(2, 4, 0), 1.0);
        let dx: HashSet<isize> = seen.iter().map(|&(x, _)| x as isize - 2).collect();
        let dy: HashSet<isize> = seen.iter().map(|&(_, y)| y as isize - 4).collect();
        assert_eq!(dx, HashSet::from([-1, 0, 1]));
        assert_eq!(dy, HashSet::from([-1, 0, 1]));

        // Bottom row: the window is cut by the ring, not folded onto row 1.
        let seen = destinations(&design, GridCoord::new(2, 1, 0), 1.0);
        assert!(seen.contains(&(2, 2)));
        assert!(seen.iter().all(|&(_, y)| (1..=2).contains(&y)));
    }

    #[test]
    fn tall_blocks_land_on_anchor_rows() {
        let design = mult_column_design();
        let mult = design.arch.type_by_name("mult").unwrap();
        assert_eq!(
            design.grid.anchors_of_type(mult),
            vec![(4, 1), (4, 3), (4, 5), (4, 7)]
        );
        let seen = destinations(&design, GridCoord::new(4, 3, 0), 2.0);
        assert_eq!(seen, HashSet::from([(4, 1), (4, 5)]));
        for &(x, y) in &seen {
            let tile = design.grid.tile(x, y);
            assert_eq!(tile.block_type, Some(mult));
            assert_eq!(tile.offset, 0);
        }
    }

    #[test]
    fn lone_anchor_in_window_has_no_destination() {
        let design = mult_column_design();
        let mut rng = StdRng::seed_from_u64(3);
        // Only (4, 3) itself is a multiplier anchor within one tile.
        for _ in 0..50 {
            assert_eq!(find_to(&design, GridCoord::new(4, 3, 0), 1.0, &mut rng), None);
        }
        assert!(find_to(&design, GridCoord::new(4, 3, 0), 2.0, &mut rng).is_some());
    }
}
