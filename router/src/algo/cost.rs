//! Path-cost policies for the maze search. The two router variants differ
//! only in how a step is priced and how the remaining distance is guessed.

use super::heap::HeapEntry;
use crate::congestion::CongestionMap;
use crate::rr_graph::{CostIndexData, RRGraph, RRNodeType, IPIN_COST_INDEX, SINK_COST_INDEX};
use fabric_common::db::indices::{RRNodeId, SwitchId};

/// Read-only view of everything a step or heuristic needs.
pub struct SearchContext<'a> {
    pub graph: &'a RRGraph,
    pub congestion: &'a CongestionMap,
    /// Cost-index table, possibly fanout-scaled for the current net.
    pub costs: &'a [CostIndexData],
    pub bend_cost: f64,
}

impl SearchContext<'_> {
    /// `base * history * present` for entering `node`.
    #[inline]
    pub fn cong_cost(&self, node: RRNodeId) -> f64 {
        self.costs[self.graph.node(node).cost_index].base_cost * self.congestion.penalty(node)
    }

    fn bend(&self, from: RRNodeId, to: RRNodeId) -> f64 {
        if self.bend_cost == 0.0 {
            return 0.0;
        }
        match (self.graph.node(from).kind, self.graph.node(to).kind) {
            (RRNodeType::ChanX, RRNodeType::ChanY) | (RRNodeType::ChanY, RRNodeType::ChanX) => self.bend_cost,
            _ => 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StepCost {
    pub backward_cost: f64,
    pub r_upstream: f64,
}

pub trait RoutingStrategy {
    /// Backward cost of an already-routed node of the net when it seeds the
    /// search for the next sink; `t_del` is its Elmore delay.
    fn seed_cost(&self, t_del: f64) -> f64;

    fn step(&self, ctx: &SearchContext, from: &HeapEntry, to: RRNodeId, switch: SwitchId) -> StepCost;

    fn expected_cost(&self, ctx: &SearchContext, node: RRNodeId, target: RRNodeId, r_upstream: f64) -> f64;
}

/// Congestion-only search.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectedSearch;

impl RoutingStrategy for DirectedSearch {
    fn seed_cost(&self, _t_del: f64) -> f64 {
        0.0
    }

    fn step(&self, ctx: &SearchContext, from: &HeapEntry, to: RRNodeId, _switch: SwitchId) -> StepCost {
        StepCost {
            backward_cost: from.backward_cost + ctx.cong_cost(to) + ctx.bend(from.node, to),
            r_upstream: 0.0,
        }
    }

    fn expected_cost(&self, ctx: &SearchContext, node: RRNodeId, target: RRNodeId, _r_upstream: f64) -> f64 {
        let n = ctx.graph.node(node);
        match n.kind {
            RRNodeType::ChanX | RRNodeType::ChanY => {
                let (same, ortho) = expected_segs_to_target(ctx.graph, ctx.costs, node, target);
                let entry = &ctx.costs[n.cost_index];
                let ortho_entry = &ctx.costs[entry.ortho_cost_index.unwrap_or(n.cost_index)];
                same * entry.base_cost
                    + ortho * ortho_entry.base_cost
                    + ctx.costs[IPIN_COST_INDEX].base_cost
                    + ctx.costs[SINK_COST_INDEX].base_cost
            }
            RRNodeType::Ipin => ctx.costs[SINK_COST_INDEX].base_cost,
            _ => 0.0,
        }
    }
}

/// Blends Elmore delay and congestion by the criticality of the sink being
/// routed.
#[derive(Clone, Copy, Debug)]
pub struct TimingDriven {
    pub criticality: f64,
}

impl RoutingStrategy for TimingDriven {
    fn seed_cost(&self, t_del: f64) -> f64 {
        self.criticality * t_del
    }

    fn step(&self, ctx: &SearchContext, from: &HeapEntry, to: RRNodeId, switch: SwitchId) -> StepCost {
        let sw = ctx.graph.switch(switch);
        let node = ctx.graph.node(to);
        let mut r_upstream = if sw.buffered { sw.r } else { from.r_upstream + sw.r };
        let t_del = node.c * (r_upstream + 0.5 * node.r) + sw.t_del;
        r_upstream += node.r;

        let backward_cost = from.backward_cost
            + (1.0 - self.criticality) * ctx.cong_cost(to)
            + self.criticality * t_del
            + ctx.bend(from.node, to);
        StepCost {
            backward_cost,
            r_upstream,
        }
    }

    fn expected_cost(&self, ctx: &SearchContext, node: RRNodeId, target: RRNodeId, r_upstream: f64) -> f64 {
        let n = ctx.graph.node(node);
        match n.kind {
            RRNodeType::ChanX | RRNodeType::ChanY => {
                let (same, ortho) = expected_segs_to_target(ctx.graph, ctx.costs, node, target);
                let entry = &ctx.costs[n.cost_index];
                let ortho_entry = &ctx.costs[entry.ortho_cost_index.unwrap_or(n.cost_index)];
                let ipin = &ctx.costs[IPIN_COST_INDEX];

                let cong = same * entry.base_cost
                    + ortho * ortho_entry.base_cost
                    + ipin.base_cost
                    + ctx.costs[SINK_COST_INDEX].base_cost;
                let t_del = same * entry.t_linear
                    + ortho * ortho_entry.t_linear
                    + same * same * entry.t_quadratic
                    + ortho * ortho * ortho_entry.t_quadratic
                    + r_upstream * (same * entry.c_load + ortho * ortho_entry.c_load)
                    + ipin.t_linear;
                self.criticality * t_del + (1.0 - self.criticality) * cong
            }
            RRNodeType::Ipin => ctx.costs[SINK_COST_INDEX].base_cost,
            _ => 0.0,
        }
    }
}

#[inline]
fn round_up(x: f64) -> f64 {
    (x - 0.001).ceil()
}

/// Wires of `node`'s type still needed along its own axis and across it to
/// reach `target`, `(same, ortho)`. A wire that already runs past the target
/// row or column needs no orthogonal wires.
pub fn expected_segs_to_target(
    graph: &RRGraph,
    costs: &[CostIndexData],
    node: RRNodeId,
    target: RRNodeId,
) -> (f64, f64) {
    let n = graph.node(node);
    let t = graph.node(target);
    let entry = &costs[n.cost_index];
    let inv_length = entry.inv_length;
    let ortho_inv_length = entry
        .ortho_cost_index
        .map(|o| costs[o].inv_length)
        .unwrap_or(inv_length);

    let (lo, hi, across, t_along, t_across) = match n.kind {
        RRNodeType::ChanX => (n.xlow, n.xhigh, n.ylow, t.xlow, t.ylow),
        _ => (n.ylow, n.yhigh, n.xlow, t.ylow, t.xlow),
    };
    let (lo, hi, across) = (lo as i64, hi as i64, across as i64);
    let (t_along, t_across) = (t_along as i64, t_across as i64);

    let (ortho, pass) = if across > t_across {
        (round_up((across - t_across + 1) as f64 * ortho_inv_length), 1)
    } else if across < t_across - 1 {
        (round_up((t_across - across) as f64 * ortho_inv_length), 1)
    } else {
        (0.0, 0)
    };

    let same = if lo > t_along + pass {
        round_up((lo - pass - t_along) as f64 * inv_length)
    } else if hi < t_along - pass {
        round_up((t_along - pass - hi) as f64 * inv_length)
    } else {
        0.0
    };
    (same, ortho)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr_graph::{RRNode, CHANX_COST_INDEX_START};
    use fabric_common::geom::rect::GridRect;

    fn graph_with(nodes: Vec<RRNode>) -> (RRGraph, Vec<CostIndexData>) {
        let mut graph = RRGraph::new(Vec::new(), 1);
        for n in nodes {
            graph.add_node(n);
        }
        let mut costs = vec![CostIndexData::default(); CHANX_COST_INDEX_START + 2];
        for (idx, ortho) in [(4, 5), (5, 4)] {
            costs[idx].inv_length = 1.0;
            costs[idx].ortho_cost_index = Some(ortho);
            costs[idx].segment = Some(0);
        }
        (graph, costs)
    }

    #[test]
    fn wire_beside_target_needs_no_segments() {
        let (graph, costs) = graph_with(vec![
            RRNode::new(RRNodeType::ChanX, GridRect::new(2, 2, 3, 3), 0, 1, 4),
            RRNode::new(RRNodeType::Sink, GridRect::point(2, 3), 0, 1, 1),
        ]);
        assert_eq!(
            expected_segs_to_target(&graph, &costs, RRNodeId::new(0), RRNodeId::new(1)),
            (0.0, 0.0)
        );
    }

    #[test]
    fn distant_wire_counts_both_directions() {
        // CHANX row 0, columns 1..1; target block at (5, 4).
        let (graph, costs) = graph_with(vec![
            RRNode::new(RRNodeType::ChanX, GridRect::new(1, 1, 0, 0), 0, 1, 4),
            RRNode::new(RRNodeType::Sink, GridRect::point(5, 4), 0, 1, 1),
        ]);
        let (same, ortho) = expected_segs_to_target(&graph, &costs, RRNodeId::new(0), RRNodeId::new(1));
        assert_eq!(ortho, 4.0);
        assert_eq!(same, 3.0);
    }
}
