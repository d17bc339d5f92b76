use super::cost::{RoutingStrategy, SearchContext};
use super::heap::{Frontier, HeapEntry};
use crate::rr_graph::RRNodeType;
use fabric_common::db::indices::{RRNodeId, SwitchId};
use fabric_common::geom::rect::GridRect;

/// A node the search may start from.
#[derive(Clone, Copy, Debug)]
pub struct Seed {
    pub node: RRNodeId,
    pub backward_cost: f64,
    pub r_upstream: f64,
}

/// One node of a found path and the switch that drives it from the
/// previous step (`None` for the first node).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathStep {
    pub node: RRNodeId,
    pub switch: Option<SwitchId>,
}

/// Single-sink A* over the routing-resource graph. Per-node costs are only
/// valid for the current tag, so starting a new search is O(1).
#[derive(Clone, Debug)]
pub struct MazeRouter {
    path_cost: Vec<f64>,
    backward_cost: Vec<f64>,
    prev: Vec<Option<(RRNodeId, SwitchId)>>,
    visited_tag: Vec<u32>,
    current_tag: u32,
    frontier: Frontier,
    pub expansions: usize,
}

impl MazeRouter {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            path_cost: vec![f64::INFINITY; num_nodes],
            backward_cost: vec![f64::INFINITY; num_nodes],
            prev: vec![None; num_nodes],
            visited_tag: vec![0; num_nodes],
            current_tag: 1,
            frontier: Frontier::new(),
            expansions: 0,
        }
    }

    fn reset(&mut self) {
        self.frontier.clear();
        self.current_tag += 1;
        if self.current_tag == 0 {
            self.visited_tag.fill(0);
            self.current_tag = 1;
        }
    }

    #[inline(always)]
    fn known(&self, node: RRNodeId) -> bool {
        self.visited_tag[node.index()] == self.current_tag
    }

    #[inline(always)]
    fn known_path_cost(&self, node: RRNodeId) -> f64 {
        if self.known(node) { self.path_cost[node.index()] } else { f64::INFINITY }
    }

    #[inline(always)]
    fn known_backward_cost(&self, node: RRNodeId) -> f64 {
        if self.known(node) { self.backward_cost[node.index()] } else { f64::INFINITY }
    }

    fn push(
        &mut self,
        node: RRNodeId,
        total_cost: f64,
        backward_cost: f64,
        r_upstream: f64,
        prev: Option<(RRNodeId, SwitchId)>,
    ) {
        if total_cost >= self.known_path_cost(node) {
            return;
        }
        self.frontier.push(node, total_cost, backward_cost, r_upstream, prev);
    }

    /// Finds the cheapest path from any seed to `target`, never leaving `bb`
    /// and never entering an input pin of another block. Returns the path
    /// from its seed to `target`, or `None` once the frontier runs dry.
    pub fn route_to_sink<S: RoutingStrategy + ?Sized>(
        &mut self,
        ctx: &SearchContext,
        strategy: &S,
        seeds: impl IntoIterator<Item = Seed>,
        target: RRNodeId,
        bb: &GridRect,
        astar_fac: f64,
    ) -> Option<Vec<PathStep>> {
        self.reset();
        for seed in seeds {
            let total = seed.backward_cost
                + astar_fac * strategy.expected_cost(ctx, seed.node, target, seed.r_upstream);
            self.push(seed.node, total, seed.backward_cost, seed.r_upstream, None);
        }

        let sink = ctx.graph.node(target);
        let (target_x, target_y) = (sink.xhigh, sink.yhigh);

        while let Some(entry) = self.frontier.pop() {
            if entry.node == target {
                return self.trace_path(&entry);
            }

            let idx = entry.node.index();
            let old_total = self.known_path_cost(entry.node);
            let old_backward = self.known_backward_cost(entry.node);
            // Re-expand only when both the known backward cost and the
            // estimated total improve; otherwise loops can form.
            if !(old_total > entry.total_cost && old_backward > entry.backward_cost) {
                continue;
            }
            self.visited_tag[idx] = self.current_tag;
            self.path_cost[idx] = entry.total_cost;
            self.backward_cost[idx] = entry.backward_cost;
            self.prev[idx] = entry.prev;
            self.expansions += 1;

            for edge in ctx.graph.edges(entry.node) {
                let to = ctx.graph.node(edge.to);
                if to.outside(bb) {
                    continue;
                }
                if to.kind == RRNodeType::Ipin && (to.xhigh != target_x || to.yhigh != target_y) {
                    continue;
                }
                let step = strategy.step(ctx, &entry, edge.to, edge.switch);
                let total = step.backward_cost
                    + astar_fac * strategy.expected_cost(ctx, edge.to, target, step.r_upstream);
                self.push(
                    edge.to,
                    total,
                    step.backward_cost,
                    step.r_upstream,
                    Some((entry.node, edge.switch)),
                );
            }
        }
        None
    }

    fn trace_path(&self, reached: &HeapEntry) -> Option<Vec<PathStep>> {
        let mut path = Vec::new();
        let mut node = reached.node;
        let mut link = reached.prev;
        loop {
            path.push(PathStep {
                node,
                switch: link.map(|(_, sw)| sw),
            });
            let Some((from, _)) = link else { break };
            if path.len() > self.prev.len() {
                log::error!("predecessor chain from {:?} does not end at a seed", reached.node);
                return None;
            }
            node = from;
            link = self.prev[from.index()];
        }
        path.reverse();
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::cost::{DirectedSearch, TimingDriven};
    use crate::congestion::CongestionMap;
    use crate::rr_graph::{load_indexed_data, RRGraph, RRNode};
    use crate::rr_graph::{CHANX_COST_INDEX_START, OPIN_COST_INDEX, SINK_COST_INDEX, SOURCE_COST_INDEX};
    use fabric_common::db::arch::{SegmentInfo, SwitchInfo, DELAYLESS_SWITCH};
    use fabric_common::util::config::BaseCostType;

    /// SOURCE -> OPIN -> {short wire, long detour of three wires} -> SINK.
    fn diamond() -> RRGraph {
        let sw = SwitchInfo {
            name: "sw".into(),
            buffered: true,
            r: 0.0,
            c_in: 0.0,
            c_out: 0.0,
            t_del: 0.0,
        };
        let mut g = RRGraph::new(vec![sw.clone(), sw], 1);
        let chanx = CHANX_COST_INDEX_START;
        let source = g.add_node(RRNode::new(RRNodeType::Source, GridRect::point(1, 1), 0, 1, SOURCE_COST_INDEX));
        let opin = g.add_node(RRNode::new(RRNodeType::Opin, GridRect::point(1, 1), 0, 1, OPIN_COST_INDEX));
        let short = g.add_node(RRNode::new(RRNodeType::ChanX, GridRect::new(1, 2, 1, 1), 0, 1, chanx));
        let d1 = g.add_node(RRNode::new(RRNodeType::ChanX, GridRect::new(1, 1, 1, 1), 1, 1, chanx));
        let d2 = g.add_node(RRNode::new(RRNodeType::ChanX, GridRect::new(1, 1, 1, 1), 2, 1, chanx));
        let d3 = g.add_node(RRNode::new(RRNodeType::ChanX, GridRect::new(2, 2, 1, 1), 3, 1, chanx));
        let sink = g.add_node(RRNode::new(RRNodeType::Sink, GridRect::point(2, 1), 0, 1, SINK_COST_INDEX));
        let s = SwitchId::new(1);
        g.add_edge(source, opin, DELAYLESS_SWITCH);
        g.add_edge(opin, d1, s);
        g.add_edge(opin, short, s);
        g.add_edge(d1, d2, s);
        g.add_edge(d2, d3, s);
        g.add_edge(d3, sink, s);
        g.add_edge(short, sink, s);
        let seg = SegmentInfo {
            length: 1,
            frequency: 1.0,
            r_metal: 0.0,
            c_metal: 0.0,
            wire_switch: s,
            opin_switch: s,
        };
        load_indexed_data(&mut g, &[seg], s, BaseCostType::DemandOnly);
        g
    }

    fn seed(node: u32) -> Seed {
        Seed {
            node: RRNodeId(node),
            backward_cost: 0.0,
            r_upstream: 0.0,
        }
    }

    #[test]
    fn finds_cheapest_path_from_source() {
        let g = diamond();
        let cong = CongestionMap::new(&g);
        let ctx = SearchContext {
            graph: &g,
            congestion: &cong,
            costs: &g.cost_index,
            bend_cost: 0.0,
        };
        let bb = GridRect::new(0, 3, 0, 3);
        let mut router = MazeRouter::new(g.num_nodes());
        let path = router
            .route_to_sink(&ctx, &DirectedSearch, [seed(0)], RRNodeId(6), &bb, 1.0)
            .unwrap();
        let nodes: Vec<u32> = path.iter().map(|s| s.node.0).collect();
        assert_eq!(nodes, vec![0, 1, 2, 6]);
        assert_eq!(path[0].switch, None);
        assert_eq!(path[1].switch, Some(DELAYLESS_SWITCH));

        // Same answer with the timing policy at any criticality.
        let path = router
            .route_to_sink(&ctx, &TimingDriven { criticality: 0.5 }, [seed(0)], RRNodeId(6), &bb, 1.0)
            .unwrap();
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn bounding_box_prunes_and_reports_failure() {
        let g = diamond();
        let cong = CongestionMap::new(&g);
        let ctx = SearchContext {
            graph: &g,
            congestion: &cong,
            costs: &g.cost_index,
            bend_cost: 0.0,
        };
        let mut router = MazeRouter::new(g.num_nodes());
        let bb = GridRect::new(0, 1, 0, 3);
        assert!(router
            .route_to_sink(&ctx, &DirectedSearch, [seed(0)], RRNodeId(6), &bb, 1.0)
            .is_none());
    }

    #[test]
    fn search_starts_from_any_seed() {
        let g = diamond();
        let cong = CongestionMap::new(&g);
        let ctx = SearchContext {
            graph: &g,
            congestion: &cong,
            costs: &g.cost_index,
            bend_cost: 0.0,
        };
        let mut router = MazeRouter::new(g.num_nodes());
        let bb = GridRect::new(0, 3, 0, 3);
        let path = router
            .route_to_sink(&ctx, &DirectedSearch, [seed(0), seed(4)], RRNodeId(6), &bb, 1.0)
            .unwrap();
        assert_eq!(path.first().map(|s| s.node), Some(RRNodeId(4)));
        assert_eq!(path.len(), 3);
    }
}
