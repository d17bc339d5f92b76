use crate::rr_graph::RRGraph;
use fabric_common::db::indices::RRNodeId;

/// Per-node negotiation state. `pres_cost` always reflects the overuse
/// that one more net would cause at the current present-cost factor.
#[derive(Clone, Copy, Debug)]
struct NodeCongestion {
    occupancy: usize,
    capacity: usize,
    acc_cost: f64,
    pres_cost: f64,
}

#[derive(Clone, Debug)]
pub struct CongestionMap {
    nodes: Vec<NodeCongestion>,
}

impl CongestionMap {
    pub fn new(graph: &RRGraph) -> Self {
        Self {
            nodes: graph
                .nodes
                .iter()
                .map(|n| NodeCongestion {
                    occupancy: 0,
                    capacity: n.capacity,
                    acc_cost: 1.0,
                    pres_cost: 1.0,
                })
                .collect(),
        }
    }

    #[inline(always)]
    pub fn occupancy(&self, node: RRNodeId) -> usize {
        self.nodes[node.index()].occupancy
    }

    #[inline(always)]
    pub fn capacity(&self, node: RRNodeId) -> usize {
        self.nodes[node.index()].capacity
    }

    pub fn acc_cost(&self, node: RRNodeId) -> f64 {
        self.nodes[node.index()].acc_cost
    }

    pub fn pres_cost(&self, node: RRNodeId) -> f64 {
        self.nodes[node.index()].pres_cost
    }

    /// History times present penalty; the caller scales by the base cost.
    #[inline(always)]
    pub fn penalty(&self, node: RRNodeId) -> f64 {
        let n = &self.nodes[node.index()];
        n.acc_cost * n.pres_cost
    }

    /// Adds (`delta = 1`) or removes (`delta = -1`) one user of `node` and
    /// refreshes its present cost.
    pub fn adjust(&mut self, node: RRNodeId, delta: isize, pres_fac: f64) {
        let n = &mut self.nodes[node.index()];
        n.occupancy = n.occupancy.saturating_add_signed(delta);
        n.pres_cost = present_cost(n.occupancy, n.capacity, pres_fac);
    }

    /// End-of-iteration update: overused nodes accumulate history and every
    /// node at or over capacity is re-priced for the new `pres_fac`.
    pub fn update_costs(&mut self, pres_fac: f64, acc_fac: f64) {
        for n in &mut self.nodes {
            if n.occupancy > n.capacity {
                n.acc_cost += (n.occupancy - n.capacity) as f64 * acc_fac;
                n.pres_cost = present_cost(n.occupancy, n.capacity, pres_fac);
            } else if n.occupancy == n.capacity {
                n.pres_cost = 1.0 + pres_fac;
            }
        }
    }

    pub fn overused(&self) -> Vec<RRNodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.occupancy > n.capacity)
            .map(|(i, _)| RRNodeId::new(i))
            .collect()
    }

    pub fn is_feasible(&self) -> bool {
        self.nodes.iter().all(|n| n.occupancy <= n.capacity)
    }

    pub fn total_overuse(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.occupancy.saturating_sub(n.capacity))
            .sum()
    }

    pub fn occupancies(&self) -> Vec<usize> {
        self.nodes.iter().map(|n| n.occupancy).collect()
    }
}

#[inline]
fn present_cost(occupancy: usize, capacity: usize, pres_fac: f64) -> f64 {
    if occupancy < capacity {
        1.0
    } else {
        1.0 + (occupancy + 1 - capacity) as f64 * pres_fac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr_graph::{RRNode, RRNodeType, CHANX_COST_INDEX_START};
    use fabric_common::geom::rect::GridRect;

    fn map_with_one_wire() -> CongestionMap {
        let mut graph = RRGraph::new(Vec::new(), 1);
        graph.add_node(RRNode::new(
            RRNodeType::ChanX,
            GridRect::point(1, 1),
            0,
            1,
            CHANX_COST_INDEX_START,
        ));
        CongestionMap::new(&graph)
    }

    #[test]
    fn present_cost_prices_one_more_user() {
        let mut map = map_with_one_wire();
        let n = RRNodeId::new(0);
        map.adjust(n, 1, 0.5);
        assert_eq!(map.pres_cost(n), 1.5);
        map.adjust(n, 1, 0.5);
        assert_eq!(map.pres_cost(n), 2.0);
        assert!(!map.is_feasible());
        map.adjust(n, -1, 0.5);
        assert_eq!(map.occupancy(n), 1);
        assert!(map.is_feasible());
    }

    #[test]
    fn history_grows_only_on_overuse() {
        let mut map = map_with_one_wire();
        let n = RRNodeId::new(0);
        map.adjust(n, 1, 0.0);
        map.update_costs(0.5, 1.0);
        assert_eq!(map.acc_cost(n), 1.0);
        assert_eq!(map.pres_cost(n), 1.5);
        map.adjust(n, 1, 0.5);
        map.update_costs(1.0, 1.0);
        assert_eq!(map.acc_cost(n), 2.0);
        assert_eq!(map.pres_cost(n), 3.0);
        assert_eq!(map.overused(), vec![n]);
        assert_eq!(map.total_overuse(), 1);
    }
}
