use crate::rr_graph::{NetTerminals, RRGraph};

/// Order in which the directed-search router connects a net's sinks: the
/// order Prim's algorithm adds them to a Manhattan spanning tree grown from
/// the source. Returns net pin numbers (1-based).
pub fn spanning_order(graph: &RRGraph, terminals: &NetTerminals) -> Vec<usize> {
    let loc = |id| {
        let n = graph.node(id);
        (n.xlow as i64, n.ylow as i64)
    };
    let sinks: Vec<(i64, i64)> = terminals.sinks.iter().map(|&s| loc(s)).collect();
    let dist = |a: (i64, i64), b: (i64, i64)| (a.0 - b.0).abs() + (a.1 - b.1).abs();

    // Distance from each sink to the nearest point already in the tree.
    let source = loc(terminals.source);
    let mut best: Vec<i64> = sinks.iter().map(|&s| dist(source, s)).collect();
    let mut in_tree = vec![false; sinks.len()];
    let mut order = Vec::with_capacity(sinks.len());

    for _ in 0..sinks.len() {
        let Some(next) = (0..sinks.len())
            .filter(|&i| !in_tree[i])
            .min_by_key(|&i| (best[i], i))
        else {
            break;
        };
        in_tree[next] = true;
        order.push(next + 1);
        for i in 0..sinks.len() {
            if !in_tree[i] {
                best[i] = best[i].min(dist(sinks[next], sinks[i]));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr_graph::{RRNode, RRNodeType, SINK_COST_INDEX, SOURCE_COST_INDEX};
    use fabric_common::geom::rect::GridRect;

    #[test]
    fn grows_from_source_through_nearest_sinks() {
        let mut g = RRGraph::new(Vec::new(), 1);
        let source = g.add_node(RRNode::new(RRNodeType::Source, GridRect::point(0, 0), 0, 1, SOURCE_COST_INDEX));
        let mut sink = |x, y| g.add_node(RRNode::new(RRNodeType::Sink, GridRect::point(x, y), 0, 1, SINK_COST_INDEX));
        // Pin 1 is far away but close to pin 3, which hangs off pin 2.
        let sinks = vec![sink(9, 0), sink(3, 0), sink(6, 0)];
        let terminals = NetTerminals {
            source,
            sinks,
            bb: GridRect::new(0, 10, 0, 10),
        };
        assert_eq!(spanning_order(&g, &terminals), vec![2, 3, 1]);
    }
}
