//! Per-cost-index data: base congestion costs and the linear/quadratic
//! delay terms the timing-driven lookahead uses.

use super::{
    RRGraph, CHANX_COST_INDEX_START, IPIN_COST_INDEX, OPIN_COST_INDEX, SINK_COST_INDEX,
    SOURCE_COST_INDEX,
};
use fabric_common::db::arch::SegmentInfo;
use fabric_common::db::indices::SwitchId;
use fabric_common::util::config::BaseCostType;

/// Manhattan distance, in tiles, the delay normalisation is measured over.
const CLB_DIST: f64 = 3.0;

#[derive(Clone, Debug, Default)]
pub struct CostIndexData {
    pub base_cost: f64,
    /// Base cost before any per-net fanout scaling.
    pub saved_base_cost: f64,
    pub ortho_cost_index: Option<usize>,
    pub segment: Option<usize>,
    pub inv_length: f64,
    pub t_linear: f64,
    pub t_quadratic: f64,
    pub c_load: f64,
}

/// Fills `graph.cost_index`. Channel delay terms are averaged over the
/// wires of each index, so this runs after every node and edge exists.
pub fn load_indexed_data(
    graph: &mut RRGraph,
    segments: &[SegmentInfo],
    ipin_switch: SwitchId,
    base_cost_type: BaseCostType,
) {
    let nseg = segments.len();
    let mut table = vec![CostIndexData::default(); CHANX_COST_INDEX_START + 2 * nseg];
    table[IPIN_COST_INDEX].t_linear = graph.switch(ipin_switch).t_del;

    for (s, seg) in segments.iter().enumerate() {
        let x = CHANX_COST_INDEX_START + s;
        let y = CHANX_COST_INDEX_START + nseg + s;
        for (idx, ortho) in [(x, y), (y, x)] {
            table[idx].segment = Some(s);
            table[idx].ortho_cost_index = Some(ortho);
            table[idx].inv_length = 1.0 / seg.length as f64;
        }
    }

    load_t_values(graph, segments, &mut table);

    let norm = match base_cost_type {
        BaseCostType::DemandOnly => 1.0,
        _ => delay_normalization_fac(graph, &table),
    };
    table[SOURCE_COST_INDEX].base_cost = norm;
    table[SINK_COST_INDEX].base_cost = 0.0;
    table[OPIN_COST_INDEX].base_cost = norm;
    table[IPIN_COST_INDEX].base_cost = 0.95 * norm;
    for entry in table.iter_mut().skip(CHANX_COST_INDEX_START) {
        entry.base_cost = match base_cost_type {
            BaseCostType::IntrinsicDelay => entry.t_linear + entry.t_quadratic,
            _ => norm,
        };
    }
    for entry in &mut table {
        entry.saved_base_cost = entry.base_cost;
    }

    graph.cost_index = table;
}

fn load_t_values(graph: &RRGraph, segments: &[SegmentInfo], table: &mut [CostIndexData]) {
    let mut sums = vec![(0usize, 0.0f64, 0.0f64); table.len()];
    for node in graph.nodes.iter().filter(|n| n.kind.is_channel()) {
        let s = &mut sums[node.cost_index];
        s.0 += 1;
        s.1 += node.r;
        s.2 += node.c;
    }

    for (idx, entry) in table.iter_mut().enumerate().skip(CHANX_COST_INDEX_START) {
        let (count, r_sum, c_sum) = sums[idx];
        if count == 0 {
            continue;
        }
        let Some(seg) = entry.segment else { continue };
        let r = r_sum / count as f64;
        let c = c_sum / count as f64;
        let sw = graph.switch(segments[seg].wire_switch);
        if sw.buffered {
            entry.t_linear = sw.t_del + sw.r * c + 0.5 * r * c;
            entry.t_quadratic = 0.0;
        } else {
            entry.t_linear = sw.t_del + 0.5 * sw.r * c;
            entry.t_quadratic = (sw.r + r) * 0.5 * c;
        }
        entry.c_load = c;
    }
}

/// Average delay per tile of a `CLB_DIST`-long connection over every wire
/// in the graph; falls back to 1 for delay-free fabrics.
fn delay_normalization_fac(graph: &RRGraph, table: &[CostIndexData]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for node in graph.nodes.iter().filter(|n| n.kind.is_channel()) {
        let entry = &table[node.cost_index];
        let frac = CLB_DIST * entry.inv_length;
        sum += (frac * entry.t_linear + frac * frac * entry.t_quadratic) / CLB_DIST;
        count += 1;
    }
    if count == 0 || sum <= 0.0 {
        return 1.0;
    }
    sum / count as f64
}

/// Scales the base cost of pass-transistor wires by `sqrt(fanout)` for the
/// net about to be routed; buffered wires keep their saved cost.
pub fn scale_for_fanout(table: &mut [CostIndexData], fanout: usize) {
    let factor = (fanout as f64).sqrt();
    for entry in table.iter_mut().skip(CHANX_COST_INDEX_START) {
        entry.base_cost = if entry.t_quadratic > 0.0 {
            entry.saved_base_cost * factor
        } else {
            entry.saved_base_cost
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr_graph::{RRNode, RRNodeType};
    use fabric_common::db::arch::SwitchInfo;
    use fabric_common::geom::rect::GridRect;

    fn switches(buffered: bool) -> Vec<SwitchInfo> {
        let delayless = SwitchInfo {
            name: "__delayless".into(),
            buffered: true,
            r: 0.0,
            c_in: 0.0,
            c_out: 0.0,
            t_del: 0.0,
        };
        let wire = SwitchInfo {
            name: "wire".into(),
            buffered,
            r: 100.0,
            c_in: 0.0,
            c_out: 0.0,
            t_del: 1e-11,
        };
        vec![delayless, wire]
    }

    fn one_wire_graph(buffered: bool) -> (RRGraph, Vec<SegmentInfo>) {
        let mut graph = RRGraph::new(switches(buffered), 1);
        let mut wire = RRNode::new(
            RRNodeType::ChanX,
            GridRect::new(1, 2, 1, 1),
            0,
            1,
            CHANX_COST_INDEX_START,
        );
        wire.r = 10.0;
        wire.c = 2e-14;
        graph.add_node(wire);
        let seg = SegmentInfo {
            length: 2,
            frequency: 1.0,
            r_metal: 5.0,
            c_metal: 1e-14,
            wire_switch: SwitchId::new(1),
            opin_switch: SwitchId::new(1),
        };
        (graph, vec![seg])
    }

    #[test]
    fn buffered_wires_have_linear_delay_only() {
        let (mut graph, segs) = one_wire_graph(true);
        load_indexed_data(&mut graph, &segs, SwitchId::new(0), BaseCostType::IntrinsicDelay);
        let x = &graph.cost_index[CHANX_COST_INDEX_START];
        let expected = 1e-11 + 100.0 * 2e-14 + 0.5 * 10.0 * 2e-14;
        assert!((x.t_linear - expected).abs() < 1e-20);
        assert_eq!(x.t_quadratic, 0.0);
        assert!((x.base_cost - expected).abs() < 1e-20);
        assert_eq!(x.ortho_cost_index, Some(CHANX_COST_INDEX_START + 1));
        assert_eq!(x.inv_length, 0.5);
        assert_eq!(graph.cost_index[SINK_COST_INDEX].base_cost, 0.0);
    }

    #[test]
    fn demand_only_costs_are_unit() {
        let (mut graph, segs) = one_wire_graph(false);
        load_indexed_data(&mut graph, &segs, SwitchId::new(0), BaseCostType::DemandOnly);
        assert_eq!(graph.cost_index[CHANX_COST_INDEX_START].base_cost, 1.0);
        assert_eq!(graph.cost_index[OPIN_COST_INDEX].base_cost, 1.0);
        assert!((graph.cost_index[IPIN_COST_INDEX].base_cost - 0.95).abs() < 1e-12);
    }

    #[test]
    fn fanout_scaling_touches_pass_transistor_wires_only() {
        let (mut graph, segs) = one_wire_graph(false);
        load_indexed_data(&mut graph, &segs, SwitchId::new(0), BaseCostType::DemandOnly);
        assert!(graph.cost_index[CHANX_COST_INDEX_START].t_quadratic > 0.0);
        scale_for_fanout(&mut graph.cost_index, 4);
        assert_eq!(graph.cost_index[CHANX_COST_INDEX_START].base_cost, 2.0);
        scale_for_fanout(&mut graph.cost_index, 1);
        assert_eq!(graph.cost_index[CHANX_COST_INDEX_START].base_cost, 1.0);

        let (mut buffered, segs) = one_wire_graph(true);
        load_indexed_data(&mut buffered, &segs, SwitchId::new(0), BaseCostType::DemandOnly);
        scale_for_fanout(&mut buffered.cost_index, 9);
        assert_eq!(buffered.cost_index[CHANX_COST_INDEX_START].base_cost, 1.0);
    }
}
