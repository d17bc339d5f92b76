use crate::congestion::CongestionMap;
use crate::rr_graph::{NetTerminals, RRGraph, RRNodeType};
use crate::traceback::Traceback;
use fabric_common::db::indices::RRNodeId;
use fabric_common::error::{FabricError, Result};
use std::collections::{HashMap, HashSet};

/// Verifies a finished routing: every traceback starts at its SOURCE, every
/// hop is a graph edge through the recorded switch, every sink is reached,
/// and the occupancy recounted from the tracebacks (plus reserved OPINs)
/// matches the negotiated occupancy and fits every capacity.
pub fn check_routing(
    graph: &RRGraph,
    terminals: &[Option<NetTerminals>],
    traces: &[Traceback],
    reserved: impl IntoIterator<Item = RRNodeId>,
    congestion: &CongestionMap,
) -> Result<()> {
    let mut occupancy = vec![0usize; graph.num_nodes()];
    let mut errors = 0usize;

    for (net, term) in terminals.iter().enumerate() {
        let Some(term) = term else {
            if !traces[net].is_empty() {
                log::error!("Global net {} has a traceback", net);
                errors += 1;
            }
            continue;
        };
        let trace = &traces[net];
        if trace.elements.first().map(|e| e.node) != Some(term.source) {
            log::error!("Net {} traceback does not start at its SOURCE", net);
            errors += 1;
            continue;
        }

        let mut on_trace: HashSet<RRNodeId> = HashSet::new();
        let mut reached: HashMap<RRNodeId, usize> = HashMap::new();
        for (b, branch) in trace.branches().enumerate() {
            if b > 0 && !on_trace.contains(&branch[0].node) {
                log::error!("Net {} branch {} does not join the existing routing", net, b);
                errors += 1;
            }
            for pair in branch.windows(2) {
                let (from, to) = (pair[0], pair[1]);
                let linked = graph
                    .edges(from.node)
                    .iter()
                    .any(|e| e.to == to.node && Some(e.switch) == from.switch);
                if !linked {
                    log::error!("Net {}: no edge {:?} -> {:?} via {:?}", net, from.node, to.node, from.switch);
                    errors += 1;
                }
            }
            on_trace.extend(branch.iter().map(|e| e.node));
            if let Some(last) = branch.last() {
                if graph.node(last.node).kind != RRNodeType::Sink {
                    log::error!("Net {} branch {} ends at a {}", net, b, graph.node(last.node).kind.name());
                    errors += 1;
                }
                *reached.entry(last.node).or_default() += 1;
            }
        }

        let mut needed: HashMap<RRNodeId, usize> = HashMap::new();
        for &sink in &term.sinks {
            *needed.entry(sink).or_default() += 1;
        }
        for (sink, count) in needed {
            let got = reached.get(&sink).copied().unwrap_or(0);
            if got < count {
                log::error!("Net {} reaches SINK {:?} {} times, needs {}", net, sink, got, count);
                errors += 1;
            }
        }

        for node in trace.used_nodes(0) {
            occupancy[node.index()] += 1;
        }
    }

    for node in reserved {
        occupancy[node.index()] += 1;
    }

    for (i, &occ) in occupancy.iter().enumerate() {
        let id = RRNodeId::new(i);
        if occ != congestion.occupancy(id) {
            log::error!(
                "Node {:?}: recounted occupancy {} but negotiated {}",
                id,
                occ,
                congestion.occupancy(id)
            );
            errors += 1;
        }
        if occ > graph.node(id).capacity {
            log::error!("Node {:?} used {} times, capacity {}", id, occ, graph.node(id).capacity);
            errors += 1;
        }
    }

    if errors > 0 {
        return Err(FabricError::Routing(format!("{} routing check errors", errors)));
    }
    log::info!("Completed routing consistency check successfully");
    Ok(())
}
