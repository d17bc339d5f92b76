//! Partial routing of one net as an index-addressed tree, annotated with
//! Elmore delays as it grows one sink at a time.

use crate::algo::PathStep;
use crate::rr_graph::{RRGraph, RRNodeType};
use fabric_common::db::arch::DELAYLESS_SWITCH;
use fabric_common::db::indices::{RRNodeId, SwitchId};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct RouteTreeNode {
    pub node: RRNodeId,
    /// Parent index and the switch driving this node from it.
    pub parent: Option<(usize, SwitchId)>,
    pub children: Vec<usize>,
    /// False for SINKs: the search never starts from them.
    pub re_expand: bool,
    /// Resistance from the nearest upstream buffer through this node.
    pub r_upstream: f64,
    /// Capacitance this node sees downstream, up to the next buffers.
    pub c_downstream: f64,
    pub t_del: f64,
}

#[derive(Clone, Debug)]
pub struct RouteTree {
    nodes: Vec<RouteTreeNode>,
    index_of: HashMap<RRNodeId, usize>,
}

impl RouteTree {
    pub fn new(graph: &RRGraph, source: RRNodeId) -> Self {
        let rr = graph.node(source);
        let root = RouteTreeNode {
            node: source,
            parent: None,
            children: Vec::new(),
            re_expand: true,
            r_upstream: rr.r,
            c_downstream: rr.c,
            t_del: 0.5 * rr.r * rr.c,
        };
        Self {
            nodes: vec![root],
            index_of: HashMap::from([(source, 0)]),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &RouteTreeNode {
        &self.nodes[idx]
    }

    pub fn contains(&self, node: RRNodeId) -> bool {
        self.index_of.contains_key(&node)
    }

    /// Nodes a search for the next sink may start from.
    pub fn seeds(&self) -> impl Iterator<Item = &RouteTreeNode> {
        self.nodes.iter().filter(|n| n.re_expand)
    }

    /// The suffix of `path` that starts at its last node already in the
    /// tree. A search may pass through tree nodes on its way to the sink;
    /// only the part after the final one is new wiring.
    pub fn new_branch<'p>(&self, path: &'p [PathStep]) -> Option<&'p [PathStep]> {
        let last = path.len().checked_sub(1)?;
        let join = path[..last].iter().rposition(|s| self.contains(s.node))?;
        Some(&path[join..])
    }

    /// Grafts `branch` (join node first, SINK last) onto the tree and
    /// refreshes the delays it affects. Returns the SINK's tree index.
    pub fn add_branch(&mut self, graph: &RRGraph, branch: &[PathStep]) -> Option<usize> {
        let join = *self.index_of.get(&branch.first()?.node)?;
        let first_new = self.nodes.len();

        let mut parent = join;
        for step in &branch[1..] {
            let rr = graph.node(step.node);
            let idx = self.nodes.len();
            let is_sink = rr.kind == RRNodeType::Sink;
            self.nodes.push(RouteTreeNode {
                node: step.node,
                parent: Some((parent, step.switch.unwrap_or(DELAYLESS_SWITCH))),
                children: Vec::new(),
                re_expand: !is_sink,
                r_upstream: 0.0,
                c_downstream: rr.c,
                t_del: 0.0,
            });
            self.nodes[parent].children.push(idx);
            // A SINK can be reached more than once; it is never a join point.
            if !is_sink {
                self.index_of.insert(step.node, idx);
            }
            parent = idx;
        }
        let sink = parent;
        if sink < first_new {
            return None;
        }

        // Downstream capacitance along the new path, sink first; only
        // unbuffered switches let it through.
        for idx in (first_new..sink).rev() {
            let child = &self.nodes[idx + 1];
            if let Some((_, sw)) = child.parent {
                if !graph.switch(sw).buffered {
                    let add = child.c_downstream;
                    self.nodes[idx].c_downstream += add;
                }
            }
        }

        for idx in first_new..=sink {
            let Some((p, sw)) = self.nodes[idx].parent else { continue };
            let sw = graph.switch(sw);
            let upstream = if sw.buffered { sw.r } else { self.nodes[p].r_upstream + sw.r };
            self.nodes[idx].r_upstream = upstream + graph.node(self.nodes[idx].node).r;
        }

        // The new load propagates up through unbuffered ancestors.
        let added = self.nodes[first_new].c_downstream;
        let mut top = first_new;
        while let Some((p, sw)) = self.nodes[top].parent {
            if graph.switch(sw).buffered {
                break;
            }
            top = p;
            self.nodes[top].c_downstream += added;
        }

        let t_start = match self.nodes[top].parent {
            Some((p, sw)) => {
                let sw = graph.switch(sw);
                self.nodes[p].t_del + sw.r * self.nodes[top].c_downstream + sw.t_del
            }
            None => 0.0,
        };
        self.load_subtree_delay(graph, top, t_start);
        Some(sink)
    }

    fn load_subtree_delay(&mut self, graph: &RRGraph, root: usize, t_arrival: f64) {
        let mut stack = vec![(root, t_arrival)];
        while let Some((idx, t_arrival)) = stack.pop() {
            let r = graph.node(self.nodes[idx].node).r;
            let t_del = t_arrival + 0.5 * self.nodes[idx].c_downstream * r;
            self.nodes[idx].t_del = t_del;
            for &child in &self.nodes[idx].children {
                let Some((_, sw)) = self.nodes[child].parent else { continue };
                let sw = graph.switch(sw);
                stack.push((child, t_del + sw.r * self.nodes[child].c_downstream + sw.t_del));
            }
        }
    }
}
