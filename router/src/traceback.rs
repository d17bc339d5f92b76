use crate::algo::PathStep;
use fabric_common::db::indices::{RRNodeId, SwitchId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceElement {
    pub node: RRNodeId,
    /// Switch driving the next element; `None` ends a branch at a SINK.
    pub switch: Option<SwitchId>,
}

/// A net's routing as a flat list of branches. The first branch starts at
/// the SOURCE; every later branch starts with the node where it joins the
/// wiring already listed, and every branch ends at a SINK.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Traceback {
    pub elements: Vec<TraceElement>,
}

impl Traceback {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Appends a branch and returns the index of its first node that was
    /// not already part of the routing.
    pub fn append_branch(&mut self, branch: &[PathStep]) -> usize {
        let first_new = if self.elements.is_empty() {
            0
        } else {
            self.elements.len() + 1
        };
        for (i, step) in branch.iter().enumerate() {
            self.elements.push(TraceElement {
                node: step.node,
                switch: branch.get(i + 1).and_then(|next| next.switch),
            });
        }
        first_new
    }

    /// Nodes the routing occupies, starting at element `from`; join nodes
    /// repeated at the head of a branch are skipped.
    pub fn used_nodes(&self, from: usize) -> impl Iterator<Item = RRNodeId> + '_ {
        let mut i = from;
        std::iter::from_fn(move || {
            let e = self.elements.get(i)?;
            i += if e.switch.is_none() { 2 } else { 1 };
            Some(e.node)
        })
    }

    /// Branches as element slices, SOURCE branch first.
    pub fn branches(&self) -> impl Iterator<Item = &[TraceElement]> + '_ {
        self.elements
            .split_inclusive(|e| e.switch.is_none())
            .filter(|b| !b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(nodes: &[u32]) -> Vec<PathStep> {
        nodes
            .iter()
            .enumerate()
            .map(|(i, &n)| PathStep {
                node: RRNodeId(n),
                switch: (i > 0).then(|| SwitchId::new(1)),
            })
            .collect()
    }

    #[test]
    fn join_nodes_are_not_counted_twice() {
        let mut trace = Traceback::default();
        assert_eq!(trace.append_branch(&steps(&[0, 1, 2, 3])), 0);
        assert_eq!(trace.append_branch(&steps(&[2, 5, 6])), 5);
        let used: Vec<u32> = trace.used_nodes(0).map(|n| n.0).collect();
        assert_eq!(used, vec![0, 1, 2, 3, 5, 6]);
        let new: Vec<u32> = trace.used_nodes(5).map(|n| n.0).collect();
        assert_eq!(new, vec![5, 6]);
        assert_eq!(trace.branches().count(), 2);
        assert_eq!(trace.elements[3].switch, None);
        assert_eq!(trace.elements[4].node, RRNodeId(2));
    }
}
