use fabric_common::db::indices::{RRNodeId, SwitchId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A partial path waiting on the frontier.
#[derive(Clone, Copy, Debug)]
pub struct HeapEntry {
    pub node: RRNodeId,
    pub total_cost: f64,
    pub backward_cost: f64,
    /// Resistance between the last buffer and `node`, inclusive.
    pub r_upstream: f64,
    /// Predecessor and the switch used to leave it; `None` for seeds.
    pub prev: Option<(RRNodeId, SwitchId)>,
    seq: u64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

// Min-heap on total cost; equal costs pop in insertion order.
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .total_cost
            .total_cmp(&self.total_cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<HeapEntry>,
    next_seq: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        node: RRNodeId,
        total_cost: f64,
        backward_cost: f64,
        r_upstream: f64,
        prev: Option<(RRNodeId, SwitchId)>,
    ) {
        self.heap.push(HeapEntry {
            node,
            total_cost,
            backward_cost,
            r_upstream,
            prev,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    pub fn pop(&mut self) -> Option<HeapEntry> {
        self.heap.pop()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
