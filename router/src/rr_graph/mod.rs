//! Routing-resource graph: every terminal, pin and wire the router can use,
//! joined by programmable switches.

pub mod builder;
pub mod indexed_data;

pub use builder::{build_rr_graph, BuiltGraph, NetTerminals};
pub use indexed_data::{load_indexed_data, CostIndexData};

use fabric_common::db::arch::SwitchInfo;
use fabric_common::db::indices::{RRNodeId, SwitchId};
use fabric_common::geom::rect::GridRect;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RRNodeType {
    Source,
    Sink,
    Opin,
    Ipin,
    ChanX,
    ChanY,
}

impl RRNodeType {
    pub fn is_channel(self) -> bool {
        matches!(self, RRNodeType::ChanX | RRNodeType::ChanY)
    }

    pub fn name(self) -> &'static str {
        match self {
            RRNodeType::Source => "SOURCE",
            RRNodeType::Sink => "SINK",
            RRNodeType::Opin => "OPIN",
            RRNodeType::Ipin => "IPIN",
            RRNodeType::ChanX => "CHANX",
            RRNodeType::ChanY => "CHANY",
        }
    }
}

/// Direction a wire can be driven in. Pins and terminals are `Bi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireDirection {
    Inc,
    Dec,
    Bi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RREdge {
    pub to: RRNodeId,
    pub switch: SwitchId,
}

#[derive(Clone, Debug)]
pub struct RRNode {
    pub kind: RRNodeType,
    pub xlow: usize,
    pub xhigh: usize,
    pub ylow: usize,
    pub yhigh: usize,
    /// Track number for wires, pin number for pins, class number for
    /// terminals (offset by the sub-block).
    pub ptc: usize,
    pub capacity: usize,
    pub r: f64,
    pub c: f64,
    pub cost_index: usize,
    pub direction: WireDirection,
    pub edges: Vec<RREdge>,
}

impl RRNode {
    pub fn new(kind: RRNodeType, span: GridRect, ptc: usize, capacity: usize, cost_index: usize) -> Self {
        Self {
            kind,
            xlow: span.xmin,
            xhigh: span.xmax,
            ylow: span.ymin,
            yhigh: span.ymax,
            ptc,
            capacity,
            r: 0.0,
            c: 0.0,
            cost_index,
            direction: WireDirection::Bi,
            edges: Vec::new(),
        }
    }

    /// Tiles spanned along the wire's axis.
    pub fn length(&self) -> usize {
        (self.xhigh - self.xlow).max(self.yhigh - self.ylow) + 1
    }

    /// True if the node's extent lies entirely outside `bb`.
    pub fn outside(&self, bb: &GridRect) -> bool {
        self.xhigh < bb.xmin || self.xlow > bb.xmax || self.yhigh < bb.ymin || self.ylow > bb.ymax
    }
}

pub const SOURCE_COST_INDEX: usize = 0;
pub const SINK_COST_INDEX: usize = 1;
pub const OPIN_COST_INDEX: usize = 2;
pub const IPIN_COST_INDEX: usize = 3;
pub const CHANX_COST_INDEX_START: usize = 4;

#[derive(Clone, Debug)]
pub struct RRGraph {
    pub nodes: Vec<RRNode>,
    pub switches: Vec<SwitchInfo>,
    /// Per-cost-index timing and base-cost data, one CHANX and one CHANY
    /// entry per segment type after the four pin/terminal entries.
    pub cost_index: Vec<CostIndexData>,
    pub num_segments: usize,
}

impl RRGraph {
    pub fn new(switches: Vec<SwitchInfo>, num_segments: usize) -> Self {
        Self {
            nodes: Vec::new(),
            switches,
            cost_index: Vec::new(),
            num_segments,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn node(&self, id: RRNodeId) -> &RRNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn edges(&self, id: RRNodeId) -> &[RREdge] {
        &self.nodes[id.index()].edges
    }

    #[inline]
    pub fn switch(&self, id: SwitchId) -> &SwitchInfo {
        &self.switches[id.index()]
    }

    pub fn add_node(&mut self, node: RRNode) -> RRNodeId {
        self.nodes.push(node);
        RRNodeId::new(self.nodes.len() - 1)
    }

    pub fn add_edge(&mut self, from: RRNodeId, to: RRNodeId, switch: SwitchId) {
        self.nodes[from.index()].edges.push(RREdge { to, switch });
    }

    pub fn has_edge(&self, from: RRNodeId, to: RRNodeId) -> bool {
        self.edges(from).iter().any(|e| e.to == to)
    }

    pub fn chanx_cost_index(&self, segment: usize) -> usize {
        CHANX_COST_INDEX_START + segment
    }

    pub fn chany_cost_index(&self, segment: usize) -> usize {
        CHANX_COST_INDEX_START + self.num_segments + segment
    }

    pub fn num_edges(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum()
    }
}
