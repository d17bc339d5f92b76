//! Island-style graph construction: terminals and pins for every placed
//! tile, staggered wires in every channel, switch boxes at every channel
//! crossing and Fc-spread connection blocks.

use super::indexed_data::load_indexed_data;
use super::{
    RRGraph, RRNode, RRNodeType, WireDirection, CHANX_COST_INDEX_START, IPIN_COST_INDEX,
    OPIN_COST_INDEX, SINK_COST_INDEX, SOURCE_COST_INDEX,
};
use fabric_common::db::arch::{Architecture, PinKind, Side, DELAYLESS_SWITCH};
use fabric_common::db::core::Design;
use fabric_common::db::indices::{RRNodeId, SwitchId};
use fabric_common::db::netlist::NetPin;
use fabric_common::error::{FabricError, Result};
use fabric_common::geom::rect::GridRect;
use fabric_common::util::config::{BaseCostType, Directionality};
use fabric_common::util::profiler::ScopedTimer;
use std::collections::HashSet;

/// Routing terminals of one net.
#[derive(Clone, Debug)]
pub struct NetTerminals {
    pub source: RRNodeId,
    /// `sinks[i]` terminates net pin `i + 1`.
    pub sinks: Vec<RRNodeId>,
    /// Pin bounding box grown by the router's `bb_factor`; nodes outside it
    /// are never expanded.
    pub bb: GridRect,
}

#[derive(Clone, Debug)]
pub struct BuiltGraph {
    pub graph: RRGraph,
    /// SOURCE or SINK node of every pin class of every block, `None` for
    /// classes made only of global pins.
    pub block_classes: Vec<Vec<Option<RRNodeId>>>,
    pub chan_width_x: Vec<usize>,
    pub chan_width_y: Vec<usize>,
}

impl BuiltGraph {
    fn class_node(&self, design: &Design, pin: NetPin) -> Result<RRNodeId> {
        let class = design.block_type_of(pin.block).pin_class[pin.pin];
        self.block_classes[pin.block.index()]
            .get(class)
            .copied()
            .flatten()
            .ok_or_else(|| {
                FabricError::Placement(format!(
                    "block {} pin {} has no routing terminal",
                    design.netlist.block(pin.block).name,
                    pin.pin
                ))
            })
    }

    /// Terminals of every net; global nets are not routed and get `None`.
    pub fn net_terminals(&self, design: &Design, bb_factor: usize) -> Result<Vec<Option<NetTerminals>>> {
        let (nx, ny) = (design.grid.nx, design.grid.ny);
        design
            .netlist
            .nets
            .iter()
            .map(|net| {
                if net.is_global {
                    return Ok(None);
                }
                let source = self.class_node(design, net.source())?;
                let sinks = net
                    .sinks()
                    .iter()
                    .map(|&pin| self.class_node(design, pin))
                    .collect::<Result<Vec<_>>>()?;

                let first = design.pin_loc(net.source());
                let mut bb = GridRect::point(first.x, first.y);
                for &pin in &net.pins {
                    let loc = design.pin_loc(pin);
                    let height = design.block_type_of(pin.block).height;
                    bb.include(loc.x, loc.y);
                    bb.include(loc.x, loc.y + height - 1);
                }
                Ok(Some(NetTerminals {
                    source,
                    sinks,
                    bb: bb.expanded(bb_factor, nx + 1, ny + 1),
                }))
            })
            .collect()
    }

    /// `(SOURCE, count)` for every block class with outputs used inside the
    /// block.
    pub fn local_opin_demand(&self, design: &Design) -> Vec<(RRNodeId, usize)> {
        let mut demand = Vec::new();
        for (b, block) in design.netlist.blocks.iter().enumerate() {
            for (class, &count) in block.local_opins.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                if let Some(Some(source)) = self.block_classes[b].get(class) {
                    demand.push((*source, count));
                }
            }
        }
        demand
    }
}

/// Setup-time checks on the fabric parameters for a given channel width.
pub fn validate_fabric(arch: &Architecture, width: usize) -> Result<()> {
    if width == 0 {
        return Err(FabricError::InvalidConfig("channel width must be >= 1".into()));
    }
    if arch.fs == 0 || arch.fs % 3 != 0 {
        return Err(FabricError::InvalidConfig(format!(
            "Fs must be a positive multiple of 3, got {}",
            arch.fs
        )));
    }
    for (name, fc) in [("fc_in", arch.fc_in), ("fc_out", arch.fc_out), ("fc_pad", arch.fc_pad)] {
        if !(fc > 0.0 && fc <= 1.0) {
            return Err(FabricError::InvalidConfig(format!("{} = {} outside (0, 1]", name, fc)));
        }
    }
    if arch.directionality == Directionality::Unidirectional && width % 2 != 0 {
        return Err(FabricError::InvalidConfig(format!(
            "unidirectional routing needs an even channel width, got {}",
            width
        )));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
struct TrackInfo {
    segment: usize,
    direction: WireDirection,
    /// Stagger of the wire start points along the channel.
    offset: usize,
}

/// Splits `units` tracks (or track pairs) between segment types in
/// proportion to their frequencies, largest remainders first.
fn distribute(units: usize, freqs: &[f64]) -> Vec<usize> {
    let total: f64 = freqs.iter().sum();
    let exact: Vec<f64> = freqs.iter().map(|f| units as f64 * f / total).collect();
    let mut counts: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let left = units.saturating_sub(counts.iter().sum::<usize>());
    let mut order: Vec<usize> = (0..freqs.len()).collect();
    order.sort_by(|&a, &b| {
        (exact[b] - exact[b].floor())
            .total_cmp(&(exact[a] - exact[a].floor()))
            .then(a.cmp(&b))
    });
    for &s in order.iter().take(left) {
        counts[s] += 1;
    }
    counts
}

fn track_layout(width: usize, arch: &Architecture) -> Vec<TrackInfo> {
    let uni = arch.directionality == Directionality::Unidirectional;
    let freqs: Vec<f64> = arch.segments.iter().map(|s| s.frequency).collect();
    let units = if uni { width / 2 } else { width };
    let mut tracks = Vec::with_capacity(width);
    for (segment, count) in distribute(units, &freqs).into_iter().enumerate() {
        let length = arch.segments[segment].length;
        for k in 0..count {
            let offset = k % length;
            if uni {
                for direction in [WireDirection::Inc, WireDirection::Dec] {
                    tracks.push(TrackInfo {
                        segment,
                        direction,
                        offset,
                    });
                }
            } else {
                tracks.push(TrackInfo {
                    segment,
                    direction: WireDirection::Bi,
                    offset,
                });
            }
        }
    }
    tracks
}

/// Wire extents along a channel of `n` tiles (positions `1..=n`): a wire
/// starts at 1 and wherever `(p - 1) % length == offset`.
fn wire_spans(n: usize, length: usize, offset: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 1;
    for p in 2..=n {
        if (p - 1) % length == offset % length {
            spans.push((start, p - 1));
            start = p;
        }
    }
    spans.push((start, n));
    spans
}

fn spread(candidates: &[RRNodeId], fc: f64, offset: usize) -> Vec<RRNodeId> {
    let w = candidates.len();
    if w == 0 {
        return Vec::new();
    }
    let n = ((fc * w as f64).ceil() as usize).clamp(1, w);
    (0..n).map(|k| candidates[(k * w / n + offset) % w]).collect()
}

#[derive(Clone, Debug, Default)]
struct TileNodes {
    /// `[sub_block][class]`
    classes: Vec<Vec<Option<RRNodeId>>>,
    /// `[sub_block][pin]`
    pins: Vec<Vec<Option<RRNodeId>>>,
}

/// Track-indexed wire lookup per channel position.
struct Channels {
    nx: usize,
    ny: usize,
    chanx: Vec<Vec<RRNodeId>>,
    chany: Vec<Vec<RRNodeId>>,
}

impl Channels {
    fn new(nx: usize, ny: usize) -> Self {
        let cells = (nx + 1) * (ny + 1);
        Self {
            nx,
            ny,
            chanx: vec![Vec::new(); cells],
            chany: vec![Vec::new(); cells],
        }
    }

    fn chanx(&self, x: usize, y: usize) -> &[RRNodeId] {
        if x == 0 || x > self.nx || y > self.ny {
            return &[];
        }
        &self.chanx[x * (self.ny + 1) + y]
    }

    fn chany(&self, x: usize, y: usize) -> &[RRNodeId] {
        if x > self.nx || y == 0 || y > self.ny {
            return &[];
        }
        &self.chany[x * (self.ny + 1) + y]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SbSide {
    Left,
    Right,
    Below,
    Above,
}

const SB_SIDES: [SbSide; 4] = [SbSide::Left, SbSide::Right, SbSide::Below, SbSide::Above];

struct Builder<'a> {
    arch: &'a Architecture,
    nx: usize,
    ny: usize,
    graph: RRGraph,
    channels: Channels,
    edges: HashSet<(RRNodeId, RRNodeId)>,
}

impl<'a> Builder<'a> {
    fn connect(&mut self, from: RRNodeId, to: RRNodeId, switch: SwitchId) {
        if self.edges.insert((from, to)) {
            self.graph.add_edge(from, to, switch);
        }
    }

    fn segment_of(&self, wire: RRNodeId) -> usize {
        (self.graph.node(wire).cost_index - CHANX_COST_INDEX_START) % self.arch.segments.len()
    }

    fn wire_switch(&self, wire: RRNodeId) -> SwitchId {
        self.arch.segments[self.segment_of(wire)].wire_switch
    }

    fn add_block_nodes(&mut self, design: &Design) -> Vec<TileNodes> {
        let arch = self.arch;
        let grid = &design.grid;
        let mut tiles = vec![TileNodes::default(); grid.width() * grid.height()];
        for x in 0..grid.width() {
            for y in 0..grid.height() {
                let tile = grid.tile(x, y);
                let Some(type_id) = tile.block_type else { continue };
                if tile.offset != 0 || tile.blocks.is_empty() {
                    continue;
                }
                let bt = arch.block_type(type_id);
                let span = GridRect::new(x, x, y, y + bt.height - 1);
                let nodes = &mut tiles[x * grid.height() + y];
                for z in 0..tile.blocks.len() {
                    let mut classes = Vec::with_capacity(bt.num_classes());
                    for (c, class) in bt.classes.iter().enumerate() {
                        if class.pins.iter().all(|&p| bt.is_global_pin[p]) {
                            classes.push(None);
                            continue;
                        }
                        let (kind, cost_index) = match class.kind {
                            PinKind::Driver => (RRNodeType::Source, SOURCE_COST_INDEX),
                            PinKind::Receiver => (RRNodeType::Sink, SINK_COST_INDEX),
                        };
                        let ptc = z * bt.num_classes() + c;
                        classes.push(Some(self.graph.add_node(RRNode::new(
                            kind,
                            span,
                            ptc,
                            class.pins.len(),
                            cost_index,
                        ))));
                    }

                    let mut pins = Vec::with_capacity(bt.num_pins);
                    for p in 0..bt.num_pins {
                        let Some(terminal) = classes[bt.pin_class[p]] else {
                            pins.push(None);
                            continue;
                        };
                        if bt.is_global_pin[p] {
                            pins.push(None);
                            continue;
                        }
                        let ptc = z * bt.num_pins + p;
                        let pin = match bt.pin_kind(p) {
                            PinKind::Driver => {
                                let id = self.graph.add_node(RRNode::new(
                                    RRNodeType::Opin,
                                    span,
                                    ptc,
                                    1,
                                    OPIN_COST_INDEX,
                                ));
                                self.connect(terminal, id, DELAYLESS_SWITCH);
                                id
                            }
                            PinKind::Receiver => {
                                let id = self.graph.add_node(RRNode::new(
                                    RRNodeType::Ipin,
                                    span,
                                    ptc,
                                    1,
                                    IPIN_COST_INDEX,
                                ));
                                self.connect(id, terminal, DELAYLESS_SWITCH);
                                id
                            }
                        };
                        pins.push(Some(pin));
                    }
                    nodes.classes.push(classes);
                    nodes.pins.push(pins);
                }
            }
        }
        tiles
    }

    fn add_wires(&mut self, chan_x: &[usize], chan_y: &[usize]) {
        let arch = self.arch;
        let (nx, ny) = (self.nx, self.ny);
        for (y, &width) in chan_x.iter().enumerate() {
            for (t, info) in track_layout(width, arch).into_iter().enumerate() {
                let seg = &arch.segments[info.segment];
                for (lo, hi) in wire_spans(nx, seg.length, info.offset) {
                    let id = self.add_wire(RRNodeType::ChanX, GridRect::new(lo, hi, y, y), t, info);
                    for x in lo..=hi {
                        self.channels.chanx[x * (ny + 1) + y].push(id);
                    }
                }
            }
        }
        for (x, &width) in chan_y.iter().enumerate() {
            for (t, info) in track_layout(width, arch).into_iter().enumerate() {
                let seg = &arch.segments[info.segment];
                for (lo, hi) in wire_spans(ny, seg.length, info.offset) {
                    let id = self.add_wire(RRNodeType::ChanY, GridRect::new(x, x, lo, hi), t, info);
                    for y in lo..=hi {
                        self.channels.chany[x * (ny + 1) + y].push(id);
                    }
                }
            }
        }
    }

    fn add_wire(&mut self, kind: RRNodeType, span: GridRect, track: usize, info: TrackInfo) -> RRNodeId {
        let arch = self.arch;
        let cost_index = match kind {
            RRNodeType::ChanX => self.graph.chanx_cost_index(info.segment),
            _ => self.graph.chany_cost_index(info.segment),
        };
        let seg = &arch.segments[info.segment];
        let mut node = RRNode::new(kind, span, track, 1, cost_index);
        let len = node.length() as f64;
        node.r = seg.r_metal * len;
        node.c = seg.c_metal * len;
        node.direction = info.direction;
        self.graph.add_node(node)
    }

    /// Channel a pin on `side` of tile `(x, y)` faces, with the pin's
    /// position along that channel.
    fn pin_channel(&self, x: usize, y: usize, side: Side) -> Option<(&[RRNodeId], usize)> {
        let tracks = match side {
            Side::Top => (self.channels.chanx(x, y), x),
            Side::Bottom => (self.channels.chanx(x, y.checked_sub(1)?), x),
            Side::Right => (self.channels.chany(x, y), y),
            Side::Left => (self.channels.chany(x.checked_sub(1)?, y), y),
        };
        if tracks.0.is_empty() { None } else { Some(tracks) }
    }

    fn io_side(&self, x: usize, y: usize) -> Side {
        if x == 0 {
            Side::Right
        } else if x == self.nx + 1 {
            Side::Left
        } else if y == 0 {
            Side::Top
        } else {
            Side::Bottom
        }
    }

    /// True if a unidirectional wire is driven from position `pos`.
    fn driven_at(&self, wire: RRNodeId, pos: usize) -> bool {
        let node = self.graph.node(wire);
        let (lo, hi) = match node.kind {
            RRNodeType::ChanX => (node.xlow, node.xhigh),
            _ => (node.ylow, node.yhigh),
        };
        match node.direction {
            WireDirection::Inc => lo == pos,
            WireDirection::Dec => hi == pos,
            WireDirection::Bi => true,
        }
    }

    fn connect_pins(&mut self, design: &Design, tiles: &[TileNodes]) {
        let arch = self.arch;
        let grid = &design.grid;
        for x in 0..grid.width() {
            for y in 0..grid.height() {
                let nodes = &tiles[x * grid.height() + y];
                if nodes.pins.is_empty() {
                    continue;
                }
                let Some(type_id) = grid.tile(x, y).block_type else { continue };
                let bt = arch.block_type(type_id);
                for (z, pins) in nodes.pins.iter().enumerate() {
                    for (p, pin) in pins.iter().enumerate() {
                        let Some(pin) = *pin else { continue };
                        let (row, side) = if bt.is_io {
                            (0, self.io_side(x, y))
                        } else {
                            bt.pin_locations[p]
                        };
                        let Some((tracks, pos)) = self.pin_channel(x, y + row, side) else {
                            log::warn!("pin {} of {} at ({}, {}) faces no channel", p, bt.name, x, y);
                            continue;
                        };
                        let tracks = tracks.to_vec();
                        let offset = z * bt.num_pins + p;
                        match bt.pin_kind(p) {
                            PinKind::Driver => {
                                let fc = if bt.is_io { arch.fc_pad } else { arch.fc_out };
                                let mut candidates: Vec<RRNodeId> = tracks
                                    .iter()
                                    .copied()
                                    .filter(|&w| self.driven_at(w, pos))
                                    .collect();
                                if candidates.is_empty() {
                                    candidates = tracks;
                                }
                                for wire in spread(&candidates, fc, offset) {
                                    let switch = arch.segments[self.segment_of(wire)].opin_switch;
                                    self.connect(pin, wire, switch);
                                }
                            }
                            PinKind::Receiver => {
                                let fc = if bt.is_io { arch.fc_pad } else { arch.fc_in };
                                for wire in spread(&tracks, fc, offset) {
                                    self.connect(wire, pin, arch.ipin_switch);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn sb_tracks(&self, i: usize, j: usize, side: SbSide) -> &[RRNodeId] {
        match side {
            SbSide::Left => self.channels.chanx(i, j),
            SbSide::Right => self.channels.chanx(i + 1, j),
            SbSide::Below => self.channels.chany(i, j),
            SbSide::Above => self.channels.chany(i, j + 1),
        }
    }

    fn ends_at(&self, wire: RRNodeId, i: usize, j: usize, side: SbSide) -> bool {
        let node = self.graph.node(wire);
        match side {
            SbSide::Left => node.xhigh == i,
            SbSide::Right => node.xlow == i + 1,
            SbSide::Below => node.yhigh == j,
            SbSide::Above => node.ylow == j + 1,
        }
    }

    fn build_switch_boxes(&mut self) {
        let fan = self.arch.fs / 3;
        let uni = self.arch.directionality == Directionality::Unidirectional;
        for i in 0..=self.nx {
            for j in 0..=self.ny {
                if uni {
                    self.unidirectional_switch_box(i, j, fan);
                } else {
                    self.bidirectional_switch_box(i, j, fan);
                }
            }
        }
    }

    /// Every wire ending at the box connects both ways to `fan` tracks on
    /// each other side, starting at its own track number.
    fn bidirectional_switch_box(&mut self, i: usize, j: usize, fan: usize) {
        for a in SB_SIDES {
            let from_tracks = self.sb_tracks(i, j, a).to_vec();
            for (t, &wire) in from_tracks.iter().enumerate() {
                if !self.ends_at(wire, i, j, a) {
                    continue;
                }
                for b in SB_SIDES.into_iter().filter(|&b| b != a) {
                    let to_tracks = self.sb_tracks(i, j, b).to_vec();
                    if to_tracks.is_empty() {
                        continue;
                    }
                    for k in 0..fan {
                        let target = to_tracks[(t + k) % to_tracks.len()];
                        let (forward, back) = (self.wire_switch(target), self.wire_switch(wire));
                        self.connect(wire, target, forward);
                        self.connect(target, wire, back);
                    }
                }
            }
        }
    }

    /// Wires arriving at the box drive `fan` of the wires leaving it on each
    /// other side.
    fn unidirectional_switch_box(&mut self, i: usize, j: usize, fan: usize) {
        let toward = |side: SbSide| match side {
            SbSide::Left | SbSide::Below => WireDirection::Inc,
            SbSide::Right | SbSide::Above => WireDirection::Dec,
        };
        let away = |side: SbSide| match toward(side) {
            WireDirection::Inc => WireDirection::Dec,
            _ => WireDirection::Inc,
        };

        let leaving: Vec<Vec<RRNodeId>> = SB_SIDES
            .iter()
            .map(|&b| {
                self.sb_tracks(i, j, b)
                    .iter()
                    .copied()
                    .filter(|&w| self.ends_at(w, i, j, b) && self.graph.node(w).direction == away(b))
                    .collect()
            })
            .collect();

        for a in SB_SIDES {
            let arriving: Vec<(usize, RRNodeId)> = self
                .sb_tracks(i, j, a)
                .iter()
                .copied()
                .enumerate()
                .filter(|&(_, w)| self.ends_at(w, i, j, a) && self.graph.node(w).direction == toward(a))
                .collect();
            for (t, wire) in arriving {
                let pair = t / 2;
                for (b_idx, b) in SB_SIDES.into_iter().enumerate() {
                    if b == a || leaving[b_idx].is_empty() {
                        continue;
                    }
                    let out = &leaving[b_idx];
                    for k in 0..fan {
                        let target = out[(pair + k) % out.len()];
                        let switch = self.wire_switch(target);
                        self.connect(wire, target, switch);
                    }
                }
            }
        }
    }

    /// Switch input and output capacitance loads the nodes on either side.
    fn load_switch_capacitance(&mut self) {
        let mut extra = vec![0.0; self.graph.num_nodes()];
        for (from, node) in self.graph.nodes.iter().enumerate() {
            for edge in &node.edges {
                let sw = &self.graph.switches[edge.switch.index()];
                extra[from] += sw.c_in;
                extra[edge.to.index()] += sw.c_out;
            }
        }
        for (node, c) in self.graph.nodes.iter_mut().zip(extra) {
            node.c += c;
        }
    }
}

/// Builds the routing-resource graph for the current placement with the
/// widest channel carrying `width` tracks.
pub fn build_rr_graph(design: &Design, width: usize, base_cost_type: BaseCostType) -> Result<BuiltGraph> {
    let arch = &design.arch;
    validate_fabric(arch, width)?;
    let _timer = ScopedTimer::new("Routing graph construction");
    let (nx, ny) = (design.grid.nx, design.grid.ny);

    let (mut chan_x, mut chan_y) = design.grid.channel_widths(width);
    if arch.directionality == Directionality::Unidirectional {
        for w in chan_x.iter_mut().chain(chan_y.iter_mut()) {
            *w += *w % 2;
        }
    }

    let mut builder = Builder {
        arch,
        nx,
        ny,
        graph: RRGraph::new(arch.switches.clone(), arch.segments.len()),
        channels: Channels::new(nx, ny),
        edges: HashSet::new(),
    };

    let tiles = builder.add_block_nodes(design);
    builder.add_wires(&chan_x, &chan_y);
    builder.connect_pins(design, &tiles);
    builder.build_switch_boxes();
    builder.load_switch_capacitance();

    let mut graph = builder.graph;
    load_indexed_data(&mut graph, &arch.segments, arch.ipin_switch, base_cost_type);

    let height = design.grid.height();
    let block_classes = design
        .netlist
        .blocks
        .iter()
        .map(|b| {
            tiles[b.loc.x * height + b.loc.y]
                .classes
                .get(b.loc.z)
                .cloned()
                .unwrap_or_default()
        })
        .collect();

    log::info!(
        "Built routing graph for W = {}: {} nodes, {} edges",
        width,
        graph.num_nodes(),
        graph.num_edges()
    );

    Ok(BuiltGraph {
        graph,
        block_classes,
        chan_width_x: chan_x,
        chan_width_y: chan_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_are_staggered_and_cover_the_channel() {
        assert_eq!(wire_spans(6, 1, 0), vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)]);
        assert_eq!(wire_spans(6, 4, 0), vec![(1, 4), (5, 6)]);
        assert_eq!(wire_spans(6, 4, 2), vec![(1, 2), (3, 6)]);
        assert_eq!(wire_spans(3, 4, 1), vec![(1, 1), (2, 3)]);
    }

    #[test]
    fn tracks_follow_segment_frequencies() {
        assert_eq!(distribute(10, &[0.5, 0.5]), vec![5, 5]);
        assert_eq!(distribute(5, &[0.5, 0.5]), vec![3, 2]);
        assert_eq!(distribute(7, &[1.0]), vec![7]);
        assert_eq!(distribute(10, &[0.25, 0.75]).iter().sum::<usize>(), 10);
    }

    #[test]
    fn fc_spread_picks_distinct_tracks() {
        let tracks: Vec<RRNodeId> = (0..8).map(RRNodeId::new).collect();
        let picked = spread(&tracks, 0.5, 3);
        assert_eq!(picked.len(), 4);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 4);
        assert_eq!(spread(&tracks, 0.01, 0).len(), 1);
    }
}
