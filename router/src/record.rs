//! The text routing record:
//!
//! ```text
//! Array size: <nx> x <ny> logic blocks.
//!
//! Routing:
//!
//! Net 0 (n0)
//!
//! SOURCE (1,2)  Class: 1
//!   OPIN (1,2)  Pin: 4
//!  CHANX (1,2) to (4,2)  Track: 3
//!   IPIN (4,3)  Pin: 0
//!   SINK (4,3)  Class: 0
//!
//! Net 1 (clk): global net connecting:
//!
//! Block clb0 (#5) at (1, 1), Pin class 2.
//! ```

use crate::rr_graph::{RRGraph, RRNodeType};
use crate::traceback::Traceback;
use fabric_common::db::core::Design;
use fabric_common::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn write_routing<W: Write>(out: &mut W, design: &Design, graph: &RRGraph, traces: &[Traceback]) -> Result<()> {
    writeln!(out, "Array size: {} x {} logic blocks.", design.grid.nx, design.grid.ny)?;
    write!(out, "\nRouting:")?;

    let io_type = design.arch.io_type;
    for (i, net) in design.netlist.nets.iter().enumerate() {
        if net.is_global {
            writeln!(out, "\n\nNet {} ({}): global net connecting:\n", i, net.name)?;
            for &pin in &net.pins {
                let block = design.netlist.block(pin.block);
                let class = design.block_type_of(pin.block).pin_class[pin.pin];
                writeln!(
                    out,
                    "Block {} (#{}) at ({}, {}), Pin class {}.",
                    block.name, pin.block, block.loc.x, block.loc.y, class
                )?;
            }
            continue;
        }

        writeln!(out, "\n\nNet {} ({})\n", i, net.name)?;
        for element in &traces[i].elements {
            let node = graph.node(element.node);
            write!(out, "{:>6} ({},{}) ", node.kind.name(), node.xlow, node.ylow)?;
            if node.xlow != node.xhigh || node.ylow != node.yhigh {
                write!(out, "to ({},{}) ", node.xhigh, node.yhigh)?;
            }
            let on_pad = design.grid.tile(node.xlow, node.ylow).block_type == Some(io_type);
            let label = match node.kind {
                RRNodeType::Ipin | RRNodeType::Opin if on_pad => "Pad:",
                RRNodeType::Ipin | RRNodeType::Opin => "Pin:",
                RRNodeType::ChanX | RRNodeType::ChanY => "Track:",
                RRNodeType::Source | RRNodeType::Sink if on_pad => "Pad:",
                RRNodeType::Source | RRNodeType::Sink => "Class:",
            };
            writeln!(out, " {} {}  ", label, node.ptc)?;
        }
    }
    writeln!(out)?;
    Ok(())
}

pub fn write_routing_file(path: &Path, design: &Design, graph: &RRGraph, traces: &[Traceback]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_routing(&mut out, design, graph, traces)?;
    out.flush()?;
    Ok(())
}
