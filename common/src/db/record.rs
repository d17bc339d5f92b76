//! The text placement record:
//!
//! ```text
//! Netlist file: <design>   Architecture file: <arch>
//! Array size: <nx> x <ny> logic blocks
//!
//! #block name  x  y  subblk  block number
//! #----------  --  --  ------  ------------
//! clb3         4  7  0       #3
//! ```

use crate::db::core::Design;
use crate::error::{FabricError, Result};
use crate::geom::coord::GridCoord;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub fn write_placement<W: Write>(out: &mut W, design: &Design, arch_name: &str) -> Result<()> {
    writeln!(
        out,
        "Netlist file: {}   Architecture file: {}",
        design.name, arch_name
    )?;
    writeln!(
        out,
        "Array size: {} x {} logic blocks\n",
        design.grid.nx, design.grid.ny
    )?;
    writeln!(out, "#block name\tx\ty\tsubblk\tblock number")?;
    writeln!(out, "#----------\t--\t--\t------\t------------")?;
    for (i, block) in design.netlist.blocks.iter().enumerate() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t#{}",
            block.name, block.loc.x, block.loc.y, block.loc.z, i
        )?;
    }
    Ok(())
}

pub fn write_placement_file(path: &Path, design: &Design, arch_name: &str) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_placement(&mut out, design, arch_name)?;
    out.flush()?;
    Ok(())
}

/// Reads a placement record into `design`, replacing every block location.
/// The grid size must match and each block must land on a free slot of its
/// own type.
pub fn read_placement<R: BufRead>(input: R, design: &mut Design) -> Result<()> {
    let mut seen_size = false;
    let mut placed = vec![false; design.netlist.num_blocks()];
    design.grid.clear_blocks();

    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let lineno = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("Netlist file")
        {
            continue;
        }
        let parse_err = |msg: String| FabricError::Parse { line: lineno, msg };

        if let Some(rest) = trimmed.strip_prefix("Array size:") {
            let dims: Vec<&str> = rest.split_whitespace().collect();
            let nx: usize = dims
                .first()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| parse_err("bad array width".into()))?;
            let ny: usize = dims
                .get(2)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| parse_err("bad array height".into()))?;
            if nx != design.grid.nx || ny != design.grid.ny {
                return Err(parse_err(format!(
                    "array is {} x {}, device is {} x {}",
                    nx, ny, design.grid.nx, design.grid.ny
                )));
            }
            seen_size = true;
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(parse_err(format!("expected 'name x y [subblk]', got '{}'", trimmed)));
        }
        let block = *design
            .netlist
            .block_name_map
            .get(fields[0])
            .ok_or_else(|| parse_err(format!("unknown block '{}'", fields[0])))?;
        let coord = |i: usize| -> Result<usize> {
            match fields.get(i) {
                Some(s) if !s.starts_with('#') => s
                    .parse()
                    .map_err(|_| parse_err(format!("bad coordinate '{}'", s))),
                _ => Ok(0),
            }
        };
        let loc = GridCoord::new(coord(1)?, coord(2)?, coord(3)?);

        if loc.x >= design.grid.width() || loc.y >= design.grid.height() {
            return Err(parse_err(format!("location ({}, {}) off the device", loc.x, loc.y)));
        }
        let tile = design.grid.tile(loc.x, loc.y);
        let block_type = design.netlist.blocks[block.index()].block_type;
        if tile.block_type != Some(block_type) || tile.offset != 0 {
            return Err(parse_err(format!(
                "block '{}' cannot sit at ({}, {})",
                fields[0], loc.x, loc.y
            )));
        }
        if loc.z >= tile.blocks.len() || tile.blocks[loc.z].is_some() {
            return Err(parse_err(format!(
                "slot {} at ({}, {}) is unavailable",
                loc.z, loc.x, loc.y
            )));
        }
        if placed[block.index()] {
            return Err(parse_err(format!("block '{}' placed twice", fields[0])));
        }
        placed[block.index()] = true;
        design.netlist.blocks[block.index()].loc = loc;
        design.grid.set_block(loc, Some(block));
    }

    if !seen_size {
        return Err(FabricError::Parse {
            line: 0,
            msg: "missing 'Array size' line".into(),
        });
    }
    if let Some(missing) = placed.iter().position(|p| !p) {
        return Err(FabricError::Parse {
            line: 0,
            msg: format!(
                "block '{}' has no location",
                design.netlist.blocks[missing].name
            ),
        });
    }
    Ok(())
}

pub fn read_placement_file(path: &Path, design: &mut Design) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);
    read_placement(reader, design)
}
