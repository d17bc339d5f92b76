use crate::db::arch::PinKind;
use crate::db::core::Design;
use crate::db::indices::BlockId;
use crate::error::{FabricError, Result};

/// Verifies the grid and the block records agree: every block sits exactly
/// once on an anchor tile of its own type, and tile usage equals the number
/// of residents without exceeding capacity.
pub fn check_placement(design: &Design) -> Result<()> {
    let netlist = &design.netlist;
    let grid = &design.grid;
    let mut seen = vec![0usize; netlist.num_blocks()];
    let mut errors = Vec::new();

    for x in 0..grid.width() {
        for y in 0..grid.height() {
            let tile = grid.tile(x, y);
            let residents = tile.blocks.iter().flatten().count();
            if residents != tile.usage {
                errors.push(format!(
                    "tile ({}, {}) usage {} but {} residents",
                    x, y, tile.usage, residents
                ));
            }
            if tile.usage > tile.blocks.len() {
                errors.push(format!(
                    "tile ({}, {}) usage {} exceeds capacity {}",
                    x,
                    y,
                    tile.usage,
                    tile.blocks.len()
                ));
            }
            for (z, block) in tile.blocks.iter().enumerate() {
                let Some(block) = *block else { continue };
                seen[block.index()] += 1;
                let b = &netlist.blocks[block.index()];
                if b.loc.x != x || b.loc.y != y || b.loc.z != z {
                    errors.push(format!(
                        "block '{}' recorded at ({}, {}, {}) but resides in ({}, {}, {})",
                        b.name, b.loc.x, b.loc.y, b.loc.z, x, y, z
                    ));
                }
                if tile.block_type != Some(b.block_type) || tile.offset != 0 {
                    errors.push(format!(
                        "block '{}' of type {} on an incompatible tile ({}, {})",
                        b.name,
                        design.block_type_of(block).name,
                        x,
                        y
                    ));
                }
            }
        }
    }

    for (i, count) in seen.iter().enumerate() {
        if *count != 1 {
            errors.push(format!(
                "block '{}' appears {} times in the grid",
                netlist.blocks[i].name, count
            ));
        }
    }

    if errors.is_empty() {
        return Ok(());
    }
    for e in &errors {
        log::error!("{}", e);
    }
    Err(FabricError::Placement(format!(
        "{} error(s), first: {}",
        errors.len(),
        errors[0]
    )))
}

/// Structural netlist checks run before placement: every net has a single
/// driver at pin 0 and at least one sink, and pin records point back at
/// their nets.
pub fn check_netlist(design: &Design) -> Result<()> {
    let netlist = &design.netlist;
    for net in &netlist.nets {
        if net.pins.len() < 2 {
            return Err(FabricError::InvalidConfig(format!(
                "net '{}' has no sinks",
                net.name
            )));
        }
        for (pos, pin) in net.pins.iter().enumerate() {
            let block_type = design.block_type_of(pin.block);
            let expected = if pos == 0 {
                PinKind::Driver
            } else {
                PinKind::Receiver
            };
            if block_type.pin_kind(pin.pin) != expected {
                return Err(FabricError::InvalidConfig(format!(
                    "net '{}' pin {} on block '{}' has the wrong direction",
                    net.name,
                    pos,
                    netlist.blocks[pin.block.index()].name
                )));
            }
            if block_type.is_global_pin[pin.pin] != net.is_global {
                return Err(FabricError::InvalidConfig(format!(
                    "net '{}' mixes global and routed pins",
                    net.name
                )));
            }
            if netlist.blocks[pin.block.index()].net_pin_index[pin.pin] != Some(pos) {
                return Err(FabricError::InvalidConfig(format!(
                    "block '{}' pin {} does not point back at net '{}'",
                    netlist.blocks[pin.block.index()].name,
                    pin.pin,
                    net.name
                )));
            }
        }
    }
    for (i, block) in netlist.blocks.iter().enumerate() {
        let block_type = design.block_type_of(BlockId::new(i));
        if block.nets.len() != block_type.num_pins {
            return Err(FabricError::InvalidConfig(format!(
                "block '{}' has {} pins, type {} has {}",
                block.name,
                block.nets.len(),
                block_type.name,
                block_type.num_pins
            )));
        }
    }
    Ok(())
}
