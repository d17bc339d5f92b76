use fabric_common::db::core::Design;
use fabric_common::db::indices::{BlockId, TypeId};
use fabric_common::error::{FabricError, Result};
use fabric_common::geom::coord::GridCoord;
use fabric_common::util::config::PadLocation;
use rand::Rng;
use rand::seq::SliceRandom;

/// Random legal starting placement. Blocks already marked fixed keep their
/// recorded location; with [`PadLocation::Random`] the pads are scattered
/// and then locked for the rest of the run.
pub fn initial_placement<R: Rng>(design: &mut Design, pad_loc: PadLocation, rng: &mut R) -> Result<()> {
    design.grid.clear_blocks();

    for i in 0..design.netlist.num_blocks() {
        let block = &design.netlist.blocks[i];
        if !block.is_fixed {
            continue;
        }
        let loc = block.loc;
        let tile = design.grid.tile(loc.x, loc.y);
        if tile.block_type != Some(block.block_type)
            || tile.offset != 0
            || loc.z >= tile.blocks.len()
            || tile.blocks[loc.z].is_some()
        {
            return Err(FabricError::Placement(format!(
                "fixed block '{}' has an illegal location ({}, {}, {})",
                block.name, loc.x, loc.y, loc.z
            )));
        }
        design.grid.set_block(loc, Some(BlockId::new(i)));
    }

    for t in 0..design.arch.types.len() {
        let type_id = TypeId::new(t);
        let mut free: Vec<GridCoord> = design
            .grid
            .anchors_of_type(type_id)
            .into_iter()
            .flat_map(|(x, y)| {
                let tile = design.grid.tile(x, y);
                (0..tile.blocks.len())
                    .filter(|&z| tile.blocks[z].is_none())
                    .map(move |z| GridCoord::new(x, y, z))
                    .collect::<Vec<_>>()
            })
            .collect();
        let blocks: Vec<BlockId> = (0..design.netlist.num_blocks())
            .map(BlockId::new)
            .filter(|&b| {
                let block = design.netlist.block(b);
                block.block_type == type_id && !block.is_fixed
            })
            .collect();

        if blocks.len() > free.len() {
            return Err(FabricError::Capacity {
                type_name: design.arch.block_type(type_id).name.clone(),
                needed: blocks.len(),
                available: free.len(),
            });
        }

        free.shuffle(rng);
        let lock = pad_loc == PadLocation::Random && type_id == design.arch.io_type;
        for (block, loc) in blocks.into_iter().zip(free) {
            design.netlist.blocks[block.index()].loc = loc;
            design.grid.set_block(loc, Some(block));
            if lock {
                design.netlist.blocks[block.index()].is_fixed = true;
            }
        }
    }
    Ok(())
}
