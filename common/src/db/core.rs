use crate::db::arch::{Architecture, BlockType};
use crate::db::grid::DeviceGrid;
use crate::db::indices::{BlockId, NetId};
use crate::db::netlist::{NetPin, Netlist};
use crate::db::sinks::NetSinkTable;
use crate::geom::coord::GridCoord;

/// Everything both engines share: the device, the netlist and the current
/// block locations (kept in `netlist.blocks[..].loc` and mirrored in the grid).
#[derive(Clone, Debug)]
pub struct Design {
    pub name: String,
    pub arch: Architecture,
    pub grid: DeviceGrid,
    pub netlist: Netlist,
}

impl Design {
    pub fn new(name: String, arch: Architecture, grid: DeviceGrid, netlist: Netlist) -> Self {
        Self {
            name,
            arch,
            grid,
            netlist,
        }
    }

    pub fn block_type_of(&self, block: BlockId) -> &BlockType {
        self.arch
            .block_type(self.netlist.blocks[block.index()].block_type)
    }

    pub fn is_io_block(&self, block: BlockId) -> bool {
        self.block_type_of(block).is_io
    }

    /// Moves `block` to `to`, leaving its old slot empty.
    pub fn relocate(&mut self, block: BlockId, to: GridCoord) {
        let from = self.netlist.blocks[block.index()].loc;
        if self.grid.block_at(from) == Some(block) {
            self.grid.set_block(from, None);
        }
        self.netlist.blocks[block.index()].loc = to;
        self.grid.set_block(to, Some(block));
    }

    pub fn pin_loc(&self, pin: NetPin) -> GridCoord {
        self.netlist.pin_loc(pin)
    }

    /// A zeroed per-connection table shaped like the netlist.
    pub fn sink_table<T: Clone>(&self, init: T) -> NetSinkTable<T> {
        NetSinkTable::from_sink_counts(self.netlist.nets.iter().map(|n| n.num_sinks()), init)
    }

    pub fn routable_nets(&self) -> impl Iterator<Item = NetId> + '_ {
        self.netlist
            .nets
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.is_global)
            .map(|(i, _)| NetId::new(i))
    }
}
