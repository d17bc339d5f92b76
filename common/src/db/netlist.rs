use crate::db::indices::{BlockId, NetId, TypeId};
use crate::geom::coord::GridCoord;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct Block {
    pub name: String,
    pub block_type: TypeId,
    pub loc: GridCoord,
    /// Net attached to each physical pin.
    pub nets: Vec<Option<NetId>>,
    /// Position of each physical pin inside its net's pin list.
    pub net_pin_index: Vec<Option<usize>>,
    pub is_fixed: bool,
    /// Output pins used inside the block, per pin class; the router reserves
    /// that many OPINs of the class.
    pub local_opins: Vec<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetPin {
    pub block: BlockId,
    pub pin: usize,
}

#[derive(Clone, Debug)]
pub struct Net {
    pub name: String,
    /// Pin 0 drives the net; the rest are its sinks.
    pub pins: Vec<NetPin>,
    pub is_global: bool,
}

impl Net {
    pub fn source(&self) -> NetPin {
        self.pins[0]
    }

    pub fn sinks(&self) -> &[NetPin] {
        &self.pins[1..]
    }

    pub fn num_sinks(&self) -> usize {
        self.pins.len().saturating_sub(1)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Netlist {
    pub blocks: Vec<Block>,
    pub nets: Vec<Net>,
    pub block_name_map: HashMap<String, BlockId>,
    pub net_name_map: HashMap<String, NetId>,
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }

    pub fn add_block(
        &mut self,
        name: String,
        block_type: TypeId,
        num_pins: usize,
        num_classes: usize,
    ) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.block_name_map.insert(name.clone(), id);
        self.blocks.push(Block {
            name,
            block_type,
            loc: GridCoord::default(),
            nets: vec![None; num_pins],
            net_pin_index: vec![None; num_pins],
            is_fixed: false,
            local_opins: vec![0; num_classes],
        });
        id
    }

    pub fn add_net(&mut self, name: String, is_global: bool) -> NetId {
        if let Some(&id) = self.net_name_map.get(&name) {
            return id;
        }
        let id = NetId::new(self.nets.len());
        self.net_name_map.insert(name.clone(), id);
        self.nets.push(Net {
            name,
            pins: Vec::new(),
            is_global,
        });
        id
    }

    /// Appends `block.pin` to the net; the first pin added is the driver.
    pub fn add_pin(&mut self, net: NetId, block: BlockId, pin: usize) {
        let pins = &mut self.nets[net.index()].pins;
        let position = pins.len();
        pins.push(NetPin { block, pin });
        let b = &mut self.blocks[block.index()];
        b.nets[pin] = Some(net);
        b.net_pin_index[pin] = Some(position);
    }

    /// Nets attached to `block`, each listed once.
    pub fn block_nets(&self, block: BlockId) -> Vec<NetId> {
        let mut out: Vec<NetId> = Vec::new();
        for net in self.blocks[block.index()].nets.iter().flatten() {
            if !out.contains(net) {
                out.push(*net);
            }
        }
        out
    }

    /// True when some block appears more than once in the net's pin list.
    pub fn has_duplicate_blocks(&self, net: NetId) -> bool {
        let pins = &self.nets[net.index()].pins;
        pins.iter()
            .enumerate()
            .any(|(i, a)| pins[..i].iter().any(|b| b.block == a.block))
    }

    pub fn pin_loc(&self, pin: NetPin) -> GridCoord {
        self.blocks[pin.block.index()].loc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_record_their_position() {
        let mut netlist = Netlist::new();
        let a = netlist.add_block("a".into(), TypeId::new(1), 3, 2);
        let b = netlist.add_block("b".into(), TypeId::new(1), 3, 2);
        let n = netlist.add_net("n".into(), false);
        netlist.add_pin(n, a, 2);
        netlist.add_pin(n, b, 0);
        netlist.add_pin(n, b, 1);

        assert_eq!(netlist.net(n).source(), NetPin { block: a, pin: 2 });
        assert_eq!(netlist.net(n).num_sinks(), 2);
        assert_eq!(netlist.block(b).net_pin_index[1], Some(2));
        assert_eq!(netlist.block_nets(b), vec![n]);
        assert!(netlist.has_duplicate_blocks(n));
        assert_eq!(netlist.add_net("n".into(), false), n);
    }
}
