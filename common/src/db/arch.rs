//! Block types, column layout rules and the routing fabric parameters
//! (switches, wire segments, connection-block flexibility).

use crate::db::indices::{SwitchId, TypeId};
use crate::error::{FabricError, Result};
use crate::util::config::{ChannelDistribution, DeviceConfig, Directionality};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinKind {
    Driver,
    Receiver,
}

/// Logically equivalent pins of a block: a router may use any of them.
#[derive(Clone, Debug)]
pub struct PinClass {
    pub kind: PinKind,
    pub pins: Vec<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];
}

#[derive(Clone, Debug)]
pub struct BlockType {
    pub name: String,
    /// Pins of one sub-block.
    pub num_pins: usize,
    /// Sub-blocks per tile.
    pub capacity: usize,
    /// Tiles spanned vertically.
    pub height: usize,
    pub classes: Vec<PinClass>,
    pub pin_class: Vec<usize>,
    pub is_global_pin: Vec<bool>,
    /// Row offset and tile side of each pin; unused for perimeter types,
    /// whose pins face the core.
    pub pin_locations: Vec<(usize, Side)>,
    pub is_io: bool,
}

impl BlockType {
    /// Builds a type from its pin classes. Pins are numbered in class order
    /// and spread round-robin over the sides of the footprint.
    pub fn new(
        name: &str,
        capacity: usize,
        height: usize,
        class_spec: &[(PinKind, usize, bool)],
        is_io: bool,
    ) -> Self {
        let mut classes = Vec::with_capacity(class_spec.len());
        let mut pin_class = Vec::new();
        let mut is_global_pin = Vec::new();
        for (class_idx, &(kind, count, global)) in class_spec.iter().enumerate() {
            let first = pin_class.len();
            classes.push(PinClass {
                kind,
                pins: (first..first + count).collect(),
            });
            pin_class.extend(std::iter::repeat_n(class_idx, count));
            is_global_pin.extend(std::iter::repeat_n(global, count));
        }
        let num_pins = pin_class.len();
        let height = height.max(1);
        // Top pins sit on the upper row and bottom pins on the lower one so
        // every pin faces a channel.
        let pin_locations = (0..num_pins)
            .map(|pin| {
                let side = Side::ALL[pin % 4];
                let row = match side {
                    Side::Top => height - 1,
                    Side::Bottom => 0,
                    Side::Left | Side::Right => (pin / 4) % height,
                };
                (row, side)
            })
            .collect();
        Self {
            name: name.to_string(),
            num_pins,
            capacity,
            height,
            classes,
            pin_class,
            is_global_pin,
            pin_locations,
            is_io,
        }
    }

    pub fn pin_kind(&self, pin: usize) -> PinKind {
        self.classes[self.pin_class[pin]].kind
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }
}

/// Assigns `type_id` to every interior column `start, start + repeat, ...`
/// (only `start` itself when `repeat` is 0). Higher priority wins.
#[derive(Clone, Copy, Debug)]
pub struct ColumnRule {
    pub type_id: TypeId,
    pub start: usize,
    pub repeat: usize,
    pub priority: usize,
}

impl ColumnRule {
    pub fn matches(&self, x: usize) -> bool {
        if x < self.start {
            return false;
        }
        if self.repeat == 0 {
            x == self.start
        } else {
            (x - self.start) % self.repeat == 0
        }
    }
}

#[derive(Clone, Debug)]
pub struct SwitchInfo {
    pub name: String,
    pub buffered: bool,
    pub r: f64,
    pub c_in: f64,
    pub c_out: f64,
    pub t_del: f64,
}

#[derive(Clone, Debug)]
pub struct SegmentInfo {
    pub length: usize,
    pub frequency: f64,
    /// Per-tile metal resistance and capacitance.
    pub r_metal: f64,
    pub c_metal: f64,
    pub wire_switch: SwitchId,
    pub opin_switch: SwitchId,
}

#[derive(Clone, Debug)]
pub struct Architecture {
    pub types: Vec<BlockType>,
    pub io_type: TypeId,
    pub fill_type: TypeId,
    pub column_rules: Vec<ColumnRule>,
    pub io_rat: usize,
    /// Index 0 is the delay-less switch used inside blocks.
    pub switches: Vec<SwitchInfo>,
    pub segments: Vec<SegmentInfo>,
    pub ipin_switch: SwitchId,
    pub directionality: Directionality,
    pub fs: usize,
    pub fc_in: f64,
    pub fc_out: f64,
    pub fc_pad: f64,
    pub chan_width_x: ChannelDistribution,
    pub chan_width_y: ChannelDistribution,
    pub chan_width_io: f64,
}

pub const DELAYLESS_SWITCH: SwitchId = SwitchId(0);

impl Architecture {
    pub fn from_config(device: &DeviceConfig) -> Result<Self> {
        device.validate()?;

        let mut types = Vec::new();
        types.push(BlockType::new(
            "io",
            device.io_rat,
            1,
            &[(PinKind::Driver, 1, false), (PinKind::Receiver, 1, false)],
            true,
        ));

        let mut clb_classes = vec![
            (PinKind::Receiver, device.clb_inputs, false),
            (PinKind::Driver, device.clb_outputs, false),
        ];
        if device.clb_clocked {
            clb_classes.push((PinKind::Receiver, 1, true));
        }
        types.push(BlockType::new("clb", 1, 1, &clb_classes, false));

        let mut column_rules = Vec::new();
        let hard = &device.hard_block;
        if hard.enabled {
            types.push(BlockType::new(
                "mult",
                1,
                hard.height,
                &[
                    (PinKind::Receiver, hard.inputs, false),
                    (PinKind::Driver, hard.outputs, false),
                ],
                false,
            ));
            column_rules.push(ColumnRule {
                type_id: TypeId::new(2),
                start: hard.start,
                repeat: hard.repeat,
                priority: 1,
            });
        }

        let mut switches = vec![SwitchInfo {
            name: "__delayless".to_string(),
            buffered: true,
            r: 0.0,
            c_in: 0.0,
            c_out: 0.0,
            t_del: 0.0,
        }];
        switches.extend(device.switches.iter().map(|s| SwitchInfo {
            name: s.name.clone(),
            buffered: s.buffered,
            r: s.r,
            c_in: s.c_in,
            c_out: s.c_out,
            t_del: s.t_del,
        }));

        let lookup = |name: &str| -> Result<SwitchId> {
            switches
                .iter()
                .position(|s| s.name == name)
                .map(SwitchId::new)
                .ok_or_else(|| FabricError::InvalidConfig(format!("unknown switch '{}'", name)))
        };

        let segments = device
            .segments
            .iter()
            .map(|seg| {
                Ok(SegmentInfo {
                    length: seg.length,
                    frequency: seg.frequency,
                    r_metal: seg.r_metal,
                    c_metal: seg.c_metal,
                    wire_switch: lookup(&seg.wire_switch)?,
                    opin_switch: lookup(&seg.opin_switch)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let ipin_switch = lookup(&device.ipin_switch)?;

        Ok(Self {
            types,
            io_type: TypeId::new(0),
            fill_type: TypeId::new(1),
            column_rules,
            io_rat: device.io_rat,
            switches,
            segments,
            ipin_switch,
            directionality: device.directionality,
            fs: device.fs,
            fc_in: device.fc_in,
            fc_out: device.fc_out,
            fc_pad: device.fc_pad,
            chan_width_x: device.chan_width_x.clone(),
            chan_width_y: device.chan_width_y.clone(),
            chan_width_io: device.chan_width_io,
        })
    }

    pub fn block_type(&self, id: TypeId) -> &BlockType {
        &self.types[id.index()]
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.name == name)
            .map(TypeId::new)
    }

    /// Type of interior column `x`.
    pub fn column_type(&self, x: usize) -> TypeId {
        self.column_rules
            .iter()
            .filter(|rule| rule.matches(x))
            .max_by_key(|rule| rule.priority)
            .map(|rule| rule.type_id)
            .unwrap_or(self.fill_type)
    }

    pub fn switch(&self, id: SwitchId) -> &SwitchInfo {
        &self.switches[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_architecture_has_expected_types() {
        let arch = Architecture::from_config(&DeviceConfig::default()).unwrap();
        assert_eq!(arch.types.len(), 3);
        let clb = arch.block_type(arch.fill_type);
        assert_eq!(clb.num_pins, 4 + 2 + 1);
        assert_eq!(clb.pin_kind(0), PinKind::Receiver);
        assert_eq!(clb.pin_kind(4), PinKind::Driver);
        assert!(clb.is_global_pin[6]);
        assert_eq!(arch.switch(DELAYLESS_SWITCH).t_del, 0.0);
        assert_eq!(arch.switch(arch.ipin_switch).name, "cblock");
    }

    #[test]
    fn column_rules_repeat_and_fall_back() {
        let arch = Architecture::from_config(&DeviceConfig::default()).unwrap();
        let mult = arch.type_by_name("mult").unwrap();
        assert_eq!(arch.column_type(4), mult);
        assert_eq!(arch.column_type(10), mult);
        assert_eq!(arch.column_type(5), arch.fill_type);
        assert_eq!(arch.column_type(1), arch.fill_type);
    }
}
