use fabric_common::db::arch::Architecture;
use fabric_common::db::core::Design;
use fabric_common::db::indices::BlockId;

/// Estimated delay of a connection between two placed blocks.
pub trait DelayModel {
    fn delay(&self, design: &Design, source: BlockId, sink: BlockId) -> f64;
}

/// Delay looked up by `|dx|, |dy|` in one of four tables, chosen by whether
/// each end is an I/O pad. Tables are filled from the segment and switch
/// RC parameters: an OPIN switch, enough wires of each segment type to
/// cover the distance, and an IPIN switch, averaged over segment
/// frequencies.
#[derive(Clone, Debug)]
pub struct DeltaDelayModel {
    logic_to_logic: Vec<Vec<f64>>,
    io_to_logic: Vec<Vec<f64>>,
    logic_to_io: Vec<Vec<f64>>,
    io_to_io: Vec<Vec<f64>>,
}

impl DeltaDelayModel {
    pub fn from_arch(arch: &Architecture, nx: usize, ny: usize) -> Self {
        let table = |src_io: bool, sink_io: bool| -> Vec<Vec<f64>> {
            (0..=nx + 1)
                .map(|dx| {
                    (0..=ny + 1)
                        .map(|dy| analytic_delay(arch, dx, dy, src_io, sink_io))
                        .collect()
                })
                .collect()
        };
        Self {
            logic_to_logic: table(false, false),
            io_to_logic: table(true, false),
            logic_to_io: table(false, true),
            io_to_io: table(true, true),
        }
    }

    pub fn lookup(&self, dx: usize, dy: usize, src_io: bool, sink_io: bool) -> f64 {
        let table = match (src_io, sink_io) {
            (false, false) => &self.logic_to_logic,
            (true, false) => &self.io_to_logic,
            (false, true) => &self.logic_to_io,
            (true, true) => &self.io_to_io,
        };
        table[dx][dy]
    }
}

impl DelayModel for DeltaDelayModel {
    fn delay(&self, design: &Design, source: BlockId, sink: BlockId) -> f64 {
        let a = design.netlist.block(source).loc;
        let b = design.netlist.block(sink).loc;
        self.lookup(
            a.x.abs_diff(b.x),
            a.y.abs_diff(b.y),
            design.is_io_block(source),
            design.is_io_block(sink),
        )
    }
}

/// A pad sits one tile outside the core next to its channel, so it saves
/// one tile of wire along the axis it is offset on.
fn analytic_delay(arch: &Architecture, dx: usize, dy: usize, src_io: bool, sink_io: bool) -> f64 {
    let pads = usize::from(src_io) + usize::from(sink_io);
    let (mut dx, mut dy) = (dx, dy);
    for _ in 0..pads {
        if dx >= dy {
            dx = dx.saturating_sub(1);
        } else {
            dy = dy.saturating_sub(1);
        }
    }

    let ipin = arch.switch(arch.ipin_switch);
    let total_freq: f64 = arch.segments.iter().map(|s| s.frequency).sum();
    let mut wire_delay = 0.0;
    let mut opin_delay = 0.0;
    for seg in &arch.segments {
        let len = seg.length as f64;
        let r_wire = seg.r_metal * len;
        let c_wire = seg.c_metal * len;
        let sw = arch.switch(seg.wire_switch);
        let opin = arch.switch(seg.opin_switch);
        let c_total = c_wire + sw.c_out + ipin.c_in;

        let per_wire = if sw.buffered {
            sw.t_del + sw.r * c_total + 0.5 * r_wire * c_wire
        } else {
            sw.t_del + (0.5 * sw.r + r_wire) * c_total
        };
        let num_wires = (dx.div_ceil(seg.length) + dy.div_ceil(seg.length)).max(1);
        let weight = seg.frequency / total_freq;
        wire_delay += weight * num_wires as f64 * per_wire;
        opin_delay += weight * (opin.t_del + opin.r * c_total);
    }
    opin_delay + wire_delay + ipin.t_del
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_common::util::config::DeviceConfig;

    #[test]
    fn delay_grows_with_distance() {
        let arch = Architecture::from_config(&DeviceConfig::default()).unwrap();
        let model = DeltaDelayModel::from_arch(&arch, 12, 12);
        let near = model.lookup(1, 0, false, false);
        let far = model.lookup(9, 7, false, false);
        assert!(near > 0.0);
        assert!(far > near);
        assert!(model.lookup(0, 0, false, false) > 0.0);
        assert!(model.lookup(4, 0, true, false) <= model.lookup(4, 0, false, false));
    }
}
