//! Deterministic synthetic benchmarks sized to a device.

use crate::db::arch::{Architecture, PinKind};
use crate::db::core::Design;
use crate::db::grid::DeviceGrid;
use crate::db::indices::{BlockId, TypeId};
use crate::db::netlist::Netlist;
use crate::error::{FabricError, Result};
use crate::util::config::{BenchmarkConfig, DeviceConfig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub fn generate_design(device: &DeviceConfig, bench: &BenchmarkConfig) -> Result<Design> {
    let arch = Architecture::from_config(device)?;
    let grid = DeviceGrid::build(&arch, device.nx, device.ny);
    let mut rng = StdRng::seed_from_u64(bench.seed);

    let clocked = device.clb_clocked;
    let hard_type = arch.type_by_name("mult");
    let num_hard = if hard_type.is_some() {
        bench.num_hard_blocks
    } else {
        0
    };

    let io_needed = bench.num_inputs + bench.num_outputs + usize::from(clocked);
    let demands = [
        (arch.io_type, io_needed),
        (arch.fill_type, bench.num_logic_blocks),
    ];
    for (type_id, needed) in demands
        .into_iter()
        .chain(hard_type.map(|t| (t, num_hard)))
    {
        let available = grid.slot_count(type_id);
        if needed > available {
            return Err(FabricError::Capacity {
                type_name: arch.block_type(type_id).name.clone(),
                needed,
                available,
            });
        }
    }

    let mut netlist = Netlist::new();
    let add = |netlist: &mut Netlist, name: String, type_id: TypeId| {
        let t = arch.block_type(type_id);
        netlist.add_block(name, type_id, t.num_pins, t.num_classes())
    };

    let inputs: Vec<BlockId> = (0..bench.num_inputs)
        .map(|i| add(&mut netlist, format!("in{}", i), arch.io_type))
        .collect();
    let outputs: Vec<BlockId> = (0..bench.num_outputs)
        .map(|i| add(&mut netlist, format!("out{}", i), arch.io_type))
        .collect();
    let logic: Vec<BlockId> = (0..bench.num_logic_blocks)
        .map(|i| add(&mut netlist, format!("clb{}", i), arch.fill_type))
        .collect();
    let hard: Vec<BlockId> = match hard_type {
        Some(t) => (0..num_hard)
            .map(|i| add(&mut netlist, format!("mult{}", i), t))
            .collect(),
        None => Vec::new(),
    };

    // Driver and receiver pins, excluding global ones.
    let pins_of = |netlist: &Netlist, block: BlockId, kind: PinKind| -> Vec<(BlockId, usize)> {
        let t = arch.block_type(netlist.blocks[block.index()].block_type);
        (0..t.num_pins)
            .filter(|&p| t.pin_kind(p) == kind && !t.is_global_pin[p])
            .map(|p| (block, p))
            .collect()
    };

    let mut drivers: Vec<(BlockId, usize)> = inputs.iter().map(|&b| (b, 0)).collect();
    for &b in logic.iter().chain(hard.iter()) {
        let outs = pins_of(&netlist, b, PinKind::Driver);
        // The first output always drives something; the rest only sometimes.
        for (k, pin) in outs.into_iter().enumerate() {
            if k == 0 || rng.gen_range(0.0..1.0) < 0.5 {
                drivers.push(pin);
            }
        }
    }

    let mut receivers: Vec<(BlockId, usize)> = Vec::new();
    for &b in logic.iter().chain(hard.iter()) {
        receivers.extend(pins_of(&netlist, b, PinKind::Receiver));
    }
    receivers.shuffle(&mut rng);
    // Output pads first so every one of them is connected.
    let mut queue: Vec<(BlockId, usize)> = outputs.iter().map(|&b| (b, 1)).collect();
    queue.extend(receivers);

    drivers.shuffle(&mut rng);
    drivers.truncate(queue.len());
    if drivers.is_empty() {
        return Err(FabricError::InvalidConfig(
            "benchmark has no connections to make".into(),
        ));
    }

    let mut fanout: Vec<Vec<(BlockId, usize)>> = vec![Vec::new(); drivers.len()];
    let mut next = 0;
    for sinks in fanout.iter_mut() {
        sinks.push(queue[next]);
        next += 1;
    }
    let targets: Vec<usize> = drivers
        .iter()
        .map(|_| rng.gen_range(1..=bench.max_fanout.max(1)))
        .collect();
    'fill: loop {
        let mut progressed = false;
        for (sinks, &target) in fanout.iter_mut().zip(&targets) {
            if next >= queue.len() {
                break 'fill;
            }
            if sinks.len() < target {
                sinks.push(queue[next]);
                next += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    for (k, (&(block, pin), sinks)) in drivers.iter().zip(&fanout).enumerate() {
        let net = netlist.add_net(format!("n{}", k), false);
        netlist.add_pin(net, block, pin);
        for &(sb, sp) in sinks {
            netlist.add_pin(net, sb, sp);
        }
    }

    if clocked {
        let clk_pad = add(&mut netlist, "clk_in".to_string(), arch.io_type);
        let clk = netlist.add_net("clk".to_string(), true);
        netlist.add_pin(clk, clk_pad, 0);
        let clb = arch.block_type(arch.fill_type);
        let clock_pin = (0..clb.num_pins).find(|&p| clb.is_global_pin[p]);
        if let Some(pin) = clock_pin {
            for &b in &logic {
                netlist.add_pin(clk, b, pin);
            }
        }
        if netlist.nets[clk.index()].pins.len() < 2 {
            return Err(FabricError::InvalidConfig(
                "clocked device but no clocked blocks".into(),
            ));
        }
    }

    // Spare outputs sometimes feed logic inside the block itself.
    for &b in &logic {
        let t = arch.block_type(arch.fill_type);
        for (class_idx, class) in t.classes.iter().enumerate() {
            if class.kind != PinKind::Driver {
                continue;
            }
            let free = class
                .pins
                .iter()
                .filter(|&&p| netlist.blocks[b.index()].nets[p].is_none())
                .count();
            if free > 0 && rng.gen_range(0.0..1.0) < bench.local_opin_fraction {
                netlist.blocks[b.index()].local_opins[class_idx] = 1;
            }
        }
    }

    log::info!(
        "Generated benchmark: {} blocks ({} io, {} logic, {} hard), {} nets on a {}x{} device",
        netlist.num_blocks(),
        io_needed,
        logic.len(),
        hard.len(),
        netlist.num_nets(),
        device.nx,
        device.ny
    );

    Ok(Design::new(
        format!("synthetic_{}", bench.seed),
        arch,
        grid,
        netlist,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::check::check_netlist;

    #[test]
    fn default_benchmark_is_well_formed() {
        let design =
            generate_design(&DeviceConfig::default(), &BenchmarkConfig::default()).unwrap();
        check_netlist(&design).unwrap();
        assert!(design.netlist.nets.iter().any(|n| n.is_global));
        // Every output pad has a net.
        for i in 0..BenchmarkConfig::default().num_outputs {
            let b = design.netlist.block_name_map[&format!("out{}", i)];
            assert!(design.netlist.blocks[b.index()].nets[1].is_some());
        }
    }

    #[test]
    fn same_seed_same_netlist() {
        let a = generate_design(&DeviceConfig::default(), &BenchmarkConfig::default()).unwrap();
        let b = generate_design(&DeviceConfig::default(), &BenchmarkConfig::default()).unwrap();
        assert_eq!(a.netlist.num_nets(), b.netlist.num_nets());
        for (na, nb) in a.netlist.nets.iter().zip(&b.netlist.nets) {
            assert_eq!(na.pins, nb.pins);
        }
    }

    #[test]
    fn oversized_benchmark_reports_capacity() {
        let mut bench = BenchmarkConfig::default();
        bench.num_logic_blocks = 10_000;
        let err = generate_design(&DeviceConfig::default(), &bench).unwrap_err();
        assert!(matches!(err, FabricError::Capacity { .. }));
    }
}
