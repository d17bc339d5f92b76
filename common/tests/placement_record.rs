use fabric_common::db::core::Design;
use fabric_common::db::indices::BlockId;
use fabric_common::db::record::{read_placement, write_placement};
use fabric_common::error::FabricError;
use fabric_common::geom::coord::GridCoord;
use fabric_common::util::check::check_placement;
use fabric_common::util::config::{BenchmarkConfig, DeviceConfig};
use fabric_common::util::generator::generate_design;

fn packed_design() -> Design {
    let mut design =
        generate_design(&DeviceConfig::default(), &BenchmarkConfig::default()).unwrap();
    for i in 0..design.netlist.num_blocks() {
        let block = BlockId::new(i);
        let type_id = design.netlist.blocks[i].block_type;
        let slot = design
            .grid
            .anchors_of_type(type_id)
            .into_iter()
            .find_map(|(x, y)| {
                let tile = design.grid.tile(x, y);
                tile.blocks
                    .iter()
                    .position(|b| b.is_none())
                    .map(|z| GridCoord::new(x, y, z))
            })
            .unwrap();
        design.relocate(block, slot);
    }
    design
}

#[test]
fn placement_record_restores_locations() {
    let design = packed_design();
    check_placement(&design).unwrap();

    let mut text = Vec::new();
    write_placement(&mut text, &design, "default.arch").unwrap();

    let mut fresh =
        generate_design(&DeviceConfig::default(), &BenchmarkConfig::default()).unwrap();
    read_placement(text.as_slice(), &mut fresh).unwrap();
    check_placement(&fresh).unwrap();
    for (a, b) in design.netlist.blocks.iter().zip(&fresh.netlist.blocks) {
        assert_eq!(a.loc, b.loc, "block {}", a.name);
    }
}

#[test]
fn record_for_another_device_is_rejected() {
    let design = packed_design();
    let mut text = Vec::new();
    write_placement(&mut text, &design, "default.arch").unwrap();

    let mut device = DeviceConfig::default();
    device.nx = 14;
    let mut other = generate_design(&device, &BenchmarkConfig::default()).unwrap();
    let err = read_placement(text.as_slice(), &mut other).unwrap_err();
    assert!(matches!(err, FabricError::Parse { line: 2, .. }));
}

#[test]
fn corrupted_grid_fails_the_legality_check() {
    let mut design = packed_design();
    let loc = design.netlist.blocks[0].loc;
    design.grid.set_block(loc, None);
    let err = check_placement(&design).unwrap_err();
    assert!(err.is_internal());
}
