use fabric_common::db::arch::Architecture;
use fabric_common::db::core::Design;
use fabric_common::db::grid::DeviceGrid;
use fabric_common::db::indices::{BlockId, NetId};
use fabric_common::db::netlist::Netlist;
use fabric_common::geom::coord::GridCoord;
use fabric_common::geom::rect::GridRect;
use fabric_common::util::check::check_placement;
use fabric_common::util::config::{
    BenchmarkConfig, DeviceConfig, PlaceAlgorithm, PlaceCostType, PlacementConfig,
};
use fabric_common::util::generator::generate_design;
use fabric_placer::cost::bbox::SMALL_NET;
use fabric_placer::cost::{BBoxCostModel, DeltaDelayModel};
use fabric_placer::initial::initial_placement;
use fabric_placer::moves::{MoveOutcome, try_swap};
use fabric_placer::state::PlacementState;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn small_device() -> DeviceConfig {
    let mut device = DeviceConfig::default();
    device.nx = 6;
    device.ny = 6;
    device
}

fn small_design() -> Design {
    let bench = BenchmarkConfig {
        num_logic_blocks: 20,
        num_inputs: 4,
        num_outputs: 4,
        num_hard_blocks: 1,
        max_fanout: 7,
        ..BenchmarkConfig::default()
    };
    generate_design(&small_device(), &bench).unwrap()
}

/// Two logic blocks joined by a single two-pin net.
fn two_block_design(a: (usize, usize), b: (usize, usize)) -> Design {
    let device = small_device();
    let arch = Architecture::from_config(&device).unwrap();
    let grid = DeviceGrid::build(&arch, device.nx, device.ny);
    let clb = arch.block_type(arch.fill_type).clone();
    let mut netlist = Netlist::new();
    let ba = netlist.add_block("a".into(), arch.fill_type, clb.num_pins, clb.num_classes());
    let bb = netlist.add_block("b".into(), arch.fill_type, clb.num_pins, clb.num_classes());
    let net = netlist.add_net("n".into(), false);
    netlist.add_pin(net, ba, device.clb_inputs);
    netlist.add_pin(net, bb, 0);
    let mut design = Design::new("two".into(), arch, grid, netlist);
    design.relocate(ba, GridCoord::new(a.0, a.1, 0));
    design.relocate(bb, GridCoord::new(b.0, b.1, 0));
    design
}

#[test]
fn two_pin_net_on_one_row_costs_its_width() {
    let design = two_block_design((1, 3), (3, 3));
    let model = BBoxCostModel::new(&design, 100.0, 1.0);
    let (rect, _) = model.bb_from_scratch(&design, NetId::new(0));
    assert_eq!(rect, GridRect::new(1, 3, 3, 3));
    // Uniform channels of 100 tracks: F = 1 / 100.
    let cost = model.box_cost(&rect, 2);
    assert!((cost - 3.0 * 0.01).abs() < 1e-12, "cost {}", cost);
}

#[test]
fn box_cost_counts_both_directions() {
    let design = two_block_design((1, 1), (3, 2));
    let model = BBoxCostModel::new(&design, 100.0, 1.0);
    let rect = model.bb_without_edges(&design, NetId::new(0));
    assert!((model.box_cost(&rect, 2) - (3.0 + 2.0) * 0.01).abs() < 1e-12);
}

#[test]
fn incremental_boxes_match_scratch_after_moves() {
    for algorithm in [PlaceAlgorithm::BoundingBox, PlaceAlgorithm::NetTimingDriven] {
        let mut design = small_design();
        let config = PlacementConfig {
            algorithm,
            ..PlacementConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        initial_placement(&mut design, config.pad_loc, &mut rng).unwrap();

        let model = DeltaDelayModel::from_arch(&design.arch, design.grid.nx, design.grid.ny);
        let mut analyzer = fabric_common::timing::ConnectionTimingAnalyzer;
        let mut state = PlacementState::new(&design, &config);
        state.refresh_timing(&design, &model, &mut analyzer, 1.0);
        state.load_bb_cost(&design);
        state.renormalise();

        let large_nets: Vec<NetId> = design
            .routable_nets()
            .filter(|&n| design.netlist.net(n).num_sinks() >= SMALL_NET)
            .collect();
        assert!(!large_nets.is_empty());

        let mut accepted = 0;
        for i in 0..3000 {
            // Alternate hot and frozen moves so both branches run.
            let t = if i % 2 == 0 { 1e30 } else { 0.0 };
            if try_swap(&mut state, &mut design, &model, &mut rng, t, 3.0) == MoveOutcome::Accepted {
                accepted += 1;
            }
            if i % 500 == 0 {
                check_placement(&design).unwrap();
            }
        }
        assert!(accepted > 0);
        check_placement(&design).unwrap();

        for &net in &large_nets {
            let scratch = state.bb.bb_from_scratch(&design, net);
            assert_eq!(state.bb.bb_coords[net.index()], scratch.0);
            assert_eq!(state.bb.bb_edges[net.index()], scratch.1);
        }
        let fresh = state.bb.recompute_cost(&design);
        assert!((state.bb_cost - fresh).abs() <= fresh * 0.0025);
        state.reconcile(&design, &model).unwrap();
    }
}

#[test]
fn rejected_moves_restore_region_occupancy() {
    let mut design = small_design();
    let config = PlacementConfig {
        algorithm: PlaceAlgorithm::BoundingBox,
        cost_type: PlaceCostType::NonlinearCongestion,
        ..PlacementConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(11);
    initial_placement(&mut design, config.pad_loc, &mut rng).unwrap();
    let model = DeltaDelayModel::from_arch(&design.arch, design.grid.nx, design.grid.ny);
    let mut state = PlacementState::new(&design, &config);
    state.load_bb_cost(&design);

    let cost_before = state.regions.as_ref().unwrap().cost();
    // Frozen and starting from a random placement: rejections are common.
    let mut rejected = 0;
    for _ in 0..200 {
        let snapshot: Vec<GridCoord> = design.netlist.blocks.iter().map(|b| b.loc).collect();
        let region_cost = state.regions.as_ref().unwrap().cost();
        match try_swap(&mut state, &mut design, &model, &mut rng, 0.0, 6.0) {
            MoveOutcome::Rejected => {
                rejected += 1;
                let after: Vec<GridCoord> = design.netlist.blocks.iter().map(|b| b.loc).collect();
                assert_eq!(snapshot, after);
                let now = state.regions.as_ref().unwrap().cost();
                assert!((now - region_cost).abs() <= 1e-9 * region_cost.max(1.0));
            }
            MoveOutcome::Accepted => {
                assert!(state.regions.as_ref().unwrap().cost() <= region_cost + 1e-9);
            }
            MoveOutcome::Aborted => {}
        }
    }
    assert!(rejected > 0);
    assert!(state.bb_cost <= cost_before + 1e-9);
    state.reconcile(&design, &model).unwrap();
}

#[test]
fn fixed_blocks_never_move() {
    let mut design = small_design();
    let config = PlacementConfig {
        pad_loc: fabric_common::util::config::PadLocation::Random,
        ..PlacementConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(5);
    initial_placement(&mut design, config.pad_loc, &mut rng).unwrap();
    let pads: Vec<(BlockId, GridCoord)> = (0..design.netlist.num_blocks())
        .map(BlockId::new)
        .filter(|&b| design.is_io_block(b))
        .map(|b| (b, design.netlist.block(b).loc))
        .collect();
    assert!(pads.iter().all(|&(b, _)| design.netlist.block(b).is_fixed));

    let model = DeltaDelayModel::from_arch(&design.arch, design.grid.nx, design.grid.ny);
    let mut state = PlacementState::new(&design, &config);
    state.load_bb_cost(&design);
    for _ in 0..1000 {
        try_swap(&mut state, &mut design, &model, &mut rng, 1e30, 6.0);
    }
    for (b, loc) in pads {
        assert_eq!(design.netlist.block(b).loc, loc);
    }
}
