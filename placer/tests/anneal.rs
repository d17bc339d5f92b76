use fabric_common::db::core::Design;
use fabric_common::util::check::check_placement;
use fabric_common::util::config::{
    BenchmarkConfig, DeviceConfig, PlaceAlgorithm, PlaceCostType, PlacementConfig, ScheduleKind,
};
use fabric_common::util::generator::generate_design;
use fabric_placer::initial::initial_placement;
use fabric_placer::run_placement;
use fabric_placer::state::PlacementState;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn design() -> Design {
    let mut device = DeviceConfig::default();
    device.nx = 8;
    device.ny = 8;
    let bench = BenchmarkConfig {
        num_logic_blocks: 36,
        num_inputs: 6,
        num_outputs: 6,
        num_hard_blocks: 2,
        ..BenchmarkConfig::default()
    };
    generate_design(&device, &bench).unwrap()
}

fn random_cost(config: &PlacementConfig) -> f64 {
    let mut design = design();
    let mut rng = StdRng::seed_from_u64(config.seed);
    initial_placement(&mut design, config.pad_loc, &mut rng).unwrap();
    let mut state = PlacementState::new(&design, config);
    state.load_bb_cost(&design)
}

fn config(algorithm: PlaceAlgorithm, cost_type: PlaceCostType) -> PlacementConfig {
    PlacementConfig {
        algorithm,
        cost_type,
        inner_num: 1.0,
        ..PlacementConfig::default()
    }
}

#[test]
fn wirelength_annealing_beats_random_placement() {
    let config = config(PlaceAlgorithm::BoundingBox, PlaceCostType::Linear);
    let mut design = design();
    let result = run_placement(&mut design, &config).unwrap();
    check_placement(&design).unwrap();
    assert!(result.temperatures > 1);
    assert!(result.bb_cost < random_cost(&config));
    assert_eq!(result.cost, result.bb_cost);
}

#[test]
fn timing_driven_annealing_reports_timing() {
    let config = config(PlaceAlgorithm::NetTimingDriven, PlaceCostType::Linear);
    let mut design = design();
    let result = run_placement(&mut design, &config).unwrap();
    check_placement(&design).unwrap();
    assert!(result.timing_cost > 0.0);
    assert!(result.critical_path > 0.0);
    assert!(result.bb_cost < random_cost(&config));
}

#[test]
fn nonlinear_congestion_cost_runs_to_completion() {
    let config = config(PlaceAlgorithm::BoundingBox, PlaceCostType::NonlinearCongestion);
    let mut design = design();
    let result = run_placement(&mut design, &config).unwrap();
    check_placement(&design).unwrap();
    assert!(result.bb_cost > 0.0);
    assert!(result.bb_cost < random_cost(&config));
}

#[test]
fn same_seed_gives_same_placement() {
    let config = PlacementConfig {
        schedule: ScheduleKind::User,
        init_t: 1.0,
        alpha_t: 0.7,
        exit_t: 0.01,
        ..config(PlaceAlgorithm::BoundingBox, PlaceCostType::Linear)
    };
    let mut a = design();
    let mut b = design();
    let ra = run_placement(&mut a, &config).unwrap();
    let rb = run_placement(&mut b, &config).unwrap();
    assert_eq!(ra.bb_cost, rb.bb_cost);
    for (x, y) in a.netlist.blocks.iter().zip(&b.netlist.blocks) {
        assert_eq!(x.loc, y.loc);
    }
    // 1.0 * 0.7^n < 0.01 after 13 steps, plus the freeze pass.
    assert_eq!(ra.temperatures, 14);
}

#[test]
fn invalid_schedule_is_a_config_error() {
    let config = PlacementConfig {
        schedule: ScheduleKind::User,
        alpha_t: 1.5,
        ..PlacementConfig::default()
    };
    let mut design = design();
    let err = run_placement(&mut design, &config).unwrap_err();
    assert!(!err.is_internal());
}
