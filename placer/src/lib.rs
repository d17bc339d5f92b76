//! Simulated-annealing placement onto an island-style device grid.

pub mod anneal;
pub mod cost;
pub mod initial;
pub mod moves;
pub mod state;

use anneal::Annealer;
use cost::{DelayModel, DeltaDelayModel};
use fabric_common::db::core::Design;
use fabric_common::error::Result;
use fabric_common::timing::{ConnectionTimingAnalyzer, TimingAnalyzer};
use fabric_common::util::check::{check_netlist, check_placement};
use fabric_common::util::config::PlacementConfig;
use fabric_common::util::profiler::ScopedTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use state::PlacementState;

#[derive(Clone, Debug, Default)]
pub struct PlacementResult {
    /// Final blended cost; 1-relative when timing-driven.
    pub cost: f64,
    pub bb_cost: f64,
    pub timing_cost: f64,
    pub delay_cost: f64,
    pub critical_path: f64,
    pub temperatures: usize,
    pub moves: usize,
}

/// Places `design` with the device delay model and the built-in
/// connection-level timing analyzer.
pub fn run_placement(design: &mut Design, config: &PlacementConfig) -> Result<PlacementResult> {
    let model = DeltaDelayModel::from_arch(&design.arch, design.grid.nx, design.grid.ny);
    let mut analyzer = ConnectionTimingAnalyzer;
    run_placement_with(design, config, &model, &mut analyzer)
}

pub fn run_placement_with(
    design: &mut Design,
    config: &PlacementConfig,
    model: &dyn DelayModel,
    analyzer: &mut dyn TimingAnalyzer,
) -> Result<PlacementResult> {
    config.validate()?;
    check_netlist(design)?;
    let _timer = ScopedTimer::new("Placement");

    let mut rng = StdRng::seed_from_u64(config.seed);
    initial::initial_placement(design, config.pad_loc, &mut rng)?;
    check_placement(design)?;

    log::info!(
        "Placing {} blocks and {} nets on a {}x{} grid ({:?}, {:?})",
        design.netlist.num_blocks(),
        design.netlist.num_nets(),
        design.grid.nx,
        design.grid.ny,
        config.algorithm,
        config.cost_type
    );

    let state = PlacementState::new(design, config);
    let mut annealer = Annealer::new(design, state, model, analyzer, rng, config);
    let summary = annealer.run()?;
    let state = annealer.state;

    check_placement(design)?;

    let result = PlacementResult {
        cost: state.cost,
        bb_cost: state.bb_cost,
        timing_cost: state.timing_cost,
        delay_cost: state.delay_cost,
        critical_path: state.critical_path,
        temperatures: summary.temperatures,
        moves: summary.moves,
    };
    log::info!(
        "Placement done: bb cost {:.6e}, timing cost {:.6e}, delay cost {:.6e}, est. critical path {:.4e} s ({} temperatures, {} moves)",
        result.bb_cost,
        result.timing_cost,
        result.delay_cost,
        result.critical_path,
        result.temperatures,
        result.moves
    );
    Ok(result)
}
