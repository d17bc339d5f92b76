use crate::cost::{BBoxCostModel, DelayModel, RegionCostModel, TimingCostModel};
use fabric_common::db::core::Design;
use fabric_common::db::indices::BlockId;
use fabric_common::error::{check_drift, Result};
use fabric_common::timing::TimingAnalyzer;
use fabric_common::util::config::{PlaceCostType, PlacementConfig};

/// Everything the annealer mutates besides the design itself: cached cost
/// models, running totals and the normalisation factors of the current
/// temperature step.
#[derive(Clone, Debug)]
pub struct PlacementState {
    pub bb: BBoxCostModel,
    pub regions: Option<RegionCostModel>,
    pub timing: Option<TimingCostModel>,
    /// Blocks the move generator may pick.
    pub movable: Vec<BlockId>,
    pub cost: f64,
    pub bb_cost: f64,
    pub timing_cost: f64,
    pub delay_cost: f64,
    pub critical_path: f64,
    pub inv_prev_bb_cost: f64,
    pub inv_prev_timing_cost: f64,
    pub timing_tradeoff: f64,
    pub rlim_escape_fraction: f64,
}

impl PlacementState {
    /// Builds the models around an already legal placement.
    pub fn new(design: &Design, config: &PlacementConfig) -> Self {
        let regions = (config.cost_type == PlaceCostType::NonlinearCongestion).then(|| {
            RegionCostModel::new(&design.grid, config.place_chan_width, config.num_regions)
        });
        let timing = config
            .is_timing_driven()
            .then(|| TimingCostModel::new(design));
        let movable = design
            .netlist
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_fixed)
            .map(|(i, _)| BlockId::new(i))
            .collect();

        Self {
            bb: BBoxCostModel::new(design, config.place_chan_width, config.place_cost_exp),
            regions,
            timing,
            movable,
            cost: 0.0,
            bb_cost: 0.0,
            timing_cost: 0.0,
            delay_cost: 0.0,
            critical_path: 0.0,
            inv_prev_bb_cost: 0.0,
            inv_prev_timing_cost: 0.0,
            timing_tradeoff: config.timing_tradeoff,
            rlim_escape_fraction: config.rlim_escape_fraction,
        }
    }

    pub fn is_timing_driven(&self) -> bool {
        self.timing.is_some()
    }

    /// Wiring cost from the cached boxes: the sum of net costs, or the
    /// region cost in nonlinear mode.
    pub fn load_bb_cost(&mut self, design: &Design) -> f64 {
        let linear = self.bb.load_from_scratch(design);
        self.bb_cost = match self.regions.as_mut() {
            Some(regions) => {
                regions.clear();
                for net in design.routable_nets() {
                    regions.update_occupancy(
                        &self.bb.bb_coords[net.index()],
                        design.netlist.net(net).pins.len(),
                        1.0,
                    );
                }
                regions.cost()
            }
            None => linear,
        };
        self.bb_cost
    }

    /// Re-runs timing analysis on fresh delays and reloads the timing table.
    pub fn refresh_timing(
        &mut self,
        design: &Design,
        model: &dyn DelayModel,
        analyzer: &mut dyn TimingAnalyzer,
        crit_exponent: f64,
    ) {
        let Some(timing) = self.timing.as_mut() else {
            return;
        };
        timing.load_delays(design, model);
        self.critical_path = timing.analyze(design, analyzer, crit_exponent);
        let (t, d) = timing.load_costs(design);
        self.timing_cost = t;
        self.delay_cost = d;
    }

    /// Refreshes the normalisation factors at the start of a temperature.
    pub fn renormalise(&mut self) {
        self.inv_prev_bb_cost = if self.bb_cost > 0.0 {
            1.0 / self.bb_cost
        } else {
            0.0
        };
        self.inv_prev_timing_cost = if self.timing_cost > 0.0 {
            1.0 / self.timing_cost
        } else {
            0.0
        };
    }

    /// Blended cost change of a move.
    pub fn combine(&self, bb_delta: f64, timing_delta: f64) -> f64 {
        if self.is_timing_driven() {
            (1.0 - self.timing_tradeoff) * bb_delta * self.inv_prev_bb_cost
                + self.timing_tradeoff * timing_delta * self.inv_prev_timing_cost
        } else {
            bb_delta
        }
    }

    /// Compares the running totals against a recomputation from the block
    /// locations, then adopts the recomputed values to shed rounding drift.
    pub fn reconcile(&mut self, design: &Design, model: &dyn DelayModel) -> Result<()> {
        let fresh_bb = match self.regions.as_ref() {
            Some(_) => {
                let mut check = self.clone();
                check.load_bb_cost(design)
            }
            None => self.bb.recompute_cost(design),
        };
        check_drift("bounding box", self.bb_cost, fresh_bb)?;
        self.bb_cost = fresh_bb;

        if let Some(timing) = self.timing.as_ref() {
            let (fresh_timing, fresh_delay) = timing.recompute_costs(design, model);
            check_drift("timing", self.timing_cost, fresh_timing)?;
            check_drift("delay", self.delay_cost, fresh_delay)?;
            self.timing_cost = fresh_timing;
            self.delay_cost = fresh_delay;
        }
        Ok(())
    }
}
