//! The annealing controller: `INIT -> (ANNEAL_STEP)* -> FREEZE -> DONE`.

pub mod schedule;

use crate::cost::DelayModel;
use crate::moves::{MoveOutcome, try_swap};
use crate::state::PlacementState;
use fabric_common::db::core::Design;
use fabric_common::error::Result;
use fabric_common::timing::TimingAnalyzer;
use fabric_common::util::config::{PlacementConfig, ScheduleKind};
use rand::rngs::StdRng;
use schedule::{Schedule, crit_exponent, move_limit, std_dev, update_rlim};

/// Accumulated moves after which running totals are checked against a
/// full recomputation.
pub const MAX_MOVES_BEFORE_RECOMPUTE: usize = 50_000;

const HUGE_TEMPERATURE: f64 = 1e30;

#[derive(Clone, Copy, Debug, Default)]
pub struct StepStats {
    pub success_ratio: f64,
    pub av_cost: f64,
    pub av_bb_cost: f64,
    pub av_timing_cost: f64,
    pub av_delay_cost: f64,
    pub std_dev: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AnnealSummary {
    pub temperatures: usize,
    pub moves: usize,
}

pub struct Annealer<'a> {
    pub design: &'a mut Design,
    pub state: PlacementState,
    pub model: &'a dyn DelayModel,
    pub analyzer: &'a mut dyn TimingAnalyzer,
    pub rng: StdRng,
    schedule: Schedule,
    inner_num: f64,
    exp_first: f64,
    exp_last: f64,
    recompute_crit_iter: usize,
    inner_loop_recompute_divider: usize,
    crit_exponent: f64,
}

impl<'a> Annealer<'a> {
    pub fn new(
        design: &'a mut Design,
        state: PlacementState,
        model: &'a dyn DelayModel,
        analyzer: &'a mut dyn TimingAnalyzer,
        rng: StdRng,
        config: &PlacementConfig,
    ) -> Self {
        Self {
            design,
            state,
            model,
            analyzer,
            rng,
            schedule: Schedule::from_config(config),
            inner_num: config.inner_num,
            exp_first: config.td_place_exp_first,
            exp_last: config.td_place_exp_last,
            recompute_crit_iter: config.recompute_crit_iter,
            inner_loop_recompute_divider: config.inner_loop_recompute_divider,
            crit_exponent: config.td_place_exp_first,
        }
    }

    fn refresh_timing(&mut self) {
        self.state
            .refresh_timing(self.design, self.model, self.analyzer, self.crit_exponent);
    }

    /// INIT: criticalities, costs and normalisation of the starting placement.
    pub fn initialise(&mut self) {
        self.refresh_timing();
        self.state.load_bb_cost(self.design);
        self.state.renormalise();
        self.state.cost = if self.state.is_timing_driven() {
            1.0
        } else {
            self.state.bb_cost
        };
    }

    /// Twenty standard deviations of the cost over a burst of moves that
    /// are all accepted.
    pub fn starting_temperature(&mut self, move_lim: usize) -> f64 {
        if self.schedule.kind == ScheduleKind::User {
            return self.schedule.init_t;
        }
        let tries = move_lim.min(self.design.netlist.num_blocks());
        let mut accepted = 0usize;
        let mut av = 0.0;
        let mut sum_sq = 0.0;
        let rlim = self.rlim_upper();
        for _ in 0..tries {
            if self.swap(HUGE_TEMPERATURE, rlim) == MoveOutcome::Accepted {
                accepted += 1;
                av += self.state.cost;
                sum_sq += self.state.cost * self.state.cost;
            }
        }
        if accepted > 0 {
            av /= accepted as f64;
        }
        if accepted != tries {
            log::warn!(
                "Starting temperature: only {} of {} moves accepted",
                accepted,
                tries
            );
        }
        20.0 * std_dev(accepted, sum_sq, av)
    }

    fn swap(&mut self, t: f64, rlim: f64) -> MoveOutcome {
        try_swap(
            &mut self.state,
            self.design,
            self.model,
            &mut self.rng,
            t,
            rlim,
        )
    }

    fn rlim_upper(&self) -> f64 {
        self.design.grid.nx.max(self.design.grid.ny) as f64
    }

    /// Runs `move_lim` moves at temperature `t`.
    fn run_moves(&mut self, t: f64, rlim: f64, move_lim: usize, inner_recompute_limit: usize) -> StepStats {
        let mut success = 0usize;
        let mut stats = StepStats::default();
        let mut sum_sq = 0.0;
        let mut inner_crit_count = 1;

        for inner_iter in 0..move_lim {
            if self.swap(t, rlim) == MoveOutcome::Accepted {
                success += 1;
                stats.av_cost += self.state.cost;
                stats.av_bb_cost += self.state.bb_cost;
                stats.av_timing_cost += self.state.timing_cost;
                stats.av_delay_cost += self.state.delay_cost;
                sum_sq += self.state.cost * self.state.cost;
            }

            if self.state.is_timing_driven() {
                if inner_crit_count >= inner_recompute_limit && inner_iter != move_lim - 1 {
                    inner_crit_count = 0;
                    self.refresh_timing();
                }
                inner_crit_count += 1;
            }
        }

        stats.success_ratio = success as f64 / move_lim as f64;
        if success == 0 {
            stats.av_cost = self.state.cost;
            stats.av_bb_cost = self.state.bb_cost;
            stats.av_timing_cost = self.state.timing_cost;
            stats.av_delay_cost = self.state.delay_cost;
        } else {
            let n = success as f64;
            stats.av_cost /= n;
            stats.av_bb_cost /= n;
            stats.av_timing_cost /= n;
            stats.av_delay_cost /= n;
        }
        stats.std_dev = std_dev(success, sum_sq, stats.av_cost);
        stats
    }

    pub fn run(&mut self) -> Result<AnnealSummary> {
        self.initialise();

        let num_blocks = self.design.netlist.num_blocks();
        let num_nets = self.design.routable_nets().count();
        let move_lim = move_limit(self.inner_num, num_blocks);
        let inner_recompute_limit = if self.inner_loop_recompute_divider != 0 {
            ((0.5 + move_lim as f64 / self.inner_loop_recompute_divider as f64) as usize).max(1)
        } else {
            move_lim + 1
        };

        let first_rlim = self.rlim_upper();
        let final_rlim = 1.0;
        let mut rlim = first_rlim;

        let mut t = self.starting_temperature(move_lim);
        log::info!(
            "Initial placement cost: {:.6e} (bb {:.6e}, timing {:.6e}, delay {:.6e}), T = {:.4e}, {} moves per temperature",
            self.state.cost,
            self.state.bb_cost,
            self.state.timing_cost,
            self.state.delay_cost,
            t,
            move_lim
        );
        log::info!(
            "{:>10} {:>11} {:>11} {:>11} {:>11} {:>7} {:>10} {:>7} {:>6}",
            "T",
            "Cost",
            "Av BB",
            "Av TD",
            "Av Delay",
            "Ac Rate",
            "Std Dev",
            "R lim",
            "Crit"
        );

        let mut summary = AnnealSummary::default();
        let mut moves_since_recompute = 0usize;
        let mut outer_crit_count = 1usize;

        while !self.schedule.should_exit(t, self.state.cost, num_nets) {
            if self.state.is_timing_driven() {
                self.state.cost = 1.0;
                if outer_crit_count >= self.recompute_crit_iter
                    || inner_recompute_limit != move_lim + 1
                {
                    outer_crit_count = 0;
                    self.refresh_timing();
                }
                outer_crit_count += 1;
            }
            self.state.renormalise();

            let stats = self.run_moves(t, rlim, move_lim, inner_recompute_limit);

            moves_since_recompute += move_lim;
            if moves_since_recompute > MAX_MOVES_BEFORE_RECOMPUTE {
                self.state.reconcile(self.design, self.model)?;
                moves_since_recompute = 0;
            }
            summary.moves += move_lim;
            summary.temperatures += 1;

            let old_t = t;
            t = self.schedule.next_temperature(t, rlim, stats.success_ratio);
            log::info!(
                "{:>10.4e} {:>11.5e} {:>11.5e} {:>11.5e} {:>11.5e} {:>7.4} {:>10.4e} {:>7.3} {:>6.3}",
                old_t,
                stats.av_cost,
                stats.av_bb_cost,
                stats.av_timing_cost,
                stats.av_delay_cost,
                stats.success_ratio,
                stats.std_dev,
                rlim,
                self.crit_exponent
            );

            rlim = update_rlim(rlim, stats.success_ratio, self.rlim_upper());
            if self.state.is_timing_driven() {
                self.crit_exponent =
                    crit_exponent(rlim, first_rlim, final_rlim, self.exp_first, self.exp_last);
            }
        }

        // FREEZE: greedy pass at zero temperature.
        if self.state.is_timing_driven() {
            self.state.cost = 1.0;
            self.refresh_timing();
        }
        self.state.renormalise();
        let stats = self.run_moves(0.0, rlim, move_lim, inner_recompute_limit);
        summary.moves += move_lim;
        summary.temperatures += 1;
        log::info!(
            "{:>10.4e} {:>11.5e} {:>11.5e} {:>11.5e} {:>11.5e} {:>7.4} {:>10.4e} {:>7.3} {:>6.3}",
            0.0,
            stats.av_cost,
            stats.av_bb_cost,
            stats.av_timing_cost,
            stats.av_delay_cost,
            stats.success_ratio,
            stats.std_dev,
            rlim,
            self.crit_exponent
        );

        self.state.reconcile(self.design, self.model)?;
        Ok(summary)
    }
}
