//! Per-connection timing cost, `criticality x delay`, kept in step with
//! accepted moves. Criticalities come from the timing analyzer and are only
//! refreshed on the annealer's recompute cadence.

use super::delay::DelayModel;
use fabric_common::db::core::Design;
use fabric_common::db::indices::{BlockId, NetId};
use fabric_common::db::sinks::{NetSinkTable, SOURCE_PIN};
use fabric_common::timing::TimingAnalyzer;

#[derive(Clone, Copy, Debug)]
struct PendingConnection {
    net: NetId,
    pin: usize,
    delay: f64,
    timing: f64,
}

#[derive(Clone, Debug)]
pub struct TimingCostModel {
    pub delay: NetSinkTable<f64>,
    pub timing: NetSinkTable<f64>,
    pub slack: NetSinkTable<f64>,
    pub crit: NetSinkTable<f64>,
    pending: Vec<PendingConnection>,
}

impl TimingCostModel {
    pub fn new(design: &Design) -> Self {
        let zeros = design.sink_table(0.0);
        Self {
            delay: zeros.clone(),
            timing: zeros.clone(),
            slack: zeros.clone(),
            crit: zeros,
            pending: Vec::new(),
        }
    }

    fn connection_delay(design: &Design, model: &dyn DelayModel, net: NetId, pin: usize) -> f64 {
        let n = design.netlist.net(net);
        model.delay(design, n.source().block, n.pins[pin].block)
    }

    /// Fills the delay table for every routed connection.
    pub fn load_delays(&mut self, design: &Design, model: &dyn DelayModel) {
        for net in design.routable_nets() {
            for pin in 1..=design.netlist.net(net).num_sinks() {
                self.delay[(net, pin)] = Self::connection_delay(design, model, net, pin);
            }
        }
    }

    /// Slack and criticality from the current delays; returns the critical
    /// path delay.
    pub fn analyze(
        &mut self,
        design: &Design,
        analyzer: &mut dyn TimingAnalyzer,
        exponent: f64,
    ) -> f64 {
        let worst = analyzer.compute_slacks(&design.netlist, &self.delay, &mut self.slack);
        analyzer.load_criticalities(&design.netlist, &self.slack, worst, exponent, &mut self.crit);
        worst
    }

    /// Rebuilds the timing table and returns `(timing_cost, delay_cost)`.
    pub fn load_costs(&mut self, design: &Design) -> (f64, f64) {
        let mut timing_cost = 0.0;
        let mut delay_cost = 0.0;
        for net in design.routable_nets() {
            for pin in 1..=design.netlist.net(net).num_sinks() {
                let d = self.delay[(net, pin)];
                let t = self.crit[(net, pin)] * d;
                self.timing[(net, pin)] = t;
                timing_cost += t;
                delay_cost += d;
            }
        }
        (timing_cost, delay_cost)
    }

    /// `(timing_cost, delay_cost)` from fresh delays and the current
    /// criticalities, leaving the tables alone.
    pub fn recompute_costs(&self, design: &Design, model: &dyn DelayModel) -> (f64, f64) {
        let mut timing_cost = 0.0;
        let mut delay_cost = 0.0;
        for net in design.routable_nets() {
            for pin in 1..=design.netlist.net(net).num_sinks() {
                let d = Self::connection_delay(design, model, net, pin);
                timing_cost += self.crit[(net, pin)] * d;
                delay_cost += d;
            }
        }
        (timing_cost, delay_cost)
    }

    fn stage(&mut self, design: &Design, model: &dyn DelayModel, net: NetId, pin: usize) -> (f64, f64) {
        let delay = Self::connection_delay(design, model, net, pin);
        let timing = self.crit[(net, pin)] * delay;
        self.pending.push(PendingConnection {
            net,
            pin,
            delay,
            timing,
        });
        (timing - self.timing[(net, pin)], delay - self.delay[(net, pin)])
    }

    /// Stages the connections of `block` whose delay a swap of `b_from` and
    /// `b_to` changes and returns `(delta_timing, delta_delay)`. Call once for
    /// each moved block; a sink pin is skipped when its driver also moved,
    /// since the driver's pass already covers every sink of the net.
    pub fn propose_block(
        &mut self,
        design: &Design,
        model: &dyn DelayModel,
        block: BlockId,
        b_from: BlockId,
        b_to: Option<BlockId>,
    ) -> (f64, f64) {
        let mut delta_timing = 0.0;
        let mut delta_delay = 0.0;
        let b = design.netlist.block(block);
        for (pin, net) in b.nets.iter().enumerate() {
            let Some(net) = *net else { continue };
            let n = design.netlist.net(net);
            if n.is_global {
                continue;
            }
            let Some(net_pin) = b.net_pin_index[pin] else {
                continue;
            };
            if net_pin == SOURCE_PIN {
                for sink in 1..=n.num_sinks() {
                    let (dt, dd) = self.stage(design, model, net, sink);
                    delta_timing += dt;
                    delta_delay += dd;
                }
            } else {
                let driver = n.source().block;
                if driver != b_from && Some(driver) != b_to {
                    let (dt, dd) = self.stage(design, model, net, net_pin);
                    delta_timing += dt;
                    delta_delay += dd;
                }
            }
        }
        (delta_timing, delta_delay)
    }

    pub fn commit(&mut self) {
        for p in self.pending.drain(..) {
            self.delay[(p.net, p.pin)] = p.delay;
            self.timing[(p.net, p.pin)] = p.timing;
        }
    }

    pub fn discard(&mut self) {
        self.pending.clear();
    }
}
