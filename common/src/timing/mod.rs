//! Connection slack and criticality.
//!
//! Both engines talk to the analyzer through [`TimingAnalyzer`]; the
//! [`ConnectionTimingAnalyzer`] shipped here measures slack against the
//! slowest single connection, which is enough to drive the placement and
//! routing cost functions end to end.

use crate::db::indices::NetId;
use crate::db::netlist::Netlist;
use crate::db::sinks::NetSinkTable;

pub trait TimingAnalyzer {
    /// Fills `net_slack` from `net_delay` and returns the critical-path delay.
    fn compute_slacks(
        &mut self,
        netlist: &Netlist,
        net_delay: &NetSinkTable<f64>,
        net_slack: &mut NetSinkTable<f64>,
    ) -> f64;

    /// `crit = clamp(1 - slack / worst, 0, 1) ^ exponent` for every
    /// non-global connection.
    fn load_criticalities(
        &self,
        netlist: &Netlist,
        net_slack: &NetSinkTable<f64>,
        worst: f64,
        exponent: f64,
        crit: &mut NetSinkTable<f64>,
    ) {
        let inv_worst = if worst > 0.0 { 1.0 / worst } else { 0.0 };
        for (i, net) in netlist.nets.iter().enumerate() {
            if net.is_global {
                continue;
            }
            let id = NetId::new(i);
            for (c, s) in crit.sinks_mut(id).iter_mut().zip(net_slack.sinks(id)) {
                *c = (1.0 - s * inv_worst).clamp(0.0, 1.0).powf(exponent);
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionTimingAnalyzer;

impl TimingAnalyzer for ConnectionTimingAnalyzer {
    fn compute_slacks(
        &mut self,
        netlist: &Netlist,
        net_delay: &NetSinkTable<f64>,
        net_slack: &mut NetSinkTable<f64>,
    ) -> f64 {
        let routable = || {
            netlist
                .nets
                .iter()
                .enumerate()
                .filter(|(_, n)| !n.is_global)
                .map(|(i, _)| NetId::new(i))
        };

        let worst = routable()
            .flat_map(|id| net_delay.sinks(id).iter().copied())
            .fold(0.0_f64, f64::max);

        for id in routable() {
            for (s, d) in net_slack.sinks_mut(id).iter_mut().zip(net_delay.sinks(id)) {
                *s = worst - d;
            }
        }
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::indices::TypeId;

    fn two_net_netlist() -> Netlist {
        let mut netlist = Netlist::new();
        let a = netlist.add_block("a".into(), TypeId::new(0), 3, 1);
        let b = netlist.add_block("b".into(), TypeId::new(0), 3, 1);
        let n0 = netlist.add_net("n0".into(), false);
        netlist.add_pin(n0, a, 0);
        netlist.add_pin(n0, b, 1);
        netlist.add_pin(n0, b, 2);
        let n1 = netlist.add_net("n1".into(), false);
        netlist.add_pin(n1, b, 0);
        netlist.add_pin(n1, a, 1);
        netlist
    }

    #[test]
    fn slowest_connection_is_fully_critical() {
        let netlist = two_net_netlist();
        let mut delay = NetSinkTable::from_sink_counts([2, 1], 0.0);
        delay[(NetId::new(0), 1)] = 2.0;
        delay[(NetId::new(0), 2)] = 4.0;
        delay[(NetId::new(1), 1)] = 1.0;
        let mut slack = delay.clone();
        let mut crit = delay.clone();

        let mut analyzer = ConnectionTimingAnalyzer;
        let worst = analyzer.compute_slacks(&netlist, &delay, &mut slack);
        assert_eq!(worst, 4.0);
        assert_eq!(slack[(NetId::new(1), 1)], 3.0);

        analyzer.load_criticalities(&netlist, &slack, worst, 2.0, &mut crit);
        assert_eq!(crit[(NetId::new(0), 2)], 1.0);
        assert_eq!(crit[(NetId::new(0), 1)], 0.25);
        assert!((crit[(NetId::new(1), 1)] - 0.0625).abs() < 1e-12);
    }
}
