//! Negotiated-congestion routing: every net is ripped up and re-routed each
//! iteration while the price of shared resources climbs until no node is
//! used beyond its capacity.

use crate::algo::mst::spanning_order;
use crate::algo::{DirectedSearch, MazeRouter, RoutingStrategy, SearchContext, Seed, TimingDriven};
use crate::congestion::CongestionMap;
use crate::route_tree::RouteTree;
use crate::rr_graph::indexed_data::scale_for_fanout;
use crate::rr_graph::{CostIndexData, NetTerminals, RRGraph};
use crate::traceback::Traceback;
use fabric_common::db::indices::{NetId, RRNodeId};
use fabric_common::db::netlist::Netlist;
use fabric_common::db::sinks::NetSinkTable;
use fabric_common::timing::TimingAnalyzer;
use fabric_common::util::config::{RouterAlgorithm, RoutingConfig};
use fabric_common::util::profiler::ScopedTimer;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingFailure {
    /// The net has a sink no path reaches, whatever the congestion.
    Unroutable(NetId),
    /// The iteration limit ran out with `overused` nodes still over capacity.
    Congested { overused: usize },
}

#[derive(Clone, Debug, Default)]
pub struct RoutingOutcome {
    pub success: bool,
    pub iterations: usize,
    pub failure: Option<RoutingFailure>,
    pub critical_path: f64,
    /// Tiles of wire used, summed over nets.
    pub wirelength: usize,
}

/// Order in which a net's sinks are connected.
#[derive(Clone, Debug)]
pub enum TargetOrder {
    /// Precomputed spanning-tree order per net.
    Spanning(Vec<Vec<usize>>),
    /// Most critical sink first, re-sorted every time the net is routed.
    Criticality,
}

pub struct PathFinder<'a> {
    graph: &'a RRGraph,
    netlist: &'a Netlist,
    config: &'a RoutingConfig,
    terminals: Vec<Option<NetTerminals>>,
    pub congestion: CongestionMap,
    pub traces: Vec<Traceback>,
    costs: Vec<CostIndexData>,
    maze: MazeRouter,
    order: TargetOrder,
    local_demand: Vec<(RRNodeId, usize)>,
    local_reserved: Vec<Vec<RRNodeId>>,
    pub net_delay: NetSinkTable<f64>,
    net_slack: NetSinkTable<f64>,
    t_crit: f64,
}

impl<'a> PathFinder<'a> {
    /// `terminals` is indexed by net; `local_demand` lists `(SOURCE, count)`
    /// for block outputs consumed inside their block.
    pub fn new(
        graph: &'a RRGraph,
        netlist: &'a Netlist,
        terminals: Vec<Option<NetTerminals>>,
        local_demand: Vec<(RRNodeId, usize)>,
        config: &'a RoutingConfig,
    ) -> Self {
        let order = match config.algorithm {
            RouterAlgorithm::DirectedSearch => TargetOrder::Spanning(
                terminals
                    .iter()
                    .map(|t| t.as_ref().map(|t| spanning_order(graph, t)).unwrap_or_default())
                    .collect(),
            ),
            RouterAlgorithm::TimingDriven => TargetOrder::Criticality,
        };
        let sink_counts = || netlist.nets.iter().map(|n| n.num_sinks());
        Self {
            graph,
            netlist,
            config,
            congestion: CongestionMap::new(graph),
            traces: vec![Traceback::default(); netlist.num_nets()],
            costs: graph.cost_index.clone(),
            maze: MazeRouter::new(graph.num_nodes()),
            order,
            local_reserved: vec![Vec::new(); local_demand.len()],
            local_demand,
            net_delay: NetSinkTable::from_sink_counts(sink_counts(), 0.0),
            net_slack: NetSinkTable::from_sink_counts(sink_counts(), 0.0),
            terminals,
            t_crit: 1.0,
        }
    }

    pub fn terminals(&self) -> &[Option<NetTerminals>] {
        &self.terminals
    }

    pub fn reserved_opins(&self) -> impl Iterator<Item = RRNodeId> + '_ {
        self.local_reserved.iter().flatten().copied()
    }

    fn is_timing_driven(&self) -> bool {
        self.config.algorithm == RouterAlgorithm::TimingDriven
    }

    /// Runs negotiation iterations until the routing is feasible, a net
    /// proves unroutable, or the iteration limit is reached.
    pub fn run(&mut self, analyzer: &mut dyn TimingAnalyzer) -> RoutingOutcome {
        let _timer = ScopedTimer::new("Routing");
        let mut outcome = RoutingOutcome::default();

        // The first iteration treats every connection as critical.
        self.net_slack.fill(0.0);
        self.t_crit = 1.0;
        let mut pres_fac = self.config.first_iter_pres_fac;

        log::info!("{:>5} {:>10} {:>12} {:>11}", "Iter", "Overused", "Wirelength", "Pres Fac");
        for itry in 1..=self.config.max_router_iterations {
            outcome.iterations = itry;
            if let Err(net) = self.route_iteration(pres_fac) {
                log::error!(
                    "Net {} ({}) cannot reach all of its sinks; routing failed",
                    net,
                    self.netlist.net(net).name
                );
                outcome.failure = Some(RoutingFailure::Unroutable(net));
                return outcome;
            }
            self.reserve_local_opins(pres_fac, itry > 1);

            let overused = self.congestion.overused().len();
            outcome.wirelength = self.wirelength();
            log::info!(
                "{:>5} {:>10} {:>12} {:>11.4}",
                itry,
                overused,
                outcome.wirelength,
                pres_fac
            );

            if overused == 0 {
                let mut slack = self.net_slack.clone();
                outcome.critical_path = analyzer.compute_slacks(self.netlist, &self.net_delay, &mut slack);
                outcome.success = true;
                log::info!(
                    "Successfully routed after {} iterations, critical path {:.4e} s",
                    itry,
                    outcome.critical_path
                );
                return outcome;
            }

            if itry == 1 {
                pres_fac = self.config.initial_pres_fac;
                self.congestion.update_costs(pres_fac, 0.0);
            } else {
                pres_fac *= self.config.pres_fac_mult;
                self.congestion.update_costs(pres_fac, self.config.acc_fac);
            }

            if self.is_timing_driven() {
                self.t_crit = analyzer.compute_slacks(self.netlist, &self.net_delay, &mut self.net_slack);
                log::debug!("T_crit: {:.4e}", self.t_crit);
            }
        }

        let overused = self.congestion.overused().len();
        log::warn!(
            "Routing failed after {} iterations: {} nodes still overused",
            self.config.max_router_iterations,
            overused
        );
        outcome.failure = Some(RoutingFailure::Congested { overused });
        outcome
    }

    /// Rips up and re-routes every routable net once, in net order.
    /// Returns the first net with an unreachable sink.
    pub fn route_iteration(&mut self, pres_fac: f64) -> Result<(), NetId> {
        for i in 0..self.netlist.num_nets() {
            let net = NetId::new(i);
            if self.terminals[i].is_none() {
                continue;
            }
            if !self.route_net(net, pres_fac) {
                return Err(net);
            }
        }
        Ok(())
    }

    fn rip_up(&mut self, net: NetId, pres_fac: f64) {
        let trace = &mut self.traces[net.index()];
        for node in trace.used_nodes(0) {
            self.congestion.adjust(node, -1, pres_fac);
        }
        trace.clear();
    }

    /// Connection criticalities of `net` from the last slack analysis,
    /// capped at `max_criticality`.
    fn criticalities(&self, net: NetId) -> Vec<f64> {
        let max_crit = self.config.max_criticality;
        self.net_slack
            .sinks(net)
            .iter()
            .map(|&slack| {
                let ratio = if self.t_crit > 0.0 { slack / self.t_crit } else { 0.0 };
                (max_crit - ratio)
                    .max(0.0)
                    .powf(self.config.criticality_exp)
                    .min(max_crit)
            })
            .collect()
    }

    /// Re-routes one net from scratch; false if some sink is unreachable.
    pub fn route_net(&mut self, net: NetId, pres_fac: f64) -> bool {
        self.rip_up(net, pres_fac);
        let Some(terminals) = self.terminals[net.index()].as_ref() else {
            return true;
        };
        let timing = self.is_timing_driven();

        let crit = if timing {
            scale_for_fanout(&mut self.costs, terminals.sinks.len());
            self.criticalities(net)
        } else {
            vec![0.0; terminals.sinks.len()]
        };
        let order: Vec<usize> = match &self.order {
            TargetOrder::Spanning(orders) => orders[net.index()].clone(),
            TargetOrder::Criticality => {
                let mut pins: Vec<usize> = (1..=terminals.sinks.len()).collect();
                pins.sort_by(|&a, &b| crit[b - 1].total_cmp(&crit[a - 1]));
                pins
            }
        };

        let graph = self.graph;
        let mut tree = RouteTree::new(graph, terminals.source);
        for pin in order {
            let target = terminals.sinks[pin - 1];
            let driven = TimingDriven {
                criticality: crit[pin - 1],
            };
            let strategy: &dyn RoutingStrategy = if timing { &driven } else { &DirectedSearch };
            let seeds = tree.seeds().map(|n| Seed {
                node: n.node,
                backward_cost: strategy.seed_cost(n.t_del),
                r_upstream: n.r_upstream,
            });
            let ctx = SearchContext {
                graph,
                congestion: &self.congestion,
                costs: &self.costs,
                bend_cost: self.config.bend_cost,
            };
            let Some(path) = self.maze.route_to_sink(
                &ctx,
                strategy,
                seeds,
                target,
                &terminals.bb,
                self.config.astar_fac,
            ) else {
                log::warn!("No path from net {} source to pin {} within {}", net, pin, terminals.bb);
                return false;
            };

            let Some(branch) = tree.new_branch(&path) else {
                log::error!("Path for net {} pin {} does not start on its route tree", net, pin);
                return false;
            };
            let Some(sink) = tree.add_branch(graph, branch) else {
                return false;
            };
            let trace = &mut self.traces[net.index()];
            let first_new = trace.append_branch(branch);
            for node in trace.used_nodes(first_new) {
                self.congestion.adjust(node, 1, pres_fac);
            }
            self.net_delay[(net, pin)] = tree.node(sink).t_del;
        }
        true
    }

    /// Holds OPINs for outputs consumed inside their own block: the
    /// cheapest `count` OPINs of each such class are marked used, after
    /// releasing last iteration's choice when `rip_up` is set.
    pub fn reserve_local_opins(&mut self, pres_fac: f64, rip_up: bool) {
        if rip_up {
            for reserved in &mut self.local_reserved {
                for node in reserved.drain(..) {
                    self.congestion.adjust(node, -1, pres_fac);
                }
            }
        }
        for (i, &(source, count)) in self.local_demand.iter().enumerate() {
            if !self.local_reserved[i].is_empty() {
                continue;
            }
            let ctx = SearchContext {
                graph: self.graph,
                congestion: &self.congestion,
                costs: &self.costs,
                bend_cost: 0.0,
            };
            let mut candidates: Vec<(f64, RRNodeId)> = self
                .graph
                .edges(source)
                .iter()
                .map(|e| (ctx.cong_cost(e.to), e.to))
                .collect();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
            let chosen: Vec<RRNodeId> = candidates.into_iter().take(count).map(|(_, n)| n).collect();
            for &node in &chosen {
                self.congestion.adjust(node, 1, pres_fac);
            }
            self.local_reserved[i] = chosen;
        }
    }

    pub fn wirelength(&self) -> usize {
        self.traces
            .iter()
            .flat_map(|t| t.used_nodes(0))
            .map(|n| self.graph.node(n))
            .filter(|n| n.kind.is_channel())
            .map(|n| n.length())
            .sum()
    }
}
