//! Negotiated-congestion routing over a routing-resource graph built from
//! the placed design.

pub mod algo;
pub mod check;
pub mod congestion;
pub mod pathfinder;
pub mod record;
pub mod route_tree;
pub mod rr_graph;
pub mod traceback;

use check::check_routing;
use fabric_common::db::core::Design;
use fabric_common::db::sinks::NetSinkTable;
use fabric_common::error::Result;
use fabric_common::timing::{ConnectionTimingAnalyzer, TimingAnalyzer};
use fabric_common::util::check::{check_netlist, check_placement};
use fabric_common::util::config::{Directionality, RoutingConfig};
use fabric_common::util::profiler::ScopedTimer;
use pathfinder::{PathFinder, RoutingOutcome};
use rr_graph::{BuiltGraph, build_rr_graph};
use traceback::Traceback;

/// Widest channel the minimum-width search will try.
pub const MAX_CHANNEL_WIDTH: usize = 1000;

pub struct RoutingResult {
    pub outcome: RoutingOutcome,
    pub built: BuiltGraph,
    pub traces: Vec<Traceback>,
    pub channel_width: usize,
    pub net_delay: NetSinkTable<f64>,
}

impl RoutingResult {
    pub fn success(&self) -> bool {
        self.outcome.success
    }
}

pub fn run_routing(design: &Design, width: usize, config: &RoutingConfig) -> Result<RoutingResult> {
    let mut analyzer = ConnectionTimingAnalyzer;
    run_routing_with(design, width, config, &mut analyzer)
}

/// Routes the placed `design` with `width` tracks per channel. A routing
/// that does not converge is not an error; check `outcome.success`.
pub fn run_routing_with(
    design: &Design,
    width: usize,
    config: &RoutingConfig,
    analyzer: &mut dyn TimingAnalyzer,
) -> Result<RoutingResult> {
    config.validate()?;
    check_netlist(design)?;
    check_placement(design)?;

    let built = build_rr_graph(design, width, config.base_cost_type)?;
    let terminals = built.net_terminals(design, config.bb_factor)?;
    let local_demand = built.local_opin_demand(design);

    log::info!(
        "Routing {} nets at channel width {} ({:?}, {:?})",
        design.routable_nets().count(),
        width,
        config.algorithm,
        config.base_cost_type
    );

    let mut router = PathFinder::new(&built.graph, &design.netlist, terminals, local_demand, config);
    let outcome = router.run(analyzer);
    if outcome.success {
        check_routing(
            &built.graph,
            router.terminals(),
            &router.traces,
            router.reserved_opins(),
            &router.congestion,
        )?;
    }

    let traces = std::mem::take(&mut router.traces);
    let net_delay = router.net_delay.clone();
    drop(router);
    Ok(RoutingResult {
        outcome,
        built,
        traces,
        channel_width: width,
        net_delay,
    })
}

/// Smallest channel width at which `design` routes: the width doubles from
/// `start` until a routing succeeds, then a binary search closes the gap.
/// Unidirectional fabrics only take even widths. `None` when nothing up to
/// [`MAX_CHANNEL_WIDTH`] routes.
pub fn find_min_channel_width(
    design: &Design,
    config: &RoutingConfig,
    start: usize,
) -> Result<Option<RoutingResult>> {
    let _timer = ScopedTimer::new("Channel width search");
    let step = match design.arch.directionality {
        Directionality::Unidirectional => 2,
        Directionality::Bidirectional => 1,
    };
    let align = |w: usize| w.max(step).div_ceil(step) * step;

    let mut width = align(start);
    let mut low = 0;
    let mut best: Option<RoutingResult> = None;

    while best.is_none() {
        if width > MAX_CHANNEL_WIDTH {
            log::warn!("No routing found up to channel width {}", MAX_CHANNEL_WIDTH);
            return Ok(None);
        }
        let result = run_routing(design, width, config)?;
        if result.success() {
            best = Some(result);
        } else {
            log::info!("Channel width {} is unroutable", width);
            low = width;
            width = align(width * 2);
        }
    }

    let Some(mut best) = best else {
        return Ok(None);
    };
    while best.channel_width - low > step {
        let mid = align((low + best.channel_width) / 2);
        if mid >= best.channel_width || mid <= low {
            break;
        }
        let result = run_routing(design, mid, config)?;
        if result.success() {
            best = result;
        } else {
            low = mid;
        }
    }

    log::info!("Minimum channel width: {}", best.channel_width);
    Ok(Some(best))
}
