use fabric_common::db::core::Design;
use fabric_common::error::FabricError;
use fabric_common::util::config::{
    BaseCostType, BenchmarkConfig, DeviceConfig, Directionality, PlaceAlgorithm, PlacementConfig,
    RouterAlgorithm, RoutingConfig,
};
use fabric_common::util::generator::generate_design;
use fabric_placer::run_placement;
use fabric_router::record::write_routing;
use fabric_router::rr_graph::{RRNodeType, build_rr_graph};
use fabric_router::{find_min_channel_width, run_routing};

fn placed_design(directionality: Directionality) -> Design {
    let mut device = DeviceConfig::default();
    device.nx = 6;
    device.ny = 6;
    device.directionality = directionality;
    let bench = BenchmarkConfig {
        num_logic_blocks: 20,
        num_inputs: 4,
        num_outputs: 4,
        num_hard_blocks: 1,
        ..BenchmarkConfig::default()
    };
    let mut design = generate_design(&device, &bench).unwrap();
    let placement = PlacementConfig {
        algorithm: PlaceAlgorithm::BoundingBox,
        inner_num: 1.0,
        ..PlacementConfig::default()
    };
    run_placement(&mut design, &placement).unwrap();
    design
}

#[test]
fn wide_channels_route_with_both_variants() {
    let design = placed_design(Directionality::Bidirectional);
    for algorithm in [RouterAlgorithm::DirectedSearch, RouterAlgorithm::TimingDriven] {
        let config = RoutingConfig {
            algorithm,
            ..RoutingConfig::default()
        };
        let result = run_routing(&design, 24, &config).unwrap();
        assert!(result.success(), "{:?} failed at W = 24", algorithm);
        assert!(result.outcome.wirelength > 0);
        assert!(result.outcome.critical_path > 0.0);
        for net in design.routable_nets() {
            assert!(!result.traces[net.index()].is_empty());
        }
    }
}

#[test]
fn unidirectional_fabric_routes() {
    let design = placed_design(Directionality::Unidirectional);
    let config = RoutingConfig {
        base_cost_type: BaseCostType::IntrinsicDelay,
        ..RoutingConfig::default()
    };
    let result = run_routing(&design, 24, &config).unwrap();
    assert!(result.success());
    assert!(result.built.chan_width_x.iter().all(|w| w % 2 == 0));
}

#[test]
fn fabric_parameters_are_validated() {
    let mut design = placed_design(Directionality::Bidirectional);
    let err = build_rr_graph(&design, 0, BaseCostType::DemandOnly).unwrap_err();
    assert!(matches!(err, FabricError::InvalidConfig(_)));

    design.arch.fs = 4;
    let err = build_rr_graph(&design, 12, BaseCostType::DemandOnly).unwrap_err();
    assert!(matches!(err, FabricError::InvalidConfig(_)));
    assert!(!err.is_internal());

    design.arch.fs = 3;
    design.arch.directionality = Directionality::Unidirectional;
    let err = build_rr_graph(&design, 11, BaseCostType::DemandOnly).unwrap_err();
    assert!(matches!(err, FabricError::InvalidConfig(_)));
    assert!(build_rr_graph(&design, 12, BaseCostType::DemandOnly).is_ok());
}

#[test]
fn built_graph_has_terminals_for_every_net() {
    let design = placed_design(Directionality::Bidirectional);
    let built = build_rr_graph(&design, 8, BaseCostType::DelayNormalized).unwrap();
    let terminals = built.net_terminals(&design, 3).unwrap();
    for net in design.routable_nets() {
        let term = terminals[net.index()].as_ref().unwrap();
        assert_eq!(built.graph.node(term.source).kind, RRNodeType::Source);
        assert_eq!(term.sinks.len(), design.netlist.net(net).num_sinks());
        for &sink in &term.sinks {
            assert_eq!(built.graph.node(sink).kind, RRNodeType::Sink);
        }
    }
    let wires = built
        .graph
        .nodes
        .iter()
        .filter(|n| n.kind.is_channel())
        .count();
    assert!(wires > 0);
}

#[test]
fn minimum_width_is_tight() {
    let design = placed_design(Directionality::Bidirectional);
    let config = RoutingConfig {
        algorithm: RouterAlgorithm::DirectedSearch,
        max_router_iterations: 30,
        ..RoutingConfig::default()
    };
    let best = find_min_channel_width(&design, &config, 4).unwrap().unwrap();
    assert!(best.success());
    if best.channel_width > 1 {
        let narrower = run_routing(&design, best.channel_width - 1, &config).unwrap();
        assert!(!narrower.success());
    }
}

#[test]
fn routing_record_lists_every_net() {
    let design = placed_design(Directionality::Bidirectional);
    let result = run_routing(&design, 24, &RoutingConfig::default()).unwrap();
    let mut out = Vec::new();
    write_routing(&mut out, &design, &result.built.graph, &result.traces).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("Array size: 6 x 6 logic blocks."));
    for net in &design.netlist.nets {
        assert!(text.contains(&format!("({})", net.name)));
    }
    assert!(text.contains("SOURCE"));
    assert!(text.contains("Track:"));
}
