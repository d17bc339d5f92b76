use crate::error::{FabricError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            benchmark: BenchmarkConfig::default(),
            placement: PlacementConfig::default(),
            routing: RoutingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Rejects parameter combinations neither engine can run with.
    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;
        self.placement.validate()?;
        self.routing.validate()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Directionality {
    Bidirectional,
    Unidirectional,
}

/// Shape of the relative channel-width profile across the device.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelDistribution {
    Uniform {
        peak: f64,
    },
    Gaussian {
        peak: f64,
        width: f64,
        xpeak: f64,
        dc: f64,
    },
    Pulse {
        peak: f64,
        width: f64,
        xpeak: f64,
        dc: f64,
    },
    Delta {
        peak: f64,
        xpeak: f64,
        dc: f64,
    },
}

impl ChannelDistribution {
    /// Relative width at normalised position `x` in `[0, 1]`; `separation` is
    /// the normalised distance between neighbouring channels.
    pub fn width_at(&self, x: f64, separation: f64) -> f64 {
        match *self {
            ChannelDistribution::Uniform { peak } => peak,
            ChannelDistribution::Gaussian {
                peak,
                width,
                xpeak,
                dc,
            } => {
                let v = (x - xpeak) * (x - xpeak) / (2.0 * width * width);
                peak * (-v).exp() + dc
            }
            ChannelDistribution::Pulse {
                peak,
                width,
                xpeak,
                dc,
            } => {
                if (x - xpeak).abs() > width / 2.0 {
                    dc
                } else {
                    peak + dc
                }
            }
            ChannelDistribution::Delta { peak, xpeak, dc } => {
                let v = x - xpeak;
                if v > -separation / 2.0 && v <= separation / 2.0 {
                    peak
                } else {
                    dc
                }
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SwitchConfig {
    pub name: String,
    pub buffered: bool,
    pub r: f64,
    pub c_in: f64,
    pub c_out: f64,
    pub t_del: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentConfig {
    pub length: usize,
    pub frequency: f64,
    pub r_metal: f64,
    pub c_metal: f64,
    pub wire_switch: String,
    pub opin_switch: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HardBlockConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_hard_start")]
    pub start: usize,
    #[serde(default = "default_hard_repeat")]
    pub repeat: usize,
    #[serde(default = "default_hard_height")]
    pub height: usize,
    #[serde(default = "default_hard_inputs")]
    pub inputs: usize,
    #[serde(default = "default_hard_outputs")]
    pub outputs: usize,
}

impl Default for HardBlockConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            start: default_hard_start(),
            repeat: default_hard_repeat(),
            height: default_hard_height(),
            inputs: default_hard_inputs(),
            outputs: default_hard_outputs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_nx")]
    pub nx: usize,
    #[serde(default = "default_ny")]
    pub ny: usize,
    #[serde(default = "default_io_rat")]
    pub io_rat: usize,
    #[serde(default = "default_clb_inputs")]
    pub clb_inputs: usize,
    #[serde(default = "default_clb_outputs")]
    pub clb_outputs: usize,
    #[serde(default = "default_true")]
    pub clb_clocked: bool,
    #[serde(default)]
    pub hard_block: HardBlockConfig,
    #[serde(default = "default_channel_width")]
    pub channel_width: usize,
    #[serde(default = "default_directionality")]
    pub directionality: Directionality,
    #[serde(default = "default_fs")]
    pub fs: usize,
    #[serde(default = "default_fc")]
    pub fc_in: f64,
    #[serde(default = "default_fc")]
    pub fc_out: f64,
    #[serde(default = "default_fc_pad")]
    pub fc_pad: f64,
    #[serde(default = "default_switches")]
    pub switches: Vec<SwitchConfig>,
    #[serde(default = "default_segments")]
    pub segments: Vec<SegmentConfig>,
    #[serde(default = "default_ipin_switch")]
    pub ipin_switch: String,
    #[serde(default = "default_chan_dist")]
    pub chan_width_x: ChannelDistribution,
    #[serde(default = "default_chan_dist")]
    pub chan_width_y: ChannelDistribution,
    #[serde(default = "default_chan_width_io")]
    pub chan_width_io: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            nx: default_nx(),
            ny: default_ny(),
            io_rat: default_io_rat(),
            clb_inputs: default_clb_inputs(),
            clb_outputs: default_clb_outputs(),
            clb_clocked: default_true(),
            hard_block: HardBlockConfig::default(),
            channel_width: default_channel_width(),
            directionality: default_directionality(),
            fs: default_fs(),
            fc_in: default_fc(),
            fc_out: default_fc(),
            fc_pad: default_fc_pad(),
            switches: default_switches(),
            segments: default_segments(),
            ipin_switch: default_ipin_switch(),
            chan_width_x: default_chan_dist(),
            chan_width_y: default_chan_dist(),
            chan_width_io: default_chan_width_io(),
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.nx < 2 || self.ny < 2 {
            return Err(FabricError::InvalidConfig(format!(
                "device must be at least 2x2, got {}x{}",
                self.nx, self.ny
            )));
        }
        if self.io_rat == 0 {
            return Err(FabricError::InvalidConfig("io_rat must be >= 1".into()));
        }
        if self.clb_inputs == 0 || self.clb_outputs == 0 {
            return Err(FabricError::InvalidConfig(
                "logic blocks need at least one input and one output".into(),
            ));
        }
        if self.hard_block.enabled && (self.hard_block.height == 0 || self.hard_block.start == 0)
        {
            return Err(FabricError::InvalidConfig(
                "hard block columns need start >= 1 and height >= 1".into(),
            ));
        }
        if self.segments.is_empty() {
            return Err(FabricError::InvalidConfig("no segment types".into()));
        }
        for seg in &self.segments {
            if seg.length == 0 || seg.frequency <= 0.0 {
                return Err(FabricError::InvalidConfig(format!(
                    "segment length {} / frequency {} must be positive",
                    seg.length, seg.frequency
                )));
            }
            for name in [&seg.wire_switch, &seg.opin_switch] {
                if !self.switches.iter().any(|s| &s.name == name) {
                    return Err(FabricError::InvalidConfig(format!(
                        "segment references unknown switch '{}'",
                        name
                    )));
                }
            }
        }
        if !self.switches.iter().any(|s| s.name == self.ipin_switch) {
            return Err(FabricError::InvalidConfig(format!(
                "unknown ipin switch '{}'",
                self.ipin_switch
            )));
        }
        for fc in [self.fc_in, self.fc_out, self.fc_pad] {
            if !(fc > 0.0 && fc <= 1.0) {
                return Err(FabricError::InvalidConfig(format!(
                    "Fc value {} outside (0, 1]",
                    fc
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchmarkConfig {
    #[serde(default = "default_num_logic_blocks")]
    pub num_logic_blocks: usize,
    #[serde(default = "default_num_pads")]
    pub num_inputs: usize,
    #[serde(default = "default_num_pads")]
    pub num_outputs: usize,
    #[serde(default = "default_num_hard_blocks")]
    pub num_hard_blocks: usize,
    #[serde(default = "default_max_fanout")]
    pub max_fanout: usize,
    #[serde(default = "default_local_opin_fraction")]
    pub local_opin_fraction: f64,
    #[serde(default = "default_bench_seed")]
    pub seed: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            num_logic_blocks: default_num_logic_blocks(),
            num_inputs: default_num_pads(),
            num_outputs: default_num_pads(),
            num_hard_blocks: default_num_hard_blocks(),
            max_fanout: default_max_fanout(),
            local_opin_fraction: default_local_opin_fraction(),
            seed: default_bench_seed(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaceAlgorithm {
    BoundingBox,
    NetTimingDriven,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaceCostType {
    Linear,
    NonlinearCongestion,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Auto,
    User,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PadLocation {
    Free,
    Random,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlacementConfig {
    #[serde(default = "default_place_algorithm")]
    pub algorithm: PlaceAlgorithm,
    #[serde(default = "default_place_cost_type")]
    pub cost_type: PlaceCostType,
    #[serde(default = "default_num_regions")]
    pub num_regions: usize,
    #[serde(default = "default_place_cost_exp")]
    pub place_cost_exp: f64,
    #[serde(default = "default_place_chan_width")]
    pub place_chan_width: f64,
    #[serde(default = "default_inner_num")]
    pub inner_num: f64,
    #[serde(default = "default_schedule")]
    pub schedule: ScheduleKind,
    #[serde(default = "default_init_t")]
    pub init_t: f64,
    #[serde(default = "default_alpha_t")]
    pub alpha_t: f64,
    #[serde(default = "default_exit_t")]
    pub exit_t: f64,
    #[serde(default = "default_timing_tradeoff")]
    pub timing_tradeoff: f64,
    #[serde(default = "default_exp_first")]
    pub td_place_exp_first: f64,
    #[serde(default = "default_exp_last")]
    pub td_place_exp_last: f64,
    #[serde(default = "default_recompute_crit_iter")]
    pub recompute_crit_iter: usize,
    #[serde(default)]
    pub inner_loop_recompute_divider: usize,
    #[serde(default = "default_pad_loc")]
    pub pad_loc: PadLocation,
    #[serde(default)]
    pub rlim_escape_fraction: f64,
    #[serde(default = "default_place_seed")]
    pub seed: u64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            algorithm: default_place_algorithm(),
            cost_type: default_place_cost_type(),
            num_regions: default_num_regions(),
            place_cost_exp: default_place_cost_exp(),
            place_chan_width: default_place_chan_width(),
            inner_num: default_inner_num(),
            schedule: default_schedule(),
            init_t: default_init_t(),
            alpha_t: default_alpha_t(),
            exit_t: default_exit_t(),
            timing_tradeoff: default_timing_tradeoff(),
            td_place_exp_first: default_exp_first(),
            td_place_exp_last: default_exp_last(),
            recompute_crit_iter: default_recompute_crit_iter(),
            inner_loop_recompute_divider: 0,
            pad_loc: default_pad_loc(),
            rlim_escape_fraction: 0.0,
            seed: default_place_seed(),
        }
    }
}

impl PlacementConfig {
    pub fn is_timing_driven(&self) -> bool {
        self.algorithm == PlaceAlgorithm::NetTimingDriven
    }

    pub fn validate(&self) -> Result<()> {
        if self.inner_num <= 0.0 {
            return Err(FabricError::InvalidConfig("inner_num must be positive".into()));
        }
        if self.schedule == ScheduleKind::User
            && !(self.alpha_t > 0.0 && self.alpha_t < 1.0 && self.init_t > self.exit_t)
        {
            return Err(FabricError::InvalidConfig(format!(
                "user schedule needs 0 < alpha_t < 1 and init_t > exit_t (alpha {}, init {}, exit {})",
                self.alpha_t, self.init_t, self.exit_t
            )));
        }
        if !(0.0..=1.0).contains(&self.timing_tradeoff) {
            return Err(FabricError::InvalidConfig(format!(
                "timing_tradeoff {} outside [0, 1]",
                self.timing_tradeoff
            )));
        }
        if !(0.0..=1.0).contains(&self.rlim_escape_fraction) {
            return Err(FabricError::InvalidConfig(format!(
                "rlim_escape_fraction {} outside [0, 1]",
                self.rlim_escape_fraction
            )));
        }
        if self.place_chan_width <= 0.0 {
            return Err(FabricError::InvalidConfig(
                "place_chan_width must be positive".into(),
            ));
        }
        if self.cost_type == PlaceCostType::NonlinearCongestion && self.num_regions == 0 {
            return Err(FabricError::InvalidConfig("num_regions must be >= 1".into()));
        }
        if self.recompute_crit_iter == 0 {
            return Err(FabricError::InvalidConfig(
                "recompute_crit_iter must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouterAlgorithm {
    DirectedSearch,
    TimingDriven,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BaseCostType {
    DemandOnly,
    DelayNormalized,
    IntrinsicDelay,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    #[serde(default = "default_router_algorithm")]
    pub algorithm: RouterAlgorithm,
    #[serde(default = "default_max_router_iterations")]
    pub max_router_iterations: usize,
    #[serde(default)]
    pub first_iter_pres_fac: f64,
    #[serde(default = "default_initial_pres_fac")]
    pub initial_pres_fac: f64,
    #[serde(default = "default_pres_fac_mult")]
    pub pres_fac_mult: f64,
    #[serde(default = "default_acc_fac")]
    pub acc_fac: f64,
    #[serde(default = "default_bb_factor")]
    pub bb_factor: usize,
    #[serde(default = "default_astar_fac")]
    pub astar_fac: f64,
    #[serde(default)]
    pub bend_cost: f64,
    #[serde(default = "default_max_criticality")]
    pub max_criticality: f64,
    #[serde(default = "default_criticality_exp")]
    pub criticality_exp: f64,
    #[serde(default = "default_base_cost_type")]
    pub base_cost_type: BaseCostType,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            algorithm: default_router_algorithm(),
            max_router_iterations: default_max_router_iterations(),
            first_iter_pres_fac: 0.0,
            initial_pres_fac: default_initial_pres_fac(),
            pres_fac_mult: default_pres_fac_mult(),
            acc_fac: default_acc_fac(),
            bb_factor: default_bb_factor(),
            astar_fac: default_astar_fac(),
            bend_cost: 0.0,
            max_criticality: default_max_criticality(),
            criticality_exp: default_criticality_exp(),
            base_cost_type: default_base_cost_type(),
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_router_iterations == 0 {
            return Err(FabricError::InvalidConfig(
                "max_router_iterations must be >= 1".into(),
            ));
        }
        if self.pres_fac_mult < 1.0 || self.initial_pres_fac < 0.0 || self.first_iter_pres_fac < 0.0
        {
            return Err(FabricError::InvalidConfig(
                "present-cost factors must be non-negative and grow".into(),
            ));
        }
        if self.astar_fac < 0.0 || self.bend_cost < 0.0 || self.acc_fac < 0.0 {
            return Err(FabricError::InvalidConfig(
                "astar_fac, bend_cost and acc_fac must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_criticality) {
            return Err(FabricError::InvalidConfig(format!(
                "max_criticality {} outside [0, 1]",
                self.max_criticality
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_place_file")]
    pub place_file: String,
    #[serde(default = "default_route_file")]
    pub route_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            place_file: default_place_file(),
            route_file: default_route_file(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_nx() -> usize {
    12
}

fn default_ny() -> usize {
    12
}

fn default_io_rat() -> usize {
    2
}

fn default_clb_inputs() -> usize {
    4
}

fn default_clb_outputs() -> usize {
    2
}

fn default_hard_start() -> usize {
    4
}

fn default_hard_repeat() -> usize {
    6
}

fn default_hard_height() -> usize {
    2
}

fn default_hard_inputs() -> usize {
    8
}

fn default_hard_outputs() -> usize {
    2
}

fn default_channel_width() -> usize {
    12
}

fn default_directionality() -> Directionality {
    Directionality::Bidirectional
}

fn default_fs() -> usize {
    3
}

fn default_fc() -> f64 {
    0.5
}

fn default_fc_pad() -> f64 {
    1.0
}

fn default_switches() -> Vec<SwitchConfig> {
    vec![
        SwitchConfig {
            name: "buffer".to_string(),
            buffered: true,
            r: 786.9,
            c_in: 5.0e-15,
            c_out: 10.0e-15,
            t_del: 6.8e-11,
        },
        SwitchConfig {
            name: "pass".to_string(),
            buffered: false,
            r: 550.0,
            c_in: 7.0e-15,
            c_out: 7.0e-15,
            t_del: 5.0e-11,
        },
        SwitchConfig {
            name: "cblock".to_string(),
            buffered: true,
            r: 0.0,
            c_in: 1.5e-15,
            c_out: 0.0,
            t_del: 7.2e-11,
        },
    ]
}

fn default_segments() -> Vec<SegmentConfig> {
    vec![
        SegmentConfig {
            length: 1,
            frequency: 0.5,
            r_metal: 4.16,
            c_metal: 81.0e-15,
            wire_switch: "buffer".to_string(),
            opin_switch: "buffer".to_string(),
        },
        SegmentConfig {
            length: 4,
            frequency: 0.5,
            r_metal: 4.16,
            c_metal: 81.0e-15,
            wire_switch: "buffer".to_string(),
            opin_switch: "buffer".to_string(),
        },
    ]
}

fn default_ipin_switch() -> String {
    "cblock".to_string()
}

fn default_chan_dist() -> ChannelDistribution {
    ChannelDistribution::Uniform { peak: 1.0 }
}

fn default_chan_width_io() -> f64 {
    1.0
}

fn default_num_logic_blocks() -> usize {
    60
}

fn default_num_pads() -> usize {
    8
}

fn default_num_hard_blocks() -> usize {
    2
}

fn default_max_fanout() -> usize {
    5
}

fn default_local_opin_fraction() -> f64 {
    0.1
}

fn default_bench_seed() -> u64 {
    7
}

fn default_place_algorithm() -> PlaceAlgorithm {
    PlaceAlgorithm::NetTimingDriven
}

fn default_place_cost_type() -> PlaceCostType {
    PlaceCostType::Linear
}

fn default_num_regions() -> usize {
    4
}

fn default_place_cost_exp() -> f64 {
    1.0
}

fn default_place_chan_width() -> f64 {
    100.0
}

fn default_inner_num() -> f64 {
    10.0
}

fn default_schedule() -> ScheduleKind {
    ScheduleKind::Auto
}

fn default_init_t() -> f64 {
    100.0
}

fn default_alpha_t() -> f64 {
    0.8
}

fn default_exit_t() -> f64 {
    0.01
}

fn default_timing_tradeoff() -> f64 {
    0.5
}

fn default_exp_first() -> f64 {
    1.0
}

fn default_exp_last() -> f64 {
    8.0
}

fn default_recompute_crit_iter() -> usize {
    1
}

fn default_pad_loc() -> PadLocation {
    PadLocation::Free
}

fn default_place_seed() -> u64 {
    1
}

fn default_router_algorithm() -> RouterAlgorithm {
    RouterAlgorithm::TimingDriven
}

fn default_max_router_iterations() -> usize {
    50
}

fn default_initial_pres_fac() -> f64 {
    0.5
}

fn default_pres_fac_mult() -> f64 {
    1.3
}

fn default_acc_fac() -> f64 {
    1.0
}

fn default_bb_factor() -> usize {
    3
}

fn default_astar_fac() -> f64 {
    1.2
}

fn default_max_criticality() -> f64 {
    0.99
}

fn default_criticality_exp() -> f64 {
    1.0
}

fn default_base_cost_type() -> BaseCostType {
    BaseCostType::DelayNormalized
}

fn default_place_file() -> String {
    "output/design.place".to_string()
}

fn default_route_file() -> String {
    "output/design.route".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.device.nx, 12);
        assert_eq!(config.routing.algorithm, RouterAlgorithm::TimingDriven);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sections_override_individual_fields() {
        let config: Config = toml::from_str(
            r#"
            [placement]
            algorithm = "bounding_box"
            inner_num = 2.5

            [device]
            directionality = "unidirectional"
            chan_width_x = { kind = "gaussian", peak = 1.0, width = 0.5, xpeak = 0.5, dc = 0.2 }
            "#,
        )
        .unwrap();
        assert_eq!(config.placement.algorithm, PlaceAlgorithm::BoundingBox);
        assert_eq!(config.placement.inner_num, 2.5);
        assert_eq!(config.placement.schedule, ScheduleKind::Auto);
        assert_eq!(config.device.directionality, Directionality::Unidirectional);
        assert!(matches!(
            config.device.chan_width_x,
            ChannelDistribution::Gaussian { .. }
        ));
    }

    #[test]
    fn bad_tradeoff_is_rejected() {
        let mut config = Config::default();
        config.placement.timing_tradeoff = 1.5;
        assert!(matches!(
            config.validate(),
            Err(FabricError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_switch_is_rejected() {
        let mut config = Config::default();
        config.device.segments[0].wire_switch = "missing".into();
        assert!(config.device.validate().is_err());
    }

    #[test]
    fn distributions_shape_widths() {
        let pulse = ChannelDistribution::Pulse {
            peak: 1.0,
            width: 0.2,
            xpeak: 0.5,
            dc: 0.5,
        };
        assert_eq!(pulse.width_at(0.5, 0.1), 1.5);
        assert_eq!(pulse.width_at(0.0, 0.1), 0.5);
        let delta = ChannelDistribution::Delta {
            peak: 2.0,
            xpeak: 0.5,
            dc: 1.0,
        };
        assert_eq!(delta.width_at(0.5, 0.1), 2.0);
        assert_eq!(delta.width_at(0.8, 0.1), 1.0);
    }
}
