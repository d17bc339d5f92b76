use clap::{Parser, Subcommand};
use fabric_common::db::core::Design;
use fabric_common::db::record::{read_placement_file, write_placement_file};
use fabric_common::util::config::Config;
use fabric_common::util::{generator, logger};
use fabric_router::pathfinder::RoutingFailure;
use fabric_router::record::write_routing_file;
use fabric_router::{RoutingResult, find_min_channel_width, run_routing};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Overrides the placement seed.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Overrides the routing channel width.
    #[arg(long, global = true)]
    channel_width: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Places the benchmark and writes the placement record.
    Place,
    /// Reads the placement record back and routes it.
    Route,
    /// Places, then routes.
    Flow {
        /// Search for the smallest routable channel width.
        #[arg(long)]
        min_width: bool,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let mut config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };
    if let Some(seed) = args.seed {
        config.placement.seed = seed;
    }
    if let Some(width) = args.channel_width {
        config.device.channel_width = width;
    }
    config.validate()?;

    let mut design = generator::generate_design(&config.device, &config.benchmark)?;
    log::info!(
        "Benchmark '{}': {} blocks, {} nets on a {}x{} grid",
        design.name,
        design.netlist.num_blocks(),
        design.netlist.num_nets(),
        design.grid.nx,
        design.grid.ny
    );

    match args.command.unwrap_or(Commands::Flow { min_width: false }) {
        Commands::Place => {
            run_placement(&mut design, &config)?;
        }
        Commands::Route => {
            let place_file = Path::new(&config.output.place_file);
            if !place_file.exists() {
                return Err(anyhow::anyhow!(
                    "Placement record missing: '{}'. Did you run 'place'?",
                    config.output.place_file
                ));
            }
            log::info!("Reading placement from {}", config.output.place_file);
            read_placement_file(place_file, &mut design)?;
            route_at(&design, &config)?;
        }
        Commands::Flow { min_width } => {
            run_placement(&mut design, &config)?;
            if min_width {
                let Some(result) = find_min_channel_width(
                    &design,
                    &config.routing,
                    config.device.channel_width,
                )?
                else {
                    return Err(anyhow::anyhow!("No routable channel width found"));
                };
                save_routing(&design, &config, &result)?;
            } else {
                route_at(&design, &config)?;
            }
        }
    }

    Ok(())
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent() {
        if !parent.exists() && !parent.as_os_str().is_empty() {
            log::info!("Creating output directory: {:?}", parent);
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn run_placement(design: &mut Design, config: &Config) -> anyhow::Result<()> {
    fabric_placer::run_placement(design, &config.placement)?;

    prepare_output_dir(&config.output.place_file)?;
    log::info!("Writing placement to {}", config.output.place_file);
    write_placement_file(Path::new(&config.output.place_file), design, "fabric")?;
    Ok(())
}

fn route_at(design: &Design, config: &Config) -> anyhow::Result<()> {
    let result = run_routing(design, config.device.channel_width, &config.routing)?;
    match &result.outcome.failure {
        None => save_routing(design, config, &result),
        Some(RoutingFailure::Unroutable(net)) => Err(anyhow::anyhow!(
            "Net '{}' is unroutable at channel width {}",
            design.netlist.net(*net).name,
            result.channel_width
        )),
        Some(RoutingFailure::Congested { overused }) => Err(anyhow::anyhow!(
            "Routing did not converge at channel width {}: {} nodes overused after {} iterations",
            result.channel_width,
            overused,
            result.outcome.iterations
        )),
    }
}

fn save_routing(design: &Design, config: &Config, result: &RoutingResult) -> anyhow::Result<()> {
    log::info!(
        "Routed at channel width {}: wirelength {}, critical path {:.4e} s",
        result.channel_width,
        result.outcome.wirelength,
        result.outcome.critical_path
    );
    prepare_output_dir(&config.output.route_file)?;
    log::info!("Writing routing to {}", config.output.route_file);
    write_routing_file(
        Path::new(&config.output.route_file),
        design,
        &result.built.graph,
        &result.traces,
    )?;
    Ok(())
}
