//! Taxi fleet simulator
//!
//! Boots the in-process platform, grows the fleet from HTTP commands while the
//! simulation runs, and prints the results when it ends.

use clap::{ArgAction, Parser};
use fleet_agents::LocalPlatform;
use fleet_control::{
    default_config_toml, driver, logging, CoordinatorStrategyKind, ExportFormat, OutputConfig,
    PassengerStrategyKind, RunOutcome, SimulationConfig, SimulationController, TaxiStrategyKind,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Command line arguments for the simulator
#[derive(Parser, Debug)]
#[command(name = "taxi_sim")]
#[command(about = "Agent-based taxi fleet simulator")]
struct Args {
    /// TOML configuration file; flags below override its values
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Name of the simulation
    #[arg(long)]
    name: Option<String>,

    /// Simulated seconds before the simulation is stopped
    #[arg(long)]
    max_time: Option<f64>,

    /// Number of taxis created at startup
    #[arg(long)]
    taxis: Option<u32>,

    /// Number of passengers created at startup
    #[arg(long)]
    passengers: Option<u32>,

    /// JSON scenario with pre-built agents
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Host address of the messaging backend
    #[arg(long)]
    host: Option<String>,

    /// Port of the coordinator's web surface
    #[arg(long)]
    http_port: Option<u16>,

    /// Port of the command listener
    #[arg(long)]
    backend_port: Option<u16>,

    /// Coordinator strategy (delegate_request, closest_taxi)
    #[arg(long)]
    coordinator_strategy: Option<CoordinatorStrategyKind>,

    /// Taxi strategy (accept_always)
    #[arg(long)]
    taxi_strategy: Option<TaxiStrategyKind>,

    /// Passenger strategy (accept_first, accept_fastest)
    #[arg(long)]
    passenger_strategy: Option<PassengerStrategyKind>,

    /// Write the results to this file when the simulation stops
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Results file format (json, excel); guessed from the extension when omitted
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Random seed for agent placement
    #[arg(long)]
    seed: Option<u64>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn apply(self, config: &mut SimulationConfig) {
        if let Some(name) = self.name {
            config.simulation_name = Some(name);
        }
        if let Some(max_time) = self.max_time {
            config.max_time = Some(max_time);
        }
        if let Some(taxis) = self.taxis {
            config.num_taxis = taxis;
        }
        if let Some(passengers) = self.passengers {
            config.num_passengers = passengers;
        }
        if let Some(scenario) = self.scenario {
            config.scenario = Some(scenario);
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(port) = self.backend_port {
            config.backend_port = port;
        }
        if let Some(kind) = self.coordinator_strategy {
            config.coordinator_strategy = kind;
        }
        if let Some(kind) = self.taxi_strategy {
            config.taxi_strategy = kind;
        }
        if let Some(kind) = self.passenger_strategy {
            config.passenger_strategy = kind;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(path) = self.output {
            let format = self.format.unwrap_or_else(|| ExportFormat::from_path(&path));
            config.output = Some(OutputConfig { path, format });
        } else if let (Some(format), Some(output)) = (self.format, config.output.as_mut()) {
            output.format = format;
        }
        config.verbose = config.verbose.max(self.verbose);
    }
}

/// Raises `flag` on Ctrl-C. The watcher thread lives until the process exits.
fn watch_interrupt(flag: Arc<AtomicBool>) {
    let spawned = std::thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!("Ctrl-C handling unavailable: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    flag.store(true, Ordering::SeqCst);
                }
            });
        });
    if let Err(e) = spawned {
        tracing::warn!("Ctrl-C handling unavailable: {}", e);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.print_config {
        print!("{}", default_config_toml());
        return ExitCode::SUCCESS;
    }

    let mut config = match &args.config {
        Some(path) => match SimulationConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => SimulationConfig::default(),
    };
    args.apply(&mut config);

    logging::init(config.verbose);

    let interrupt = Arc::new(AtomicBool::new(false));
    watch_interrupt(Arc::clone(&interrupt));

    let poll_interval = config.poll_interval();
    let platform = LocalPlatform::new(config.seed);
    let mut controller = match SimulationController::new(config, platform) {
        Ok(controller) => controller,
        Err(e) => {
            tracing::error!("Simulation could not start: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(addr) = controller.listener_addr() {
        tracing::info!("Send commands to http://{}/generate/taxis/N/passengers/M", addr);
    }

    let outcome = controller
        .run()
        .and_then(|()| driver::run_until_finished(&mut controller, poll_interval, &interrupt));
    match &outcome {
        Ok(RunOutcome::Finished) => tracing::info!("Simulation finished"),
        Ok(RunOutcome::Interrupted) => {}
        Err(e) => tracing::error!("{}", e),
    }

    let failures = controller.stop();
    if outcome.is_err() || !failures.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
