//! Spot Dance command-line client
//!
//! Uploads animations, lists routines and moves, estimates routine length,
//! and executes routines against the simulated robot described by the
//! configuration file.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use spot_dance::{
    json_output::output_event, logging, ChaConverter, ConsoleTelemetry, DaemonConfig, DanceController,
    DanceResponse, DanceTelemetry, ListResponse, NoOpTelemetry, RoutineDefinition, SimulatedRobot,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "config/default_config.yaml";

#[derive(Parser)]
#[command(name = "spot_dance")]
#[command(about = "Upload and execute choreography on a robot")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Debug logging and per-sample telemetry on stdout
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: text, json
    #[arg(long, default_value = "text", global = true)]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload and execute a routine, waiting until it finishes
    Execute {
        /// Routine file in text format
        routine: PathBuf,
        /// Animation clips to upload first, as NAME=FILE
        #[arg(long = "animation", value_name = "NAME=FILE")]
        animations: Vec<String>,
    },
    /// Convert and upload an animation clip
    UploadAnimation {
        name: String,
        file: PathBuf,
    },
    /// List uploaded routines
    ListDances,
    /// List available moves
    ListMoves,
    /// Parse a routine and print its expected runtime
    Estimate {
        routine: PathBuf,
    },
}

impl Args {
    fn get_config_path(&self) -> String {
        self.config
            .clone()
            .or_else(|| std::env::var("SPOT_DANCE_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    fn load_config(&self) -> Result<DaemonConfig> {
        let path = self.get_config_path();
        if self.config.is_none() && !Path::new(&path).exists() {
            warn!("No configuration found at {}, using defaults", path);
            return Ok(DaemonConfig::default());
        }
        info!("Using config: {}", path);
        DaemonConfig::load_from_path(&path).with_context(|| format!("Failed to load configuration from {}", path))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = args.load_config()?;
    let dance_config = config.dance();
    let robot = Arc::new(SimulatedRobot::from_config(&config.simulator()));
    let telemetry: Arc<dyn DanceTelemetry> = if args.verbose {
        Arc::new(ConsoleTelemetry {
            pretty_print: dance_config.pretty_telemetry(),
        })
    } else {
        Arc::new(NoOpTelemetry)
    };
    let mut controller = DanceController::new(robot.clone(), robot, Arc::new(ChaConverter::new()))
        .with_config(&dance_config)
        .with_telemetry(telemetry);

    match &args.command {
        Commands::Execute { routine, animations } => {
            for animation in animations {
                let (name, file) = animation
                    .split_once('=')
                    .ok_or_else(|| anyhow!("Invalid --animation '{}', expected NAME=FILE", animation))?;
                let content = read_file(Path::new(file))?;
                let response = controller.upload_animation(name, &content).await;
                if !response.success {
                    print_response(&args, &response);
                    std::process::exit(1);
                }
            }

            let text = read_file(routine)?;
            match controller.execute_dance(&text).await {
                Ok(response) => {
                    print_response(&args, &response);
                    std::process::exit(if response.success { 0 } else { 1 });
                }
                Err(timeout) => {
                    error!("{}", timeout);
                    eprintln!("✗ {}", timeout);
                    eprintln!("Robot state is unknown, check the robot before retrying");
                    std::process::exit(2);
                }
            }
        }
        Commands::UploadAnimation { name, file } => {
            let content = read_file(file)?;
            let response = controller.upload_animation(name, &content).await;
            print_response(&args, &response);
            std::process::exit(if response.success { 0 } else { 1 });
        }
        Commands::ListDances => {
            let response = controller.list_all_dances().await;
            print_list(&args, &response);
            std::process::exit(if response.success { 0 } else { 1 });
        }
        Commands::ListMoves => {
            let response = controller.list_all_moves().await;
            print_list(&args, &response);
            std::process::exit(if response.success { 0 } else { 1 });
        }
        Commands::Estimate { routine } => {
            let text = read_file(routine)?;
            let routine =
                RoutineDefinition::parse(&text).map_err(|e| anyhow!("Failed to load choreography: {}", e))?;
            let seconds = routine.estimated_seconds()?;
            match args.format.as_str() {
                "json" => output_event(&serde_json::json!({
                    "name": routine.name,
                    "moves": routine.moves.len(),
                    "total_slices": routine.total_slices(),
                    "slices_per_minute": routine.slices_per_minute,
                    "estimated_seconds": seconds,
                })),
                _ => {
                    println!(
                        "{}: {} moves, {} slices at {} slices/min",
                        routine.name,
                        routine.moves.len(),
                        routine.total_slices(),
                        routine.slices_per_minute
                    );
                    println!("Estimated runtime: {:.2}s", seconds);
                    if args.verbose {
                        print!("\n{}", routine.to_text());
                    }
                }
            }
            Ok(())
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_response(args: &Args, response: &DanceResponse) {
    match args.format.as_str() {
        "json" => output_event(response),
        _ => {
            if response.success {
                println!("✓ {}", response.message);
            } else {
                eprintln!("✗ {}", response.message);
            }
        }
    }
}

fn print_list(args: &Args, response: &ListResponse) {
    match args.format.as_str() {
        "json" => output_event(response),
        _ => {
            if response.success {
                for name in &response.names {
                    println!("{}", name);
                }
            } else {
                eprintln!("✗ {}", response.message);
            }
        }
    }
}
