//! Predictive Health Core - Main Entry Point
//!
//! Runs the inference engine and retraining scheduler for industrial
//! sensor readings, and doubles as its own file-protocol modeling worker.

mod api;
mod logic;
pub mod constants;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use api::commands::{self, AppState, ReadingInput};
use logic::config::EngineConfig;
use logic::features::SensorFeatures;
use logic::worker::protocol::{serve_file, WorkerMode};
use logic::worker::StatisticalWorker;

#[derive(Parser)]
#[command(name = "predictive-health-core", version, about = "Predictive maintenance inference engine")]
struct Cli {
    /// Override the data directory (model file and sensor database)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the retraining scheduler and score JSON readings from stdin
    Serve,
    /// Score one reading without storing it
    Predict {
        /// Reading as JSON, e.g. {"temp_mean":45,"vib_rms":1.2,"current_rms":2.1}
        #[arg(long)]
        json: String,
    },
    /// Train now and commit the model
    Train {
        #[arg(long)]
        device: Option<String>,
    },
    /// Print engine, model and store status
    Status {
        #[arg(long, value_enum, default_value_t = StatusSection::All)]
        section: StatusSection,
    },
    /// Bulk-load newline-delimited JSON readings
    Import { file: PathBuf },
    /// Serve one file-protocol request with the built-in worker
    Worker {
        mode: WorkerModeArg,
        input: PathBuf,
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusSection {
    All,
    Model,
    Scheduler,
}

#[derive(Clone, Copy, ValueEnum)]
enum WorkerModeArg {
    Train,
    Predict,
}

impl From<WorkerModeArg> for WorkerMode {
    fn from(mode: WorkerModeArg) -> Self {
        match mode {
            WorkerModeArg::Train => WorkerMode::Train,
            WorkerModeArg::Predict => WorkerMode::Predict,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    if let Command::Worker { mode, input, output } = &cli.command {
        let worker = StatisticalWorker::new(config.min_training_samples);
        return match serve_file(&worker, (*mode).into(), input, output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    log::info!("Starting {} v{}...", constants::APP_NAME, constants::APP_VERSION);

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Failed to open feature store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Serve => serve(&state).await,
        Command::Predict { json } => match serde_json::from_str::<SensorFeatures>(&json) {
            Ok(features) => print_json(&commands::predict(&state, features).await),
            Err(e) => Err(format!("Invalid reading: {}", e)),
        },
        Command::Train { device } => print_json(&commands::train_model(&state, device).await),
        Command::Status { section } => match section {
            StatusSection::All => print_json(&commands::get_engine_status(&state).await),
            StatusSection::Model => print_json(&commands::get_model_status(&state).await),
            StatusSection::Scheduler => print_json(&commands::get_scheduler_status(&state).await),
        },
        Command::Import { file } => print_json(&commands::import_readings(&state, &file).await),
        Command::Worker { .. } => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(result: &Result<T, String>) -> Result<(), String> {
    let value = result.as_ref().map_err(Clone::clone)?;
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

/// Scheduler in the background, stdin readings in the foreground, until Ctrl-C
async fn serve(state: &AppState) -> Result<(), String> {
    state.scheduler.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutdown requested");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_line(state, &line).await,
                Ok(None) => {
                    log::info!("stdin closed; scheduler keeps running until Ctrl-C");
                    stdin_open = false;
                }
                Err(e) => {
                    log::warn!("stdin read failed: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    state.scheduler.stop();
    Ok(())
}

async fn handle_line(state: &AppState, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let input: ReadingInput = match serde_json::from_str(line) {
        Ok(input) => input,
        Err(e) => {
            log::warn!("Ignoring malformed reading: {}", e);
            return;
        }
    };

    match commands::ingest_reading(state, input).await {
        Ok(result) => match serde_json::to_string(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => log::warn!("Failed to encode result: {}", e),
        },
        Err(e) => log::error!("Ingest failed: {}", e),
    }
}
