mod config;
mod engine;
mod models;
mod report;
mod rewards;
mod scheduler;
mod stats;
mod storage;
mod tui;
mod utils;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use engine::SessionEngine;
use fd_lock::RwLock;
use models::Mode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use report::Reporter;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use storage::Storage;

#[derive(Parser)]
#[command(name = "fogo")]
#[command(about = "Timed focus sessions that earn points and badges", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the focus timer
    Start {
        /// Begin a session in this mode right away
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,
        /// Focus time per point and badge (e.g. 2m, 90s)
        #[arg(long)]
        award_interval: Option<String>,
        /// Timer refresh cadence (e.g. 1s)
        #[arg(long)]
        tick_interval: Option<String>,
    },
    /// Show points, badges and recent sessions
    Report,
    /// Set up the profile name and photo
    Profile {
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
        /// Image file to use as the profile photo
        #[arg(short, long, conflicts_with = "clear_photo")]
        photo: Option<PathBuf>,
        /// Remove the stored photo
        #[arg(long)]
        clear_photo: bool,
    },
}

fn init_logging(base_dir: &Path) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(base_dir.join("fogo.log"))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

fn open_lock(base_dir: &Path) -> Result<RwLock<File>> {
    let lock_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(base_dir.join("fogo.lock"))?;
    Ok(RwLock::new(lock_file))
}

fn already_running() -> anyhow::Error {
    anyhow::anyhow!(
        "Another instance of Fogo is already running. Please close it before starting a new one."
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let base_dir = Storage::get_base_dir()?;
    init_logging(&base_dir)?;
    let mut config = config::load_config()?;
    let storage = Storage::new()?;

    match cli.command {
        Commands::Start {
            mode,
            award_interval,
            tick_interval,
        } => {
            let mut lock = open_lock(&base_dir)?;
            let _guard = lock.try_write().map_err(|_| already_running())?;

            if let Some(value) = award_interval {
                config.award_interval = value;
            }
            if let Some(value) = tick_interval {
                config.tick_interval = value;
            }
            let cadence = config.cadence()?;

            let mut engine =
                SessionEngine::open(storage.clone(), StdRng::from_entropy(), cadence)?;
            if let Some(mode) = mode {
                engine.start(mode, Utc::now())?;
            }

            tui::run_tui(&mut engine, config.recent_sessions)?;

            if let Some(err) = engine.last_save_error() {
                eprintln!("Warning: the last save failed: {}", err);
            }

            println!("\nFocus timer closed.");
            let reporter = Reporter::new(storage, config.recent_sessions);
            reporter.report()?;
        }
        Commands::Report => {
            let reporter = Reporter::new(storage, config.recent_sessions);
            reporter.report()?;
        }
        Commands::Profile {
            name,
            photo,
            clear_photo,
        } => {
            let mut lock = open_lock(&base_dir)?;
            let _guard = lock.try_write().map_err(|_| already_running())?;

            let mut engine =
                SessionEngine::open(storage, StdRng::from_entropy(), config.cadence()?)?;
            if let Some(name) = name {
                engine.set_name(&name);
            }
            if let Some(path) = photo {
                let bytes = fs::read(&path)
                    .with_context(|| format!("could not read photo {}", path.display()))?;
                engine.set_photo(Some(bytes));
            } else if clear_photo {
                engine.set_photo(None);
            }
            if let Some(err) = engine.last_save_error() {
                anyhow::bail!("profile not saved: {}", err);
            }

            let profile = engine.profile();
            println!(
                "Name:   {}",
                if profile.name.is_empty() {
                    "(not set)"
                } else {
                    profile.name.as_str()
                }
            );
            println!(
                "Photo:  {}",
                profile
                    .image_data
                    .as_ref()
                    .map_or("(none)".to_string(), |b| format!("{} bytes", b.len()))
            );
            println!("Points: {}", profile.total_points);
            println!("Badges: {}", profile.badges.len());
        }
    }

    Ok(())
}
