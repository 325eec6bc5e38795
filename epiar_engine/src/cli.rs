use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Headless host that runs Epiar mission and AI scripts",
    version
)]
pub struct Args {
    /// Directory of Lua scripts, run in file-name order
    #[arg(long)]
    pub scripts: Option<PathBuf>,

    /// Engine tunables as JSON (fps, alert duration, ...)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Ship models and weapons as JSON
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Save file to restore missions from before running
    #[arg(long)]
    pub load: Option<PathBuf>,

    /// Mission type to offer and accept; may be repeated
    #[arg(long = "offer", value_name = "MISSION_TYPE")]
    pub offers: Vec<String>,

    /// Number of game-loop passes to run
    #[arg(long, default_value_t = 1)]
    pub ticks: u32,

    /// Land the player after the last tick
    #[arg(long)]
    pub land: bool,

    /// Save file to write when the run finishes
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Path to write the run summary as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if !self.offers.is_empty() && self.scripts.is_none() {
            bail!("--offer needs mission types from --scripts");
        }
        if let Some(dir) = self.scripts.as_ref() {
            if !dir.is_dir() {
                bail!("--scripts {} is not a directory", dir.display());
            }
        }
        Ok(())
    }
}
