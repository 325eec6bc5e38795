use std::fs;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

mod cli;

use cli::Args;
use epiar_engine::catalog::Catalog;
use epiar_engine::config::EngineConfig;
use epiar_engine::game::Game;
use epiar_engine::mission::{FinishedMission, MissionState};
use epiar_engine::timer::SystemClock;

#[derive(Debug, Serialize)]
struct MissionSummary {
    mission_type: String,
    name: String,
    state: String,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    ticks: u32,
    last_tick: u64,
    ships: usize,
    restored: usize,
    active: Vec<MissionSummary>,
    finished: Vec<MissionSummary>,
    events: Vec<String>,
}

fn describe_state(state: MissionState) -> String {
    match state {
        MissionState::Completed(outcome) => format!("{outcome:?}"),
        other => format!("{other:?}"),
    }
}

impl From<&FinishedMission> for MissionSummary {
    fn from(mission: &FinishedMission) -> Self {
        MissionSummary {
            mission_type: mission.mission_type.clone(),
            name: mission.name.clone(),
            state: describe_state(mission.state),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    args.validate()?;

    let summary = run(&args)?;
    print_summary(&summary);

    if let Some(path) = args.summary_json.as_ref() {
        let json = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
        fs::write(path, json)
            .with_context(|| format!("writing run summary to {}", path.display()))?;
        println!("Saved run summary to {}", path.display());
    }
    Ok(())
}

fn run(args: &Args) -> Result<RunSummary> {
    let config = EngineConfig::from_json_file(args.config.as_deref()).context("loading engine config")?;
    let catalog = Catalog::from_json_file(args.catalog.as_deref()).context("loading catalog")?;
    log::info!(
        "catalog: {} models, {} weapons",
        catalog.model_count(),
        catalog.weapon_count()
    );
    let mut game = Game::new(config, catalog, Box::new(SystemClock::new()))?;

    if let Some(dir) = args.scripts.as_ref() {
        let loaded = game.load_scripts(dir)?;
        log::info!("loaded {} scripts from {}", loaded.len(), dir.display());
    }

    let restored = match args.load.as_ref() {
        Some(path) => game.load(path)?,
        None => 0,
    };

    for mission_type in &args.offers {
        match game.offer_mission(mission_type) {
            Ok(index) => {
                game.accept_mission(index);
            }
            Err(err) => log::error!("cannot offer '{mission_type}': {err}"),
        }
    }

    let mut finished = Vec::new();
    let mut last_tick = 0;
    for _ in 0..args.ticks {
        let report = game.tick()?;
        last_tick = report.tick;
        finished.extend(report.finished.iter().map(MissionSummary::from));
        thread::sleep(game.context().borrow().timer().frame_budget());
    }
    if args.land {
        finished.extend(game.land().iter().map(MissionSummary::from));
    }

    if let Some(path) = args.save.as_ref() {
        game.save(path)?;
    }

    let lua = game.lua();
    let active = game
        .missions()
        .iter()
        .map(|mission| MissionSummary {
            mission_type: mission.mission_type().to_string(),
            name: mission.name(lua),
            state: describe_state(mission.state()),
        })
        .collect();
    let ships = game.context().borrow().sprites().ship_ids().len();
    Ok(RunSummary {
        ticks: args.ticks,
        last_tick,
        ships,
        restored,
        active,
        finished,
        events: game.context().events(),
    })
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Ran {} ticks (last tick {}) | ships: {} | restored missions: {}",
        summary.ticks, summary.last_tick, summary.ships, summary.restored
    );
    if !summary.active.is_empty() {
        println!("\nActive missions:");
        for mission in &summary.active {
            println!("  - {} [{}] {}", mission.name, mission.mission_type, mission.state);
        }
    }
    if !summary.finished.is_empty() {
        println!("\nFinished missions:");
        for mission in &summary.finished {
            println!("  - {} [{}] {}", mission.name, mission.mission_type, mission.state);
        }
    }
    if !summary.events.is_empty() {
        println!("\nEngine events:");
        for event in &summary.events {
            println!("  {event}");
        }
    }
}
