use std::fs;
use std::path::Path;

use anyhow::Result;
use epiar_engine::catalog::Catalog;
use epiar_engine::config::EngineConfig;
use epiar_engine::game::Game;
use epiar_engine::mission::{MissionOutcome, MissionState};
use epiar_engine::timer::ManualClock;
use epiar_saves::SaveDocument;
use tempfile::tempdir;

fn delivery(version: i64) -> String {
    format!(
        r#"
        Delivery = {{
            Version = {version},
            Author = "Matt",
            Difficulty = "Easy",
            Create = function()
                local m = defaultMissionTable("Deliver Spice", "Carry spice to Ixon")
                m.Cargo = {{ "spice", 4 }}
                m.Legs = 0
                return m
            end,
            Accept = function(m) Epiar.HUD.newAlert("Cargo loaded") end,
            Reject = function(m) end,
            Update = function(m)
                m.Legs = m.Legs + 1
            end,
            Land = function(m)
                if m.Legs >= 2 then return true end
            end,
            Success = function(m) Epiar.HUD.newAlert("Delivered " .. m.Cargo[2]) end,
            Failure = function(m) end,
        }}
        "#
    )
}

const PATROL: &str = r#"
    Patrol = {
        Version = 1,
        Create = function() return defaultMissionTable("Patrol", "Sweep the lanes") end,
        Accept = function(m) end,
        Reject = function(m) end,
        Update = function(m) return false end,
        Land = function(m) end,
        Success = function(m) end,
        Failure = function(m) Epiar.HUD.newAlert("Patrol abandoned") end,
    }
"#;

fn game_with(script: &str) -> Result<Game> {
    let game = Game::new(
        EngineConfig::default(),
        Catalog::new(),
        Box::new(ManualClock::new()),
    )?;
    game.lua().load(script).exec()?;
    Ok(game)
}

fn saved_game(path: &Path) -> Result<()> {
    let mut game = game_with(&delivery(2))?;
    let index = game.offer_mission("Delivery")?;
    assert_eq!(game.accept_mission(index), Some(MissionState::Active));
    game.tick()?;
    game.save(path)
}

#[test]
fn delivery_runs_from_offer_to_success() -> Result<()> {
    let mut game = game_with(&delivery(2))?;
    let index = game.offer_mission("Delivery")?;
    assert_eq!(game.missions().get(index).map(|m| m.state()), Some(MissionState::Offered));
    assert_eq!(game.accept_mission(index), Some(MissionState::Active));

    assert!(game.land().is_empty());
    game.tick()?;
    game.tick()?;
    let finished = game.land();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].name, "Deliver Spice");
    assert_eq!(finished[0].state, MissionState::Completed(MissionOutcome::Success));
    assert!(game.missions().is_empty());

    let events = game.context().events();
    assert!(events.iter().any(|e| e == "mission.offer Delivery"));
    assert!(events.iter().any(|e| e == "mission.accept Delivery"));
    assert!(events.iter().any(|e| e == "mission.success Delivery"));
    let context = game.context().borrow();
    let alerts: Vec<&str> = context.hud().alerts().map(|a| a.message.as_str()).collect();
    assert_eq!(alerts, vec!["Cargo loaded", "Delivered 4"]);
    Ok(())
}

#[test]
fn update_returning_false_fails_the_mission() -> Result<()> {
    let mut game = game_with(PATROL)?;
    let index = game.offer_mission("Patrol")?;
    game.accept_mission(index);
    let report = game.tick()?;
    assert_eq!(report.finished.len(), 1);
    assert_eq!(
        report.finished[0].state,
        MissionState::Completed(MissionOutcome::Failure)
    );
    assert!(game
        .context()
        .events()
        .iter()
        .any(|e| e == "mission.failure Patrol"));
    Ok(())
}

#[test]
fn rejected_and_unknown_missions() -> Result<()> {
    let mut game = game_with(PATROL)?;
    assert!(game.offer_mission("Smuggling").is_err());
    let index = game.offer_mission("Patrol")?;
    assert_eq!(game.reject_mission(index), Some(MissionState::Rejected));
    assert!(game.missions().is_empty());
    assert_eq!(game.reject_mission(index), None);
    Ok(())
}

#[test]
fn saved_missions_restore_at_the_same_version() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("player.json");
    saved_game(&path)?;

    let document = SaveDocument::read_from(&path)?;
    assert_eq!(document.root.name, "Player");
    let missions = document.root.require_child("Missions")?;
    let record = missions.require_child("Mission")?;
    assert_eq!(record.require_child("type")?.text(), "Delivery");
    assert_eq!(record.require_child("version")?.text_as_int()?, 2);

    let mut game = game_with(&delivery(2))?;
    assert_eq!(game.load(&path)?, 1);
    let mission = game.missions().get(0).expect("restored mission");
    assert_eq!(mission.state(), MissionState::Active);
    assert_eq!(mission.name(game.lua()), "Deliver Spice");
    let legs: i64 = mission.instance_table(game.lua())?.get("Legs")?;
    assert_eq!(legs, 1);

    game.tick()?;
    let finished = game.land();
    assert_eq!(finished.len(), 1);
    Ok(())
}

#[test]
fn saved_missions_from_another_version_are_skipped() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("player.json");
    saved_game(&path)?;

    let mut newer = game_with(&delivery(3))?;
    assert_eq!(newer.load(&path)?, 0);
    assert!(newer.missions().is_empty());
    assert!(newer.context().events().iter().any(|e| e == "mission.load 0"));

    let mut missing_type = game_with(PATROL)?;
    assert_eq!(missing_type.load(&path)?, 0);
    Ok(())
}

#[test]
fn save_without_missions_section_is_refused() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("broken.json");
    fs::write(
        &path,
        r#"{"format_version": 1, "root": {"name": "Player"}}"#,
    )?;
    let mut game = game_with(PATROL)?;
    assert!(game.load(&path).is_err());
    Ok(())
}
