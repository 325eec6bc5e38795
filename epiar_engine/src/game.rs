use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use epiar_saves::{Node, SaveDocument};
use mlua::Lua;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::lua_host::{
    install_bindings, load_script_dir, load_script_file, new_lua, run_ai_scripts, EngineContext,
    EngineContextHandle,
};
use crate::mission::{FinishedMission, Mission, MissionError, MissionLog, MissionState};
use crate::timer::TickSource;

const PLAYER_NODE: &str = "Player";
const MISSIONS_NODE: &str = "Missions";

/// What one pass of the game loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub ai_scripts: usize,
    pub finished: Vec<FinishedMission>,
}

/// The Lua state, the world it scripts, and the player's missions.
pub struct Game {
    lua: Lua,
    context: EngineContextHandle,
    missions: MissionLog,
}

impl Game {
    pub fn new(config: EngineConfig, catalog: Catalog, clock: Box<dyn TickSource>) -> Result<Self> {
        let lua = new_lua()?;
        let context = EngineContextHandle::new(EngineContext::new(config, catalog, clock));
        install_bindings(&lua, &context).context("installing script bindings")?;
        Ok(Game {
            lua,
            context,
            missions: MissionLog::new(),
        })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn context(&self) -> &EngineContextHandle {
        &self.context
    }

    pub fn missions(&self) -> &MissionLog {
        &self.missions
    }

    pub fn load_script(&self, path: &Path) -> Result<()> {
        load_script_file(&self.lua, path)
    }

    pub fn load_scripts(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        load_script_dir(&self.lua, dir)
    }

    /// Creates a mission of `mission_type` and puts it on offer.
    pub fn offer_mission(&mut self, mission_type: &str) -> Result<usize, MissionError> {
        let mission = Mission::create(&self.lua, mission_type)?;
        let metadata = mission.metadata(&self.lua);
        log::info!(
            "offering '{}' ({mission_type} v{}, author {})",
            mission.name(&self.lua),
            mission.version(&self.lua),
            metadata.author.as_deref().unwrap_or("unknown")
        );
        self.context
            .log_event(format!("mission.offer {mission_type}"));
        Ok(self.missions.offer(mission))
    }

    /// Accepts an offered mission. Returns the mission's state afterwards,
    /// or `None` when there is no mission at `index`.
    pub fn accept_mission(&mut self, index: usize) -> Option<MissionState> {
        let mission_type = self.missions.get(index)?.mission_type().to_string();
        self.context
            .log_event(format!("mission.accept {mission_type}"));
        match self.missions.accept(&self.lua, index) {
            Some(finished) => {
                self.record_finished(std::slice::from_ref(&finished));
                Some(finished.state)
            }
            None => self.missions.get(index).map(Mission::state),
        }
    }

    pub fn reject_mission(&mut self, index: usize) -> Option<MissionState> {
        let finished = self.missions.reject(&self.lua, index)?;
        self.record_finished(std::slice::from_ref(&finished));
        Some(finished.state)
    }

    /// One pass of the game loop: advance the clock, run AI scripts, check
    /// missions and age the HUD.
    pub fn tick(&mut self) -> Result<TickReport> {
        let tick = self.context.borrow_mut().advance_frame();
        let ai_scripts = run_ai_scripts(&self.lua, &self.context)?;
        let finished = self.missions.update_all(&self.lua);
        self.record_finished(&finished);
        self.lua.expire_registry_values();
        Ok(TickReport {
            tick,
            ai_scripts,
            finished,
        })
    }

    /// The player docked: every active mission gets its `Land` call.
    pub fn land(&mut self) -> Vec<FinishedMission> {
        self.context.log_event("player.land");
        let finished = self.missions.land_all(&self.lua);
        self.record_finished(&finished);
        finished
    }

    fn record_finished(&self, finished: &[FinishedMission]) {
        for mission in finished {
            let outcome = match mission.state {
                MissionState::Completed(outcome) => format!("{outcome:?}").to_lowercase(),
                other => format!("{other:?}").to_lowercase(),
            };
            self.context
                .log_event(format!("mission.{outcome} {}", mission.mission_type));
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut player = Node::new(PLAYER_NODE);
        player.push_child(self.missions.to_record(&self.lua));
        SaveDocument::new(player)
            .write_to(path)
            .with_context(|| format!("saving game to {}", path.display()))?;
        log::info!("saved {} missions to {}", self.missions.len(), path.display());
        Ok(())
    }

    /// Restores missions from a save. Returns how many were restored.
    pub fn load(&mut self, path: &Path) -> Result<usize> {
        let document = SaveDocument::read_from(path)
            .with_context(|| format!("loading game from {}", path.display()))?;
        let missions = document
            .root
            .require_child(MISSIONS_NODE)
            .with_context(|| format!("reading missions from {}", path.display()))?;
        let restored = self.missions.load_record(&self.lua, missions);
        self.context
            .log_event(format!("mission.load {restored}"));
        Ok(restored)
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        self.missions.clear(&self.lua);
    }
}
