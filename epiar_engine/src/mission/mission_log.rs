use epiar_saves::Node;
use mlua::Lua;

use super::persist::RECORD_NODE;
use super::{Mission, MissionState};

pub const LOG_NODE: &str = "Missions";

/// A mission that left the log, and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedMission {
    pub mission_type: String,
    pub name: String,
    pub state: MissionState,
}

/// The player's missions, in the order they were offered.
#[derive(Debug, Default)]
pub struct MissionLog {
    missions: Vec<Mission>,
}

impl MissionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Mission> {
        self.missions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mission> {
        self.missions.iter()
    }

    /// Adds an offered mission and returns its index.
    pub fn offer(&mut self, mission: Mission) -> usize {
        self.missions.push(mission);
        self.missions.len() - 1
    }

    /// Accepts the mission at `index`. A mission whose `Accept` fails is
    /// removed straight away.
    pub fn accept(&mut self, lua: &Lua, index: usize) -> Option<FinishedMission> {
        let delete = self.missions.get_mut(index)?.accept(lua);
        delete.then(|| self.finish(lua, index))
    }

    /// Rejects the mission at `index`; it leaves the log either way.
    pub fn reject(&mut self, lua: &Lua, index: usize) -> Option<FinishedMission> {
        self.missions.get_mut(index)?.reject(lua);
        Some(self.finish(lua, index))
    }

    pub fn update_all(&mut self, lua: &Lua) -> Vec<FinishedMission> {
        let flagged: Vec<bool> = self
            .missions
            .iter_mut()
            .map(|mission| mission.update(lua))
            .collect();
        self.sweep(lua, &flagged)
    }

    pub fn land_all(&mut self, lua: &Lua) -> Vec<FinishedMission> {
        let flagged: Vec<bool> = self
            .missions
            .iter_mut()
            .map(|mission| mission.land(lua))
            .collect();
        self.sweep(lua, &flagged)
    }

    /// Removes the flagged missions once every mission has had its turn.
    fn sweep(&mut self, lua: &Lua, flagged: &[bool]) -> Vec<FinishedMission> {
        let mut finished = Vec::new();
        for index in (0..flagged.len()).rev() {
            if flagged[index] {
                finished.push(self.finish(lua, index));
            }
        }
        finished.reverse();
        finished
    }

    fn finish(&mut self, lua: &Lua, index: usize) -> FinishedMission {
        let mission = self.missions.remove(index);
        let finished = FinishedMission {
            mission_type: mission.mission_type().to_string(),
            name: mission.name(lua),
            state: mission.state(),
        };
        log::info!(
            "mission '{}' ({}) left the log: {:?}",
            finished.name,
            finished.mission_type,
            finished.state
        );
        mission.release(lua);
        finished
    }

    /// Releases every mission without running any lifecycle function.
    pub fn clear(&mut self, lua: &Lua) {
        for mission in self.missions.drain(..) {
            mission.release(lua);
        }
    }

    /// Saves the accepted missions. Offers the player never took up are not
    /// saved, since a restored mission comes back active. A mission that
    /// cannot be written is left out with a warning.
    pub fn to_record(&self, lua: &Lua) -> Node {
        let mut node = Node::new(LOG_NODE);
        for mission in &self.missions {
            if mission.state() != MissionState::Active {
                log::debug!(
                    "not saving '{}' mission in state {:?}",
                    mission.mission_type(),
                    mission.state()
                );
                continue;
            }
            match mission.to_record(lua) {
                Ok(record) => {
                    node.push_child(record);
                }
                Err(err) => log::warn!("not saving '{}' mission: {err}", mission.mission_type()),
            }
        }
        node
    }

    /// Restores saved missions as active. Entries that fail validation are
    /// skipped. Returns how many were restored.
    pub fn load_record(&mut self, lua: &Lua, node: &Node) -> usize {
        let mut restored = 0;
        for record in node.children_named(RECORD_NODE) {
            match Mission::from_record(lua, record) {
                Ok(mut mission) => {
                    mission.resume();
                    self.missions.push(mission);
                    restored += 1;
                }
                Err(err) => log::warn!("skipping saved mission: {err}"),
            }
        }
        restored
    }
}
