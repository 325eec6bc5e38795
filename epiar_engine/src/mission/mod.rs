//! Missions: script-defined goals driven through a fixed lifecycle.
//!
//! A mission type is a global Lua table of lifecycle functions. Each mission
//! owns one instance table created by the type's `Create` function and
//! handed back to every other lifecycle call. Native code never writes into
//! that table; it only reads `Name` and `Description` and saves it whole.

mod contract;
mod mission_log;
mod persist;

use epiar_saves::SaveError;
use mlua::{Lua, MultiValue, RegistryKey, Table, Value};
use thiserror::Error;

pub use contract::{validate_mission, Lifecycle, MissionMetadata, MissionType, REQUIRED_FIELDS};
pub use mission_log::{FinishedMission, MissionLog};

use crate::lua_host::dispatch::lua_number_to_string;
use crate::lua_host::marshal::describe_type;
use crate::lua_host::ConvertError;

#[derive(Debug, Error)]
pub enum MissionError {
    #[error("There is no Mission Type named '{0}'")]
    UnknownType(String),
    #[error("The Mission '{mission_type}' doesn't have a {function} function")]
    MissingFunction {
        mission_type: String,
        function: &'static str,
    },
    #[error("The Mission '{mission_type}' has no mission table")]
    MissingTable { mission_type: String },
    #[error("The Mission '{mission_type}' doesn't have a {field}")]
    MissingField {
        mission_type: String,
        field: &'static str,
    },
    #[error("This '{mission_type}' Mission has a corrupted version '{found}'")]
    CorruptVersion { mission_type: String, found: String },
    #[error("This '{mission_type}' Mission was saved at version {saved} but the current version is {current}")]
    VersionMismatch {
        mission_type: String,
        saved: i64,
        current: i64,
    },
    #[error("{mission_type}.Create returned {found} instead of a mission table")]
    CreateFailed { mission_type: String, found: String },
    #[error("malformed mission record: {0}")]
    Record(#[from] SaveError),
    #[error("malformed mission table: {0}")]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionState {
    Offered,
    Active,
    Completed(MissionOutcome),
    /// A lifecycle call raised an error.
    Invalidated,
    Rejected,
}

impl MissionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MissionState::Completed(_) | MissionState::Invalidated | MissionState::Rejected
        )
    }
}

/// One live mission. Only built through [`Mission::create`] or
/// [`Mission::from_record`], both of which validate first.
#[derive(Debug)]
pub struct Mission {
    binding: MissionType,
    table: RegistryKey,
    state: MissionState,
}

impl Mission {
    /// Asks the type's `Create` function for a fresh instance table.
    pub fn create(lua: &Lua, mission_type: &str) -> Result<Self, MissionError> {
        let binding = MissionType::resolve(lua, mission_type)?;
        let created = binding
            .function(lua, Lifecycle::Create)
            .and_then(|create| Ok(create.call::<_, Value>(())?));
        match created {
            Ok(Value::Table(table)) => Self::assemble(lua, binding, table, 0),
            Ok(other) => {
                binding.release(lua);
                Err(MissionError::CreateFailed {
                    mission_type: mission_type.to_string(),
                    found: describe_type(&other),
                })
            }
            Err(err) => {
                binding.release(lua);
                Err(err)
            }
        }
    }

    /// Wraps an existing instance table. The table and type are validated
    /// (including the version when `expected_version` is above zero) before
    /// a mission exists.
    pub fn bind(
        lua: &Lua,
        mission_type: &str,
        table: Table<'_>,
        expected_version: i64,
    ) -> Result<Self, MissionError> {
        let binding = MissionType::resolve(lua, mission_type)?;
        Self::assemble(lua, binding, table, expected_version)
    }

    fn assemble(
        lua: &Lua,
        binding: MissionType,
        table: Table<'_>,
        expected_version: i64,
    ) -> Result<Self, MissionError> {
        let key = match lua.create_registry_value(table) {
            Ok(key) => key,
            Err(err) => {
                binding.release(lua);
                return Err(err.into());
            }
        };
        match contract::check_instance(lua, &binding, &key, expected_version) {
            Ok(()) => Ok(Mission {
                binding,
                table: key,
                state: MissionState::Offered,
            }),
            Err(err) => {
                if let Err(release_err) = lua.remove_registry_value(key) {
                    log::warn!("failed to release rejected mission table: {release_err}");
                }
                binding.release(lua);
                Err(err)
            }
        }
    }

    pub fn mission_type(&self) -> &str {
        self.binding.name()
    }

    pub fn state(&self) -> MissionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub(crate) fn resume(&mut self) {
        if self.state == MissionState::Offered {
            self.state = MissionState::Active;
        }
    }

    pub fn instance_table<'lua>(&self, lua: &'lua Lua) -> mlua::Result<Table<'lua>> {
        lua.registry_value(&self.table)
    }

    /// The type's current version, or 0 when the type has gone missing or
    /// its version is unreadable.
    pub fn version(&self, lua: &Lua) -> i64 {
        match self.binding.version(lua) {
            Ok(version) => version,
            Err(err) => {
                log::error!("{err}");
                0
            }
        }
    }

    pub fn metadata(&self, lua: &Lua) -> MissionMetadata {
        self.binding.metadata(lua).unwrap_or_else(|err| {
            log::warn!("{err}");
            MissionMetadata::default()
        })
    }

    pub fn name(&self, lua: &Lua) -> String {
        self.string_attribute(lua, "Name")
    }

    pub fn description(&self, lua: &Lua) -> String {
        self.string_attribute(lua, "Description")
    }

    fn string_attribute(&self, lua: &Lua, attribute: &str) -> String {
        let value = self
            .instance_table(lua)
            .and_then(|table| table.get::<_, Value>(attribute));
        match value {
            Ok(Value::String(text)) => text.to_string_lossy().into_owned(),
            Ok(Value::Integer(i)) => lua_number_to_string(i as f64),
            Ok(Value::Number(n)) => lua_number_to_string(n),
            Ok(_) => String::new(),
            Err(err) => {
                log::warn!("{}: cannot read {attribute}: {err}", self.mission_type());
                String::new()
            }
        }
    }

    /// Runs `Accept`. The mission becomes active whatever the script returns.
    /// Returns true when the call failed and the mission should be deleted.
    pub fn accept(&mut self, lua: &Lua) -> bool {
        if self.state != MissionState::Offered {
            log::warn!(
                "cannot accept '{}' mission in state {:?}",
                self.mission_type(),
                self.state
            );
            return false;
        }
        log::info!("Accepting Mission '{}'", self.name(lua));
        if self.run(lua, Lifecycle::Accept, false) {
            return true;
        }
        self.state = MissionState::Active;
        false
    }

    /// Runs `Reject`. Returns true when the call failed.
    pub fn reject(&mut self, lua: &Lua) -> bool {
        if self.is_terminal() {
            log::warn!(
                "cannot reject '{}' mission in state {:?}",
                self.mission_type(),
                self.state
            );
            return false;
        }
        log::info!("Rejecting Mission '{}'", self.name(lua));
        if self.run(lua, Lifecycle::Reject, false) {
            return true;
        }
        self.state = MissionState::Rejected;
        false
    }

    /// Runs `Update`. Returns true once the mission is over and should be
    /// deleted.
    pub fn update(&mut self, lua: &Lua) -> bool {
        self.check_progress(lua, Lifecycle::Update)
    }

    /// Runs `Land` after the player docks. Same contract as [`Mission::update`].
    pub fn land(&mut self, lua: &Lua) -> bool {
        self.check_progress(lua, Lifecycle::Land)
    }

    fn check_progress(&mut self, lua: &Lua, which: Lifecycle) -> bool {
        if self.state != MissionState::Active {
            log::debug!(
                "skipping {} for '{}' mission in state {:?}",
                which.name(),
                self.mission_type(),
                self.state
            );
            return self.is_terminal();
        }
        self.run(lua, which, true)
    }

    /// Calls one lifecycle function with the instance table. With
    /// `check_completion`, a boolean as the last result ends the mission.
    fn run(&mut self, lua: &Lua, which: Lifecycle, check_completion: bool) -> bool {
        let finished = match self.call(lua, which) {
            Err(err) => {
                log::error!("Failed to run {}.{}: {err}", self.mission_type(), which.name());
                self.state = MissionState::Invalidated;
                return true;
            }
            Ok(results) => match results.into_iter().last() {
                Some(Value::Boolean(success)) if check_completion => success,
                _ => return false,
            },
        };

        let (outcome, follow_up) = if finished {
            log::info!("The Mission '{}' is a Success", self.name(lua));
            (MissionOutcome::Success, Lifecycle::Success)
        } else {
            log::info!("The Mission '{}' is a Failure", self.name(lua));
            (MissionOutcome::Failure, Lifecycle::Failure)
        };
        if let Err(err) = self.call(lua, follow_up) {
            log::error!("Failed to run {}.{}: {err}", self.mission_type(), follow_up.name());
        }
        self.state = MissionState::Completed(outcome);
        true
    }

    fn call<'lua>(&self, lua: &'lua Lua, which: Lifecycle) -> Result<MultiValue<'lua>, MissionError> {
        let function = self.binding.function(lua, which)?;
        let table = self.instance_table(lua)?;
        Ok(function.call::<_, MultiValue>(table)?)
    }

    /// Drops the mission's hold on its instance table and lifecycle
    /// functions.
    pub fn release(self, lua: &Lua) {
        if let Err(err) = lua.remove_registry_value(self.table) {
            log::warn!("failed to release '{}' mission table: {err}", self.binding.name());
        }
        self.binding.release(lua);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNTY: &str = r#"
        calls = {}
        Bounty = {
            Version = 1,
            Create = function()
                return { Name = "Bounty", Description = "Hunt the pirate", Kills = 0 }
            end,
            Accept = function(m) table.insert(calls, "Accept") return false end,
            Reject = function(m) table.insert(calls, "Reject") end,
            Update = function(m)
                table.insert(calls, "Update")
                m.Kills = m.Kills + 1
                return verdict
            end,
            Land = function(m) table.insert(calls, "Land") error("docking clamp jammed") end,
            Success = function(m) table.insert(calls, "Success") end,
            Failure = function(m) table.insert(calls, "Failure") end,
        }
    "#;

    fn lua() -> mlua::Result<Lua> {
        let lua = Lua::new();
        lua.load(BOUNTY).exec()?;
        Ok(lua)
    }

    fn calls(lua: &Lua) -> mlua::Result<Vec<String>> {
        lua.load("return calls").eval()
    }

    #[test]
    fn accept_activates_regardless_of_return_value() -> anyhow::Result<()> {
        let lua = lua()?;
        let mut mission = Mission::create(&lua, "Bounty")?;
        assert_eq!(mission.state(), MissionState::Offered);
        assert_eq!(mission.name(&lua), "Bounty");
        assert_eq!(mission.description(&lua), "Hunt the pirate");
        assert!(!mission.accept(&lua));
        assert_eq!(mission.state(), MissionState::Active);
        assert!(!mission.accept(&lua));
        assert_eq!(calls(&lua)?, vec!["Accept"]);
        mission.release(&lua);
        Ok(())
    }

    #[test]
    fn update_nil_keeps_mission_running() -> anyhow::Result<()> {
        let lua = lua()?;
        let mut mission = Mission::create(&lua, "Bounty")?;
        mission.accept(&lua);
        assert!(!mission.update(&lua));
        assert!(!mission.update(&lua));
        assert_eq!(mission.state(), MissionState::Active);
        assert_eq!(calls(&lua)?, vec!["Accept", "Update", "Update"]);
        let kills: i64 = mission.instance_table(&lua)?.get("Kills")?;
        assert_eq!(kills, 2);
        mission.release(&lua);
        Ok(())
    }

    #[test]
    fn update_true_runs_success() -> anyhow::Result<()> {
        let lua = lua()?;
        let mut mission = Mission::create(&lua, "Bounty")?;
        mission.accept(&lua);
        lua.globals().set("verdict", true)?;
        assert!(mission.update(&lua));
        assert_eq!(mission.state(), MissionState::Completed(MissionOutcome::Success));
        assert_eq!(calls(&lua)?, vec!["Accept", "Update", "Success"]);
        mission.release(&lua);
        Ok(())
    }

    #[test]
    fn update_false_runs_failure() -> anyhow::Result<()> {
        let lua = lua()?;
        let mut mission = Mission::create(&lua, "Bounty")?;
        mission.accept(&lua);
        lua.globals().set("verdict", false)?;
        assert!(mission.update(&lua));
        assert_eq!(mission.state(), MissionState::Completed(MissionOutcome::Failure));
        assert_eq!(calls(&lua)?, vec!["Accept", "Update", "Failure"]);
        mission.release(&lua);
        Ok(())
    }

    #[test]
    fn runtime_errors_invalidate_the_mission() -> anyhow::Result<()> {
        let lua = lua()?;
        let mut mission = Mission::create(&lua, "Bounty")?;
        mission.accept(&lua);
        assert!(mission.land(&lua));
        assert_eq!(mission.state(), MissionState::Invalidated);
        assert!(mission.update(&lua));
        assert_eq!(calls(&lua)?, vec!["Accept", "Land"]);
        mission.release(&lua);
        Ok(())
    }

    #[test]
    fn failing_accept_or_reject_asks_for_deletion() -> anyhow::Result<()> {
        let lua = lua()?;
        lua.load(
            r#"
            Bounty.Accept = function(m) table.insert(calls, "Accept") error("no berth") end
            Bounty.Reject = function(m) table.insert(calls, "Reject") error("comms down") end
            "#,
        )
        .exec()?;

        let mut accepted = Mission::create(&lua, "Bounty")?;
        assert!(accepted.accept(&lua));
        assert_eq!(accepted.state(), MissionState::Invalidated);
        accepted.release(&lua);

        let mut rejected = Mission::create(&lua, "Bounty")?;
        assert!(rejected.reject(&lua));
        assert_eq!(rejected.state(), MissionState::Invalidated);
        rejected.release(&lua);

        assert_eq!(calls(&lua)?, vec!["Accept", "Reject"]);
        Ok(())
    }

    #[test]
    fn reject_ends_the_mission_cleanly() -> anyhow::Result<()> {
        let lua = lua()?;
        let mut mission = Mission::create(&lua, "Bounty")?;
        mission.accept(&lua);
        assert!(!mission.reject(&lua));
        assert_eq!(mission.state(), MissionState::Rejected);
        assert!(mission.is_terminal());
        mission.release(&lua);
        Ok(())
    }

    #[test]
    fn create_must_return_a_valid_table() -> anyhow::Result<()> {
        let lua = lua()?;
        lua.load("Bounty.Create = function() return 42 end").exec()?;
        let err = Mission::create(&lua, "Bounty").unwrap_err();
        assert!(matches!(err, MissionError::CreateFailed { .. }));

        lua.load("Bounty.Create = function() return { Name = 'x' } end").exec()?;
        let err = Mission::create(&lua, "Bounty").unwrap_err();
        assert!(matches!(err, MissionError::MissingField { field: "Description", .. }));
        Ok(())
    }

    #[test]
    fn version_follows_the_live_type() -> anyhow::Result<()> {
        let lua = lua()?;
        let mission = Mission::create(&lua, "Bounty")?;
        assert_eq!(mission.version(&lua), 1);
        lua.load("Bounty.Version = 5").exec()?;
        assert_eq!(mission.version(&lua), 5);
        lua.load("Bounty = nil").exec()?;
        assert_eq!(mission.version(&lua), 0);
        mission.release(&lua);
        Ok(())
    }
}
