//! The shape a script-defined mission type must have, and the checks that
//! enforce it before a mission is allowed to exist.

use mlua::{Function, Lua, RegistryKey, Table, Value};

use super::MissionError;
use crate::lua_host::{global_table, marshal::describe_type, table_function};

/// Every mission type defines these functions, one per lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifecycle {
    Create,
    Accept,
    Reject,
    Update,
    Land,
    Success,
    Failure,
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 7] = [
        Lifecycle::Create,
        Lifecycle::Accept,
        Lifecycle::Reject,
        Lifecycle::Update,
        Lifecycle::Land,
        Lifecycle::Success,
        Lifecycle::Failure,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Lifecycle::Create => "Create",
            Lifecycle::Accept => "Accept",
            Lifecycle::Reject => "Reject",
            Lifecycle::Update => "Update",
            Lifecycle::Land => "Land",
            Lifecycle::Success => "Success",
            Lifecycle::Failure => "Failure",
        }
    }
}

/// String fields every mission instance table carries.
pub const REQUIRED_FIELDS: [&str; 2] = ["Name", "Description"];

/// Descriptive fields a mission type may declare. None of them are checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissionMetadata {
    pub uid: Option<i64>,
    pub author: Option<String>,
    pub difficulty: Option<String>,
}

/// A mission type whose lifecycle functions have all been found. The
/// functions are pinned in the registry so later calls skip the lookup.
#[derive(Debug)]
pub struct MissionType {
    name: String,
    functions: Vec<(Lifecycle, RegistryKey)>,
}

impl MissionType {
    pub fn resolve(lua: &Lua, name: &str) -> Result<Self, MissionError> {
        let table = global_table(lua, name)?
            .ok_or_else(|| MissionError::UnknownType(name.to_string()))?;
        let mut functions = Vec::with_capacity(Lifecycle::ALL.len());
        for which in Lifecycle::ALL {
            let Some(function) = table_function(&table, which.name())? else {
                for (_, key) in functions {
                    lua.remove_registry_value(key)?;
                }
                return Err(MissionError::MissingFunction {
                    mission_type: name.to_string(),
                    function: which.name(),
                });
            };
            functions.push((which, lua.create_registry_value(function)?));
        }
        Ok(MissionType {
            name: name.to_string(),
            functions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function<'lua>(
        &self,
        lua: &'lua Lua,
        which: Lifecycle,
    ) -> Result<Function<'lua>, MissionError> {
        let (_, key) = self
            .functions
            .iter()
            .find(|(candidate, _)| *candidate == which)
            .ok_or_else(|| MissionError::MissingFunction {
                mission_type: self.name.clone(),
                function: which.name(),
            })?;
        Ok(lua.registry_value(key)?)
    }

    fn live_table<'lua>(&self, lua: &'lua Lua) -> Result<Table<'lua>, MissionError> {
        global_table(lua, &self.name)?.ok_or_else(|| MissionError::UnknownType(self.name.clone()))
    }

    /// Reads `Version` from the type's global table as it is right now.
    pub fn version(&self, lua: &Lua) -> Result<i64, MissionError> {
        let value = self.live_table(lua)?.get::<_, Value>("Version")?;
        let corrupt = |found: String| MissionError::CorruptVersion {
            mission_type: self.name.clone(),
            found,
        };
        match value {
            Value::Integer(i) => Ok(i),
            Value::Number(n) => Ok(n as i64),
            Value::String(text) => {
                let text = text.to_string_lossy();
                text.trim()
                    .parse::<f64>()
                    .map(|n| n as i64)
                    .map_err(|_| corrupt(text.to_string()))
            }
            other => Err(corrupt(describe_type(&other))),
        }
    }

    pub fn metadata(&self, lua: &Lua) -> Result<MissionMetadata, MissionError> {
        let table = self.live_table(lua)?;
        let text = |value: Value| match value {
            Value::String(text) => Some(text.to_string_lossy().into_owned()),
            _ => None,
        };
        let uid = match table.get::<_, Value>("UID")? {
            Value::Integer(i) => Some(i),
            Value::Number(n) => Some(n as i64),
            _ => None,
        };
        Ok(MissionMetadata {
            uid,
            author: text(table.get("Author")?),
            difficulty: text(table.get("Difficulty")?),
        })
    }

    pub fn release(self, lua: &Lua) {
        for (which, key) in self.functions {
            if let Err(err) = lua.remove_registry_value(key) {
                log::warn!("failed to release {}.{}: {err}", self.name, which.name());
            }
        }
    }
}

/// Checks the instance table referenced by `instance` against the type's
/// contract. With `expected_version` above zero the type's current version
/// must also match it.
pub(crate) fn check_instance(
    lua: &Lua,
    mission_type: &MissionType,
    instance: &RegistryKey,
    expected_version: i64,
) -> Result<(), MissionError> {
    let Value::Table(table) = lua.registry_value::<Value>(instance)? else {
        return Err(MissionError::MissingTable {
            mission_type: mission_type.name().to_string(),
        });
    };

    for field in REQUIRED_FIELDS {
        match table.get::<_, Value>(field)? {
            Value::String(text) => {
                log::info!("The Mission {field}: {}", text.to_string_lossy());
            }
            Value::Integer(i) => log::info!("The Mission {field}: {i}"),
            Value::Number(n) => log::info!("The Mission {field}: {n}"),
            _ => {
                return Err(MissionError::MissingField {
                    mission_type: mission_type.name().to_string(),
                    field,
                })
            }
        }
    }

    if expected_version > 0 {
        let current = mission_type.version(lua)?;
        if current != expected_version {
            return Err(MissionError::VersionMismatch {
                mission_type: mission_type.name().to_string(),
                saved: expected_version,
                current,
            });
        }
    }
    Ok(())
}

/// Resolves `mission_type` and checks the instance table against it,
/// yielding the binding only when everything conforms.
pub(crate) fn bind_mission(
    lua: &Lua,
    mission_type: &str,
    instance: &RegistryKey,
    expected_version: i64,
) -> Result<MissionType, MissionError> {
    let binding = MissionType::resolve(lua, mission_type)?;
    match check_instance(lua, &binding, instance, expected_version) {
        Ok(()) => Ok(binding),
        Err(err) => {
            binding.release(lua);
            Err(err)
        }
    }
}

/// Reports whether the named type and the referenced instance table form a
/// valid mission. Failures are logged, never raised, and no lifecycle
/// function is called.
pub fn validate_mission(
    lua: &Lua,
    mission_type: &str,
    instance: &RegistryKey,
    expected_version: i64,
) -> bool {
    match bind_mission(lua, mission_type, instance, expected_version) {
        Ok(binding) => {
            binding.release(lua);
            true
        }
        Err(err) => {
            log::error!("{err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE_TYPE: &str = r#"
        Patrol = {
            UID = 7, Version = 3, Author = "Matt", Difficulty = "EASY",
            Create = function() return defaultMissionTable("Patrol", "Fly around") end,
            Accept = function(m) end,
            Reject = function(m) end,
            Update = function(m) end,
            Land = function(m) end,
            Success = function(m) end,
            Failure = function(m) end,
        }
        function defaultMissionTable(name, description)
            return { Name = name, Description = description }
        end
    "#;

    fn lua_with_patrol() -> mlua::Result<Lua> {
        let lua = Lua::new();
        lua.load(COMPLETE_TYPE).exec()?;
        Ok(lua)
    }

    fn instance(lua: &Lua, source: &str) -> mlua::Result<RegistryKey> {
        let value: Value = lua.load(source).eval()?;
        lua.create_registry_value(value)
    }

    #[test]
    fn complete_type_validates() -> anyhow::Result<()> {
        let lua = lua_with_patrol()?;
        let key = instance(&lua, "return Patrol.Create()")?;
        assert!(validate_mission(&lua, "Patrol", &key, 0));
        assert!(validate_mission(&lua, "Patrol", &key, 3));
        Ok(())
    }

    #[test]
    fn each_missing_function_fails_validation() -> anyhow::Result<()> {
        for which in Lifecycle::ALL {
            let lua = lua_with_patrol()?;
            let key = instance(&lua, "return { Name = 'n', Description = 'd' }")?;
            lua.load(format!("Patrol.{} = nil", which.name())).exec()?;
            assert!(!validate_mission(&lua, "Patrol", &key, 0), "{which:?}");
            let err = bind_mission(&lua, "Patrol", &key, 0).unwrap_err();
            assert!(matches!(err, MissionError::MissingFunction { function, .. } if function == which.name()));
        }
        Ok(())
    }

    #[test]
    fn missing_type_or_table_fails_validation() -> anyhow::Result<()> {
        let lua = lua_with_patrol()?;
        let key = instance(&lua, "return { Name = 'n', Description = 'd' }")?;
        assert!(!validate_mission(&lua, "Smuggling", &key, 0));
        lua.load("NotATable = 5").exec()?;
        assert!(!validate_mission(&lua, "NotATable", &key, 0));

        let not_table = instance(&lua, "return 'cargo'")?;
        assert!(!validate_mission(&lua, "Patrol", &not_table, 0));
        Ok(())
    }

    #[test]
    fn required_fields_must_be_present() -> anyhow::Result<()> {
        let lua = lua_with_patrol()?;
        let no_name = instance(&lua, "return { Description = 'd' }")?;
        let no_description = instance(&lua, "return { Name = 'n' }")?;
        assert!(!validate_mission(&lua, "Patrol", &no_name, 0));
        assert!(!validate_mission(&lua, "Patrol", &no_description, 0));
        let err = bind_mission(&lua, "Patrol", &no_description, 0).unwrap_err();
        assert!(matches!(err, MissionError::MissingField { field: "Description", .. }));
        Ok(())
    }

    #[test]
    fn version_is_checked_only_when_expected() -> anyhow::Result<()> {
        let lua = lua_with_patrol()?;
        let key = instance(&lua, "return { Name = 'n', Description = 'd' }")?;
        assert!(!validate_mission(&lua, "Patrol", &key, 2));
        assert!(validate_mission(&lua, "Patrol", &key, 0));

        lua.load("Patrol.Version = 'three'").exec()?;
        assert!(validate_mission(&lua, "Patrol", &key, 0));
        let err = bind_mission(&lua, "Patrol", &key, 3).unwrap_err();
        assert!(matches!(err, MissionError::CorruptVersion { .. }));
        Ok(())
    }

    #[test]
    fn validation_never_runs_lifecycle_functions() -> anyhow::Result<()> {
        let lua = lua_with_patrol()?;
        let key = instance(&lua, "return Patrol.Create()")?;
        lua.load(
            r#"
            lifecycle_calls = 0
            for _, name in ipairs({ "Create", "Accept", "Reject", "Update", "Land", "Success", "Failure" }) do
                Patrol[name] = function() lifecycle_calls = lifecycle_calls + 1 end
            end
            "#,
        )
        .exec()?;

        assert!(validate_mission(&lua, "Patrol", &key, 3));
        assert!(!validate_mission(&lua, "Patrol", &key, 9));
        let binding = bind_mission(&lua, "Patrol", &key, 0)?;
        binding.release(&lua);
        let calls: i64 = lua.globals().get("lifecycle_calls")?;
        assert_eq!(calls, 0);
        Ok(())
    }

    #[test]
    fn version_and_metadata_are_read_live() -> anyhow::Result<()> {
        let lua = lua_with_patrol()?;
        let binding = MissionType::resolve(&lua, "Patrol")?;
        assert_eq!(binding.version(&lua)?, 3);
        lua.load("Patrol.Version = 4").exec()?;
        assert_eq!(binding.version(&lua)?, 4);
        let metadata = binding.metadata(&lua)?;
        assert_eq!(metadata.uid, Some(7));
        assert_eq!(metadata.author.as_deref(), Some("Matt"));
        assert_eq!(metadata.difficulty.as_deref(), Some("EASY"));
        binding.release(&lua);
        Ok(())
    }
}
