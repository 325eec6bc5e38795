mod context;
pub mod convert;
pub mod dispatch;
mod hud_api;
pub mod marshal;
mod ship_api;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mlua::{Function, Lua, LuaOptions, MultiValue, StdLib, Table, Value};

pub use context::{EngineContext, EngineContextHandle};
pub use convert::{node_to_table, table_to_node, ConvertError};
pub use dispatch::BridgeError;
pub use marshal::{create_handle, ShipHandle, StatusBarHandle};

pub fn new_lua() -> Result<Lua> {
    Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default())
        .context("failed to create Lua state")
}

/// Installs the `Epiar` namespace and the script-side helpers missions rely
/// on.
pub fn install_bindings(lua: &Lua, context: &EngineContextHandle) -> Result<()> {
    let epiar = lua.create_table()?;
    epiar.set("Ship", ship_api::install(lua, context)?)?;
    epiar.set("HUD", hud_api::install(lua, context)?)?;
    lua.globals().set("Epiar", epiar)?;

    let default_table = lua.create_function(|lua, (name, description): (String, String)| {
        let table = lua.create_table()?;
        table.set("Name", name)?;
        table.set("Description", description)?;
        Ok(table)
    })?;
    lua.globals().set("defaultMissionTable", default_table)?;
    Ok(())
}

pub fn load_script_file(lua: &Lua, path: &Path) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    let chunk_name = format!("@{}", path.display());
    lua.load(&source)
        .set_name(chunk_name.as_str())
        .eval::<MultiValue>()
        .with_context(|| format!("executing script {}", path.display()))?;
    log::debug!("loaded script {}", path.display());
    Ok(())
}

/// Runs every `.lua` file directly inside `dir`, in file-name order.
pub fn load_script_dir(lua: &Lua, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut scripts = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "lua") {
            scripts.push(path);
        }
    }
    scripts.sort();
    for script in &scripts {
        load_script_file(lua, script)?;
    }
    Ok(scripts)
}

/// Calls each scripted ship's AI function with the ship's handle. A broken
/// script is logged and the remaining ships still run.
pub fn run_ai_scripts(lua: &Lua, context: &EngineContextHandle) -> Result<usize> {
    let ships = context.borrow().scripted_ships();
    let globals = lua.globals();
    let mut ran = 0;
    for (id, script) in ships {
        // An earlier script may have exploded this ship.
        if !context.borrow().sprites().contains(id) {
            continue;
        }
        let function = match globals.get::<_, Value>(script.as_str())? {
            Value::Function(function) => function,
            _ => {
                log::debug!("ship {id}: no AI function named '{script}'");
                continue;
            }
        };
        let handle = create_handle::<ShipHandle>(lua, id)?;
        match function.call::<_, MultiValue>(handle) {
            Ok(_) => ran += 1,
            Err(err) => {
                log::error!("AI script '{script}' failed for ship {id}: {err}");
                context.log_event(format!("ai.error {script}"));
            }
        }
    }
    Ok(ran)
}

/// Looks up a global table by name; anything else reads as absent.
pub(crate) fn global_table<'lua>(lua: &'lua Lua, name: &str) -> mlua::Result<Option<Table<'lua>>> {
    match lua.globals().get::<_, Value>(name)? {
        Value::Table(table) => Ok(Some(table)),
        _ => Ok(None),
    }
}

pub(crate) fn table_function<'lua>(
    table: &Table<'lua>,
    name: &str,
) -> mlua::Result<Option<Function<'lua>>> {
    match table.get::<_, Value>(name)? {
        Value::Function(function) => Ok(Some(function)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::EngineConfig;
    use crate::timer::ManualClock;

    fn host() -> Result<(Lua, EngineContextHandle)> {
        let lua = new_lua()?;
        let context = EngineContextHandle::new(EngineContext::new(
            EngineConfig::default(),
            Catalog::new(),
            Box::new(ManualClock::new()),
        ));
        install_bindings(&lua, &context)?;
        Ok((lua, context))
    }

    #[test]
    fn default_mission_table_sets_required_fields() -> Result<()> {
        let (lua, _context) = host()?;
        let (name, description): (String, String) = lua
            .load(r#"local t = defaultMissionTable("Escort", "Guard the convoy") return t.Name, t.Description"#)
            .eval()?;
        assert_eq!(name, "Escort");
        assert_eq!(description, "Guard the convoy");
        Ok(())
    }

    #[test]
    fn ai_scripts_drive_their_ships() -> Result<()> {
        let (lua, context) = host()?;
        lua.load(
            r#"
            function spinner(ship) ship:Rotate(10) end
            function broken(ship) error("no thrusters") end
            Epiar.Ship.new(0, 0, "Unknown", "spinner")
            Epiar.Ship.new(5, 5, "Unknown", "broken")
            Epiar.Ship.new(9, 9, "Unknown", "")
            "#,
        )
        .exec()?;

        assert_eq!(run_ai_scripts(&lua, &context)?, 1);
        assert_eq!(run_ai_scripts(&lua, &context)?, 1);
        let ctx = context.borrow();
        let spinner = ctx.sprites().find_serial(1).expect("spinner");
        let angle = ctx.sprites().ship(spinner).expect("ship").angle();
        assert!((angle - 20.0).abs() < 1e-4);
        assert!(ctx.events().iter().any(|e| e == "ai.error broken"));
        Ok(())
    }

    #[test]
    fn script_directory_loads_in_name_order() -> Result<()> {
        let (lua, _context) = host()?;
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("b.lua"), "order = order .. 'b'")?;
        fs::write(dir.path().join("a.lua"), "order = 'a'")?;
        fs::write(dir.path().join("notes.txt"), "not lua")?;
        let loaded = load_script_dir(&lua, dir.path())?;
        assert_eq!(loaded.len(), 2);
        let order: String = lua.globals().get("order")?;
        assert_eq!(order, "ab");
        Ok(())
    }
}
