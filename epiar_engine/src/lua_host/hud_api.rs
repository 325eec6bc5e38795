//! `Epiar.HUD`: alerts, status bars, target and radar range.

use mlua::{IntoLuaMulti, Lua, MultiValue, Result as LuaResult, Table, Value};

use super::context::EngineContextHandle;
use super::dispatch::{BridgeError, CallArgs, ScriptOp};
use super::marshal::{create_handle, ScriptHandle, StatusBarHandle};
use super::ship_api::{bind_op, Handler};
use crate::hud::{QuadPosition, StatusBar};

static SET_VISIBILITY: ScriptOp = ScriptOp::new("setVisibity", 1, "radius");
static NEW_ALERT: ScriptOp = ScriptOp::new("newAlert", 1, "message");
static NEW_STATUS: ScriptOp = ScriptOp::new("newStatus", 4, "title, width, position, value");
static SET_STATUS: ScriptOp = ScriptOp::new("setStatus", 2, "bar, value");
static CLOSE_STATUS: ScriptOp = ScriptOp::new("closeStatus", 1, "bar");
static GET_TARGET: ScriptOp = ScriptOp::new("getTarget", 0, "");
static SET_TARGET: ScriptOp = ScriptOp::new("setTarget", 1, "id");

static FUNCTIONS: &[(&ScriptOp, Handler)] = &[
    (&SET_VISIBILITY, set_visibility),
    (&NEW_ALERT, new_alert),
    (&NEW_STATUS, new_status),
    (&SET_STATUS, set_status),
    (&CLOSE_STATUS, close_status),
    (&GET_TARGET, get_target),
    (&SET_TARGET, set_target),
];

pub fn install<'lua>(lua: &'lua Lua, context: &EngineContextHandle) -> LuaResult<Table<'lua>> {
    let namespace = lua.create_table()?;
    for &(op, handler) in FUNCTIONS {
        bind_op(lua, &namespace, context, op, handler)?;
    }
    Ok(namespace)
}

/// What a status bar displays: text or a fill ratio.
enum StatusValue {
    Name(String),
    Ratio(f32),
}

impl StatusValue {
    fn from_arg(args: &CallArgs<'_>, position: usize) -> Result<Self, BridgeError> {
        match args.value(position) {
            Value::Integer(_) | Value::Number(_) => Ok(StatusValue::Ratio(args.number(position)? as f32)),
            Value::String(_) => Ok(StatusValue::Name(args.string(position)?)),
            _ => Err(args.mismatch(position, "string or number")),
        }
    }

    fn apply(self, bar: &mut StatusBar) {
        match self {
            StatusValue::Name(name) => bar.set_name(&name),
            StatusValue::Ratio(ratio) => bar.set_ratio(ratio),
        }
    }
}

fn set_visibility<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let radius = args.integer(1)?;
    context.borrow_mut().hud_mut().set_radar_visibility(radius);
    ().into_lua_multi(lua)
}

fn new_alert<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let message = args.string(1)?;
    let mut ctx = context.borrow_mut();
    let now = ctx.now();
    ctx.hud_mut().alert(message, now);
    ().into_lua_multi(lua)
}

fn new_status<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let title = args.string(1)?;
    let width = args.integer(2)?.clamp(0, i64::from(u32::MAX)) as u32;
    let quadrant = QuadPosition::from_index(args.integer(3)?)
        .ok_or_else(|| args.mismatch(3, "quadrant 0-3"))?;
    let value = StatusValue::from_arg(args, 4)?;

    let mut bar = StatusBar::new(&title, width, quadrant);
    value.apply(&mut bar);
    let id = context
        .borrow_mut()
        .hud_mut()
        .add_status(bar)
        .map_err(|full| args.rejected(full.to_string()))?;
    create_handle::<StatusBarHandle>(lua, id)?.into_lua_multi(lua)
}

fn set_status<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.status_bar(1)?;
    let value = StatusValue::from_arg(args, 2)?;
    let mut ctx = context.borrow_mut();
    let bar = ctx
        .hud_mut()
        .status_mut(id)
        .ok_or_else(|| args.stale(1, StatusBarHandle::KIND))?;
    value.apply(bar);
    ().into_lua_multi(lua)
}

fn close_status<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.status_bar(1)?;
    context
        .borrow_mut()
        .hud_mut()
        .delete_status(id)
        .ok_or_else(|| args.stale(1, StatusBarHandle::KIND))?;
    ().into_lua_multi(lua)
}

fn get_target<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    _args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let target = context.borrow().hud().target().map(i64::from).unwrap_or(-1);
    target.into_lua_multi(lua)
}

fn set_target<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let serial = args.integer(1)?;
    let serial = u32::try_from(serial)
        .map_err(|_| args.rejected(format!("{serial} is not a sprite id")))?;
    context.borrow_mut().hud_mut().set_target(serial);
    ().into_lua_multi(lua)
}
