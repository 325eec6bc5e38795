//! `Epiar.Ship` and the methods reachable as `ship:Method(...)`.

use mlua::{IntoLuaMulti, Lua, MultiValue, Result as LuaResult, Table, Value, Variadic};

use super::context::EngineContextHandle;
use super::dispatch::{Arity, BridgeError, CallArgs, ScriptOp};
use super::marshal::{create_handle, ScriptHandle, ShipHandle, SHIP_METHODS_KEY};
use crate::arena::ObjectId;
use crate::world::{Color, Coordinate, Ship};

pub(super) type Handler =
    for<'lua> fn(&'lua Lua, &EngineContextHandle, &CallArgs<'lua>) -> LuaResult<MultiValue<'lua>>;

static NEW: ScriptOp = ScriptOp::new("new", 4, "x, y, model, script");

static ACCELERATE: ScriptOp = ScriptOp::new("Accelerate", 1, "ship");
static ROTATE: ScriptOp = ScriptOp::new("Rotate", 2, "ship, angle");
static SET_RADAR_COLOR: ScriptOp = ScriptOp::new("SetRadarColor", 4, "ship, red, green, blue");
static FIRE: ScriptOp = ScriptOp::new("Fire", 1, "ship");
static DAMAGE: ScriptOp = ScriptOp::new("Damage", 2, "ship, damage");
static EXPLODE: ScriptOp = ScriptOp::new("Explode", 1, "ship");
static CHANGE_WEAPON: ScriptOp = ScriptOp::new("ChangeWeapon", 1, "ship");
static ADD_WEAPON: ScriptOp = ScriptOp::new("AddWeapon", 2, "ship, weaponName");
static ADD_AMMO: ScriptOp = ScriptOp::new("AddAmmo", 3, "ship, weaponName, qty");
static SET_MODEL: ScriptOp = ScriptOp::new("SetModel", 2, "ship, modelname");
static GET_ID: ScriptOp = ScriptOp::new("GetID", 1, "self");
static GET_ANGLE: ScriptOp = ScriptOp::new("GetAngle", 1, "self");
static GET_POSITION: ScriptOp = ScriptOp::new("GetPosition", 1, "self");
static GET_MOMENTUM_ANGLE: ScriptOp = ScriptOp::new("GetMomentumAngle", 1, "self");
static GET_MOMENTUM_SPEED: ScriptOp = ScriptOp::new("GetMomentumSpeed", 1, "self");
static DIRECTION_TOWARDS: ScriptOp = ScriptOp {
    name: "directionTowards",
    arity: Arity::OneOf(&[2, 3]),
    params: "self, angle | self, x, y",
};
static GET_CURRENT_WEAPON: ScriptOp = ScriptOp::new("GetCurrentWeapon", 1, "self");
static GET_CURRENT_AMMO: ScriptOp = ScriptOp::new("GetCurrentAmmo", 1, "self");
static GET_MODEL_NAME: ScriptOp = ScriptOp::new("GetModelName", 1, "self");
static GET_HULL: ScriptOp = ScriptOp::new("GetHull", 1, "self");
static GET_WEAPONS: ScriptOp = ScriptOp::new("GetWeapons", 1, "self");

static METHODS: &[(&ScriptOp, Handler)] = &[
    (&ACCELERATE, accelerate),
    (&ROTATE, rotate),
    (&SET_RADAR_COLOR, set_radar_color),
    (&FIRE, fire),
    (&DAMAGE, damage),
    (&EXPLODE, explode),
    (&CHANGE_WEAPON, change_weapon),
    (&ADD_WEAPON, add_weapon),
    (&ADD_AMMO, add_ammo),
    (&SET_MODEL, set_model),
    (&GET_ID, get_id),
    (&GET_ANGLE, get_angle),
    (&GET_POSITION, get_position),
    (&GET_MOMENTUM_ANGLE, get_momentum_angle),
    (&GET_MOMENTUM_SPEED, get_momentum_speed),
    (&DIRECTION_TOWARDS, direction_towards),
    (&GET_CURRENT_WEAPON, get_current_weapon),
    (&GET_CURRENT_AMMO, get_current_ammo),
    (&GET_MODEL_NAME, get_model_name),
    (&GET_HULL, get_hull),
    (&GET_WEAPONS, get_weapons),
];

/// Wraps `handler` so the argument list is checked against `op` before the
/// handler sees it.
pub(super) fn bind_op<'lua>(
    lua: &'lua Lua,
    table: &Table<'lua>,
    context: &EngineContextHandle,
    op: &'static ScriptOp,
    handler: Handler,
) -> LuaResult<()> {
    let context = context.clone();
    let function = lua.create_function(move |lua, args: Variadic<Value>| {
        let args = CallArgs::check(op, args)?;
        handler(lua, &context, &args)
    })?;
    table.set(op.name, function)
}

/// Builds the `Epiar.Ship` namespace and registers the method table that
/// ship handles index into.
pub fn install<'lua>(lua: &'lua Lua, context: &EngineContextHandle) -> LuaResult<Table<'lua>> {
    let methods = lua.create_table()?;
    let namespace = lua.create_table()?;
    for &(op, handler) in METHODS {
        bind_op(lua, &methods, context, op, handler)?;
        bind_op(lua, &namespace, context, op, handler)?;
    }
    bind_op(lua, &namespace, context, &NEW, new_ship)?;
    lua.set_named_registry_value(SHIP_METHODS_KEY, methods)?;
    Ok(namespace)
}

fn nothing(lua: &Lua) -> LuaResult<MultiValue<'_>> {
    ().into_lua_multi(lua)
}

fn read_ship<R>(
    context: &EngineContextHandle,
    args: &CallArgs<'_>,
    id: ObjectId,
    read: impl FnOnce(&Ship) -> R,
) -> Result<R, BridgeError> {
    let ctx = context.borrow();
    let ship = ctx
        .sprites()
        .ship(id)
        .ok_or_else(|| args.stale(1, ShipHandle::KIND))?;
    Ok(read(ship))
}

fn write_ship<R>(
    context: &EngineContextHandle,
    args: &CallArgs<'_>,
    id: ObjectId,
    write: impl FnOnce(&mut Ship) -> R,
) -> Result<R, BridgeError> {
    let mut ctx = context.borrow_mut();
    let ship = ctx
        .sprites_mut()
        .ship_mut(id)
        .ok_or_else(|| args.stale(1, ShipHandle::KIND))?;
    Ok(write(ship))
}

fn new_ship<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let x = args.number(1)?;
    let y = args.number(2)?;
    let model = args.string(3)?;
    let script = args.string(4)?;
    let id = context
        .borrow_mut()
        .spawn_ship(Coordinate::new(x, y), &model, &script);
    create_handle::<ShipHandle>(lua, id)?.into_lua_multi(lua)
}

fn accelerate<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    write_ship(context, args, id, Ship::accelerate)?;
    nothing(lua)
}

fn rotate<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let degrees = args.number(2)? as f32;
    write_ship(context, args, id, |ship| ship.rotate(degrees))?;
    nothing(lua)
}

fn set_radar_color<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let color = Color::clamped(args.integer(2)?, args.integer(3)?, args.integer(4)?);
    write_ship(context, args, id, |ship| ship.set_radar_color(color))?;
    nothing(lua)
}

fn fire<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let status = context
        .borrow_mut()
        .fire_ship(id)
        .ok_or_else(|| args.stale(1, ShipHandle::KIND))?;
    status.code().into_lua_multi(lua)
}

fn damage<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let amount = args.integer(2)?.clamp(0, i64::from(u32::MAX)) as u32;
    write_ship(context, args, id, |ship| ship.apply_damage(amount))?;
    nothing(lua)
}

fn explode<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    context
        .borrow_mut()
        .explode_ship(id)
        .ok_or_else(|| args.stale(1, ShipHandle::KIND))?;
    nothing(lua)
}

fn change_weapon<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    write_ship(context, args, id, Ship::change_weapon)?;
    nothing(lua)
}

fn add_weapon<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let weapon = args.string(2)?;
    context
        .borrow_mut()
        .add_ship_weapon(id, &weapon)
        .ok_or_else(|| args.stale(1, ShipHandle::KIND))?;
    nothing(lua)
}

fn add_ammo<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let weapon = args.string(2)?;
    let quantity = args.integer(3)?.clamp(0, i64::from(u32::MAX)) as u32;
    let added = write_ship(context, args, id, |ship| ship.add_ammo(&weapon, quantity))?;
    if !added {
        log::warn!("AddAmmo: ship carries no weapon named '{weapon}'");
    }
    nothing(lua)
}

fn set_model<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let model = args.string(2)?;
    context
        .borrow_mut()
        .set_ship_model(id, &model)
        .ok_or_else(|| args.stale(1, ShipHandle::KIND))?;
    nothing(lua)
}

fn get_id<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let serial = context
        .borrow()
        .sprites()
        .serial(id)
        .ok_or_else(|| args.stale(1, ShipHandle::KIND))?;
    i64::from(serial).into_lua_multi(lua)
}

fn get_angle<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let angle = read_ship(context, args, id, Ship::angle)?;
    f64::from(angle).into_lua_multi(lua)
}

fn get_position<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let position = read_ship(context, args, id, Ship::position)?;
    (position.x, position.y).into_lua_multi(lua)
}

fn get_momentum_angle<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let angle = read_ship(context, args, id, |ship| ship.momentum().angle())?;
    f64::from(angle).into_lua_multi(lua)
}

fn get_momentum_speed<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let speed = read_ship(context, args, id, |ship| ship.momentum().magnitude())?;
    speed.into_lua_multi(lua)
}

fn direction_towards<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let direction = if args.len() == 2 {
        let angle = args.number(2)? as f32;
        read_ship(context, args, id, |ship| ship.direction_towards_angle(angle))?
    } else {
        let target = Coordinate::new(args.number(2)?, args.number(3)?);
        read_ship(context, args, id, |ship| ship.direction_towards_point(target))?
    };
    f64::from(direction).into_lua_multi(lua)
}

fn get_current_weapon<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let name = read_ship(context, args, id, |ship| {
        ship.current_weapon().map(|weapon| weapon.name.clone())
    })?;
    name.into_lua_multi(lua)
}

fn get_current_ammo<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let ammo = read_ship(context, args, id, Ship::current_ammo)?;
    i64::from(ammo).into_lua_multi(lua)
}

fn get_model_name<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let name = read_ship(context, args, id, |ship| ship.model_name().to_string())?;
    name.into_lua_multi(lua)
}

fn get_hull<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let hull = read_ship(context, args, id, Ship::hull_integrity)?;
    f64::from(hull).into_lua_multi(lua)
}

fn get_weapons<'lua>(
    lua: &'lua Lua,
    context: &EngineContextHandle,
    args: &CallArgs<'lua>,
) -> LuaResult<MultiValue<'lua>> {
    let id = args.ship(1)?;
    let rack = read_ship(context, args, id, Ship::weapons_and_ammo)?;
    let table = lua.create_table()?;
    for (name, ammo) in rack {
        table.set(name, i64::from(ammo))?;
    }
    table.into_lua_multi(lua)
}
