//! Opaque handles handed to scripts in place of native objects.
//!
//! A handle is a small userdata carrying an [`ObjectId`]. It owns nothing:
//! the sprite registry (or the HUD, for status bars) decides when the object
//! goes away, and a handle that outlives its object simply stops resolving.

use mlua::{
    AnyUserData, Lua, MetaMethod, Result as LuaResult, Table, UserData, UserDataMethods, Value,
};

use super::dispatch::BridgeError;
use crate::arena::ObjectId;

/// Registry slot holding the table that `ship:Method(...)` resolves against.
pub(crate) const SHIP_METHODS_KEY: &str = "epiar.ship.methods";

pub trait ScriptHandle: UserData + 'static {
    /// Type name reported to scripts in error messages.
    const KIND: &'static str;

    fn from_id(id: ObjectId) -> Self;
    fn id(&self) -> ObjectId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipHandle(ObjectId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBarHandle(ObjectId);

impl ScriptHandle for ShipHandle {
    const KIND: &'static str = "Ship";

    fn from_id(id: ObjectId) -> Self {
        ShipHandle(id)
    }

    fn id(&self) -> ObjectId {
        self.0
    }
}

impl ScriptHandle for StatusBarHandle {
    const KIND: &'static str = "StatusBar";

    fn from_id(id: ObjectId) -> Self {
        StatusBarHandle(id)
    }

    fn id(&self) -> ObjectId {
        self.0
    }
}

fn add_identity_methods<'lua, H, M>(methods: &mut M)
where
    H: ScriptHandle,
    M: UserDataMethods<'lua, H>,
{
    methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
        Ok(format!("{}({})", H::KIND, this.id()))
    });
    methods.add_meta_method(MetaMethod::Eq, |_, this, other: AnyUserData| {
        Ok(other
            .borrow::<H>()
            .map(|other| other.id() == this.id())
            .unwrap_or(false))
    });
}

impl UserData for ShipHandle {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        add_identity_methods::<Self, M>(methods);
        methods.add_meta_function(
            MetaMethod::Index,
            |lua, (_this, key): (AnyUserData, Value)| {
                let table: Table = lua.named_registry_value(SHIP_METHODS_KEY)?;
                table.raw_get::<_, Value>(key)
            },
        );
    }
}

impl UserData for StatusBarHandle {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        add_identity_methods::<Self, M>(methods);
    }
}

pub fn create_handle<H: ScriptHandle>(lua: &Lua, id: ObjectId) -> LuaResult<AnyUserData<'_>> {
    lua.create_userdata(H::from_id(id))
}

/// Accepts `value` only if it is a handle of kind `H`. Liveness is the
/// caller's business; this only proves the type.
pub fn check_handle<H: ScriptHandle>(
    value: &Value<'_>,
    op: &'static str,
    position: usize,
) -> Result<ObjectId, BridgeError> {
    if let Value::UserData(data) = value {
        if let Ok(handle) = data.borrow::<H>() {
            return Ok(handle.id());
        }
    }
    Err(BridgeError::TypeMismatch {
        op,
        position,
        expected: H::KIND,
        found: describe_type(value),
    })
}

pub fn describe_type(value: &Value<'_>) -> String {
    match value {
        Value::Integer(_) | Value::Number(_) => "number".to_string(),
        Value::UserData(data) if data.is::<ShipHandle>() => ShipHandle::KIND.to_string(),
        Value::UserData(data) if data.is::<StatusBarHandle>() => StatusBarHandle::KIND.to_string(),
        other => other.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    fn ids() -> (ObjectId, ObjectId) {
        let mut arena = Arena::new();
        (arena.insert(()), arena.insert(()))
    }

    #[test]
    fn handles_round_trip_their_id() -> LuaResult<()> {
        let lua = Lua::new();
        let (first, _) = ids();
        let handle = create_handle::<ShipHandle>(&lua, first)?;
        let value = Value::UserData(handle);
        assert_eq!(check_handle::<ShipHandle>(&value, "GetID", 1), Ok(first));
        Ok(())
    }

    #[test]
    fn wrong_kind_is_a_type_mismatch() -> LuaResult<()> {
        let lua = Lua::new();
        let (first, _) = ids();
        let bar = Value::UserData(create_handle::<StatusBarHandle>(&lua, first)?);
        let err = check_handle::<ShipHandle>(&bar, "Rotate", 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'Rotate' (Ship expected, got StatusBar)"
        );
        let err = check_handle::<ShipHandle>(&Value::Integer(3), "Rotate", 1).unwrap_err();
        assert!(err.to_string().contains("got number"));
        Ok(())
    }

    #[test]
    fn equality_and_display_use_the_id() -> LuaResult<()> {
        let lua = Lua::new();
        let (first, second) = ids();
        lua.globals()
            .set("a", create_handle::<StatusBarHandle>(&lua, first)?)?;
        lua.globals()
            .set("b", create_handle::<StatusBarHandle>(&lua, first)?)?;
        lua.globals()
            .set("c", create_handle::<StatusBarHandle>(&lua, second)?)?;
        let (same, different): (bool, bool) = lua.load("return a == b, a == c").eval()?;
        assert!(same);
        assert!(!different);
        let text: String = lua.load("return tostring(a)").eval()?;
        assert_eq!(text, "StatusBar(0v0)");
        Ok(())
    }
}
