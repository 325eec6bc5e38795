//! Argument checking shared by every native function exposed to scripts.
//!
//! An operation declares its name, arity and parameter list once. The whole
//! argument list is checked and converted before the operation body runs, so
//! a rejected call never touches world state.

use mlua::{Error as LuaError, Value, Variadic};
use thiserror::Error;

use super::marshal::{check_handle, describe_type, ScriptHandle, ShipHandle, StatusBarHandle};
use crate::arena::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    OneOf(&'static [usize]),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(expected) => expected == count,
            Arity::OneOf(options) => options.contains(&count),
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exactly(expected) => write!(f, "{expected}"),
            Arity::OneOf(options) => {
                let joined: Vec<String> = options.iter().map(|n| n.to_string()).collect();
                write!(f, "{}", joined.join(" or "))
            }
        }
    }
}

/// A script-callable native operation.
#[derive(Debug, Clone, Copy)]
pub struct ScriptOp {
    pub name: &'static str,
    pub arity: Arity,
    pub params: &'static str,
}

impl ScriptOp {
    pub const fn new(name: &'static str, arity: usize, params: &'static str) -> Self {
        ScriptOp {
            name,
            arity: Arity::Exactly(arity),
            params,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    #[error("{op}: got {actual} arguments, expected {expected} ({params})")]
    ArityMismatch {
        op: &'static str,
        expected: Arity,
        actual: usize,
        params: &'static str,
    },
    #[error("bad argument #{position} to '{op}' ({expected} expected, got {found})")]
    TypeMismatch {
        op: &'static str,
        position: usize,
        expected: &'static str,
        found: String,
    },
    #[error("bad argument #{position} to '{op}' ({kind} handle refers to an object that no longer exists)")]
    StaleHandle {
        op: &'static str,
        position: usize,
        kind: &'static str,
    },
    #[error("{op}: {reason}")]
    Rejected { op: &'static str, reason: String },
}

impl From<BridgeError> for LuaError {
    fn from(err: BridgeError) -> Self {
        LuaError::external(err)
    }
}

/// Formats a number as Lua's `tostring` does (`%.14g`).
pub(crate) fn lua_number_to_string(n: f64) -> String {
    if n.is_nan() {
        return if n.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if n.is_infinite() {
        return if n < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    const PRECISION: i32 = 14;
    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, n);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };
    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.abs()
        )
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        trim_fraction(&format!("{n:.decimals$}")).to_string()
    }
}

fn trim_fraction(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

/// Arguments of one call, already checked against the operation's arity.
/// Positions are 1-based, as scripts count them.
pub struct CallArgs<'lua> {
    op: &'static ScriptOp,
    values: Vec<Value<'lua>>,
}

impl<'lua> CallArgs<'lua> {
    pub fn check(op: &'static ScriptOp, args: Variadic<Value<'lua>>) -> Result<Self, BridgeError> {
        let values: Vec<Value<'lua>> = args.into_iter().collect();
        if !op.arity.accepts(values.len()) {
            return Err(BridgeError::ArityMismatch {
                op: op.name,
                expected: op.arity,
                actual: values.len(),
                params: op.params,
            });
        }
        Ok(CallArgs { op, values })
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, position: usize) -> &Value<'lua> {
        self.values
            .get(position.wrapping_sub(1))
            .unwrap_or(&Value::Nil)
    }

    pub fn mismatch(&self, position: usize, expected: &'static str) -> BridgeError {
        BridgeError::TypeMismatch {
            op: self.op.name,
            position,
            expected,
            found: describe_type(self.value(position)),
        }
    }

    /// Numbers and numeric strings, as the Lua C API coerces them.
    pub fn number(&self, position: usize) -> Result<f64, BridgeError> {
        match self.value(position) {
            Value::Integer(i) => Ok(*i as f64),
            Value::Number(n) => Ok(*n),
            Value::String(text) => text
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .ok_or_else(|| self.mismatch(position, "number")),
            _ => Err(self.mismatch(position, "number")),
        }
    }

    /// A number truncated towards zero.
    pub fn integer(&self, position: usize) -> Result<i64, BridgeError> {
        self.number(position).map(|n| n as i64)
    }

    /// Strings, with numbers converted the way Lua prints them.
    pub fn string(&self, position: usize) -> Result<String, BridgeError> {
        match self.value(position) {
            Value::String(text) => text
                .to_str()
                .map(str::to_string)
                .map_err(|_| self.mismatch(position, "string")),
            Value::Integer(i) => Ok(lua_number_to_string(*i as f64)),
            Value::Number(n) => Ok(lua_number_to_string(*n)),
            _ => Err(self.mismatch(position, "string")),
        }
    }

    pub fn ship(&self, position: usize) -> Result<ObjectId, BridgeError> {
        self.handle::<ShipHandle>(position)
    }

    pub fn status_bar(&self, position: usize) -> Result<ObjectId, BridgeError> {
        self.handle::<StatusBarHandle>(position)
    }

    fn handle<H: ScriptHandle>(&self, position: usize) -> Result<ObjectId, BridgeError> {
        check_handle::<H>(self.value(position), self.op.name, position)
    }

    pub fn stale(&self, position: usize, kind: &'static str) -> BridgeError {
        BridgeError::StaleHandle {
            op: self.op.name,
            position,
            kind,
        }
    }

    pub fn rejected(&self, reason: impl Into<String>) -> BridgeError {
        BridgeError::Rejected {
            op: self.op.name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    static ROTATE: ScriptOp = ScriptOp::new("Rotate", 2, "self, angle");
    static TOWARDS: ScriptOp = ScriptOp {
        name: "directionTowards",
        arity: Arity::OneOf(&[2, 3]),
        params: "self, angle | self, x, y",
    };

    #[test]
    fn arity_mismatch_reports_expected_and_actual() {
        let args = Variadic::from_iter([Value::Nil]);
        let err = CallArgs::check(&ROTATE, args).err().expect("arity error");
        assert_eq!(
            err.to_string(),
            "Rotate: got 1 arguments, expected 2 (self, angle)"
        );
    }

    #[test]
    fn one_of_arity_accepts_each_option() {
        assert!(TOWARDS.arity.accepts(2));
        assert!(TOWARDS.arity.accepts(3));
        assert!(!TOWARDS.arity.accepts(4));
        assert_eq!(TOWARDS.arity.to_string(), "2 or 3");
    }

    #[test]
    fn conversions_follow_lua_coercion() {
        let lua = Lua::new();
        let text = lua.create_string("12.5").expect("string");
        let args = CallArgs::check(
            &ROTATE,
            Variadic::from_iter([Value::String(text), Value::Integer(7)]),
        )
        .expect("arity ok");
        assert_eq!(args.number(1).expect("number"), 12.5);
        assert_eq!(args.integer(1).expect("integer"), 12);
        assert_eq!(args.string(2).expect("string"), "7");
    }

    #[test]
    fn numbers_become_strings_as_lua_prints_them() {
        assert_eq!(lua_number_to_string(1e20), "1e+20");
        assert_eq!(lua_number_to_string(1e15), "1e+15");
        assert_eq!(lua_number_to_string(123456789012345678.0), "1.2345678901235e+17");
        assert_eq!(lua_number_to_string(12.5), "12.5");
        assert_eq!(lua_number_to_string(7.0), "7");
        assert_eq!(lua_number_to_string(0.1), "0.1");
        assert_eq!(lua_number_to_string(1.0 / 3.0), "0.33333333333333");
        assert_eq!(lua_number_to_string(-0.0001), "-0.0001");
        assert_eq!(lua_number_to_string(0.00001), "1e-05");
        assert_eq!(lua_number_to_string(0.0), "0");

        let args = CallArgs::check(
            &ROTATE,
            Variadic::from_iter([Value::Number(1e20), Value::Integer(10_i64.pow(15))]),
        )
        .expect("arity ok");
        assert_eq!(args.string(1).expect("string"), "1e+20");
        assert_eq!(args.string(2).expect("string"), "1e+15");
    }

    #[test]
    fn type_mismatch_names_position_and_types() {
        let args = CallArgs::check(&ROTATE, Variadic::from_iter([Value::Nil, Value::Boolean(true)]))
            .expect("arity ok");
        let err = args.number(2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #2 to 'Rotate' (number expected, got boolean)"
        );
        let err = args.ship(1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'Rotate' (Ship expected, got nil)"
        );
    }
}
