//! Conversion between Lua tables and save-file nodes.
//!
//! Each table entry becomes one child node named after its key. The child's
//! `kind` attribute records the Lua type of the value, and array-style keys
//! carry `key="integer"` so they come back as numbers rather than strings.

use epiar_saves::Node;
use mlua::{Lua, Table, Value};
use thiserror::Error;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("table nesting exceeds {MAX_DEPTH} levels at '{path}'")]
    TooDeep { path: String },
    #[error("entry '{key}' holds '{text}', which is not a number")]
    BadNumber { key: String, text: String },
    #[error("entry '{key}' holds '{text}', which is not a boolean")]
    BadBoolean { key: String, text: String },
    #[error("'{path}' holds bytes that are not valid UTF-8")]
    NotUtf8 { path: String },
    #[error("entry '{key}' has unknown kind '{kind}'")]
    UnknownKind { key: String, kind: String },
    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Key {
    Index(i64),
    Name(String),
}

impl Key {
    fn from_value(value: &Value<'_>, path: &str) -> Result<Option<Key>, ConvertError> {
        match value {
            Value::Integer(i) => Ok(Some(Key::Index(*i))),
            Value::Number(n) => Ok(whole_number(*n).map(Key::Index)),
            Value::String(text) => Ok(Some(Key::Name(utf8(text, path)?))),
            _ => Ok(None),
        }
    }

    fn node_name(&self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(name) => name.clone(),
        }
    }
}

/// Save files hold text, so strings that are not UTF-8 cannot be written
/// without changing them.
fn utf8(text: &mlua::String<'_>, path: &str) -> Result<String, ConvertError> {
    text.to_str()
        .map(str::to_string)
        .map_err(|_| ConvertError::NotUtf8 {
            path: path.to_string(),
        })
}

fn whole_number(n: f64) -> Option<i64> {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    (n.fract() == 0.0 && n.abs() <= EXACT).then_some(n as i64)
}

fn format_number(n: f64) -> String {
    match whole_number(n) {
        Some(i) => i.to_string(),
        None => n.to_string(),
    }
}

/// Serializes `table` into a node called `name`. Functions, userdata and
/// other values with no saved form are left out.
pub fn table_to_node(name: &str, table: &Table<'_>) -> Result<Node, ConvertError> {
    table_to_node_at(name, table, name, 0)
}

fn table_to_node_at(
    name: &str,
    table: &Table<'_>,
    path: &str,
    depth: usize,
) -> Result<Node, ConvertError> {
    if depth >= MAX_DEPTH {
        return Err(ConvertError::TooDeep {
            path: path.to_string(),
        });
    }

    let mut entries = Vec::new();
    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        match Key::from_value(&key, path)? {
            Some(key) => entries.push((key, value)),
            None => log::warn!("{path}: {} keys are not saved", describe_key(&key)),
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut node = Node::new(name);
    node.set_attribute("kind", "table");
    for (key, value) in entries {
        let child_name = key.node_name();
        let mut child = match value {
            Value::String(text) => {
                let text = utf8(&text, &format!("{path}.{child_name}"))?;
                let mut child = Node::with_text(&child_name, text);
                child.set_attribute("kind", "string");
                child
            }
            Value::Integer(i) => {
                let mut child = Node::with_text(&child_name, i.to_string());
                child.set_attribute("kind", "number");
                child
            }
            Value::Number(n) => {
                let mut child = Node::with_text(&child_name, format_number(n));
                child.set_attribute("kind", "number");
                child
            }
            Value::Boolean(b) => {
                let mut child = Node::with_text(&child_name, b.to_string());
                child.set_attribute("kind", "boolean");
                child
            }
            Value::Table(inner) => {
                let child_path = format!("{path}.{child_name}");
                table_to_node_at(&child_name, &inner, &child_path, depth + 1)?
            }
            other => {
                log::warn!("{path}.{child_name}: {} values are not saved", other.type_name());
                continue;
            }
        };
        if matches!(key, Key::Index(_)) {
            child.set_attribute("key", "integer");
        }
        node.push_child(child);
    }
    Ok(node)
}

fn describe_key(key: &Value<'_>) -> &'static str {
    match key {
        Value::Number(_) => "fractional number",
        other => other.type_name(),
    }
}

/// Rebuilds a Lua table from a node written by [`table_to_node`].
pub fn node_to_table<'lua>(lua: &'lua Lua, node: &Node) -> Result<Table<'lua>, ConvertError> {
    node_to_table_at(lua, node, 0)
}

fn node_to_table_at<'lua>(
    lua: &'lua Lua,
    node: &Node,
    depth: usize,
) -> Result<Table<'lua>, ConvertError> {
    if depth >= MAX_DEPTH {
        return Err(ConvertError::TooDeep {
            path: node.name.clone(),
        });
    }

    let table = lua.create_table()?;
    for child in &node.children {
        let key = match child.attribute("key") {
            Some("integer") => match child.name.parse::<i64>() {
                Ok(index) => Value::Integer(index),
                Err(_) => Value::String(lua.create_string(&child.name)?),
            },
            _ => Value::String(lua.create_string(&child.name)?),
        };
        let value = match child.attribute("kind").unwrap_or("string") {
            "string" => Value::String(lua.create_string(child.text())?),
            "number" => {
                let text = child.text().trim();
                let number = text.parse::<f64>().map_err(|_| ConvertError::BadNumber {
                    key: child.name.clone(),
                    text: text.to_string(),
                })?;
                match whole_number(number) {
                    Some(i) => Value::Integer(i),
                    None => Value::Number(number),
                }
            }
            "boolean" => match child.text().trim() {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                other => {
                    return Err(ConvertError::BadBoolean {
                        key: child.name.clone(),
                        text: other.to_string(),
                    })
                }
            },
            "table" => Value::Table(node_to_table_at(lua, child, depth + 1)?),
            other => {
                return Err(ConvertError::UnknownKind {
                    key: child.name.clone(),
                    kind: other.to_string(),
                })
            }
        };
        table.raw_set(key, value)?;
    }
    Ok(table)
}
