use epiar_saves::Node;
use mlua::Lua;

use super::{Mission, MissionError};
use crate::lua_host::{node_to_table, table_to_node};

pub const RECORD_NODE: &str = "Mission";

impl Mission {
    /// Rebuilds a mission from a saved `Mission` node. A `version` child
    /// pins the mission type's version; without one the version is not
    /// checked.
    pub fn from_record(lua: &Lua, node: &Node) -> Result<Self, MissionError> {
        let mission_type = node.require_child("type")?.text().trim().to_string();
        let version = match node.first_child_named("version") {
            Some(version) => version.text_as_int()?,
            None => 0,
        };
        let table = node_to_table(lua, node.require_child("value")?)?;
        Mission::bind(lua, &mission_type, table, version)
    }

    /// Writes the mission type, its current version and the whole instance
    /// table.
    pub fn to_record(&self, lua: &Lua) -> Result<Node, MissionError> {
        let mut record = Node::new(RECORD_NODE);
        record.push_child(Node::with_text("type", self.mission_type()));
        record.push_child(Node::with_text("version", self.version(lua).to_string()));
        let table = self.instance_table(lua)?;
        record.push_child(table_to_node("value", &table)?);
        Ok(record)
    }
}
