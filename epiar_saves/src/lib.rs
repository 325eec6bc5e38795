//! Structured save-game records.
//!
//! Saves are trees of named nodes. A node carries optional text, a small set
//! of string attributes and ordered children, which is enough to describe a
//! mission record (`type`, `version`, `value`) and the script tables nested
//! inside it. Documents are persisted as JSON so both the engine and external
//! tools can read them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Document layout revision understood by this crate.
pub const SAVE_FORMAT_VERSION: u16 = 1;

/// One element of a save tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            ..Node::default()
        }
    }

    /// Leaf node holding a single text value.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            text: Some(text.into()),
            ..Node::default()
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn push_child(&mut self, child: Node) -> &mut Node {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn first_child_named(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Text content, or an empty string for nodes without text.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Parses the node text as a decimal integer.
    pub fn text_as_int(&self) -> Result<i64, SaveError> {
        let raw = self.text().trim();
        raw.parse().map_err(|_| SaveError::BadInteger {
            node: self.name.clone(),
            text: raw.to_string(),
        })
    }

    /// Looks up a required child, reporting the parent when it is missing.
    pub fn require_child(&self, name: &str) -> Result<&Node, SaveError> {
        self.first_child_named(name)
            .ok_or_else(|| SaveError::MissingChild {
                parent: self.name.clone(),
                child: name.to_string(),
            })
    }
}

/// A complete save file: a versioned envelope around one root node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDocument {
    pub format_version: u16,
    pub root: Node,
}

impl SaveDocument {
    pub fn new(root: Node) -> Self {
        SaveDocument {
            format_version: SAVE_FORMAT_VERSION,
            root,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SaveError> {
        let document: SaveDocument = serde_json::from_str(raw)?;
        if document.format_version != SAVE_FORMAT_VERSION {
            return Err(SaveError::UnsupportedVersion(document.format_version));
        }
        Ok(document)
    }

    pub fn to_json_string(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn read_from(path: &Path) -> Result<Self, SaveError> {
        let raw = fs::read_to_string(path).map_err(|source| SaveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), SaveError> {
        let json = self.to_json_string()?;
        fs::write(path, json).map_err(|source| SaveError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Error conditions raised while reading or writing save trees.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to access save file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("save file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save format version {0} is not supported (expected {SAVE_FORMAT_VERSION})")]
    UnsupportedVersion(u16),
    #[error("node '{parent}' has no '{child}' child")]
    MissingChild { parent: String, child: String },
    #[error("node '{node}' holds '{text}', which is not an integer")]
    BadInteger { node: String, text: String },
}
