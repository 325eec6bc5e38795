use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Hull and engine characteristics shared by every ship built from a model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
    #[serde(default = "default_acceleration")]
    pub acceleration: f32,
    #[serde(default = "default_rotation")]
    pub rotation_speed: f32,
    #[serde(default = "default_hull")]
    pub hull_strength: u32,
}

fn default_max_speed() -> f32 {
    10.0
}

fn default_acceleration() -> f32 {
    1.0
}

fn default_rotation() -> f32 {
    90.0
}

fn default_hull() -> u32 {
    100
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Weapon {
    pub name: String,
    /// Minimum ticks between two shots.
    #[serde(default)]
    pub fire_delay_ms: u64,
    #[serde(default)]
    pub damage: u32,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    models: Vec<Model>,
    #[serde(default)]
    weapons: Vec<Weapon>,
}

/// Read-only lookup of models and weapons by name. Unknown names are logged
/// and reported as `None`; callers carry on without the resource.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    models: BTreeMap<String, Rc<Model>>,
    weapons: BTreeMap<String, Rc<Weapon>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Catalog::new());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog: {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("failed to parse catalog: {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        let mut catalog = Catalog::new();
        for model in file.models {
            catalog.insert_model(model);
        }
        for weapon in file.weapons {
            catalog.insert_weapon(weapon);
        }
        Ok(catalog)
    }

    pub fn insert_model(&mut self, model: Model) {
        self.models.insert(model.name.clone(), Rc::new(model));
    }

    pub fn insert_weapon(&mut self, weapon: Weapon) {
        self.weapons.insert(weapon.name.clone(), Rc::new(weapon));
    }

    pub fn model(&self, name: &str) -> Option<Rc<Model>> {
        let found = self.models.get(name).cloned();
        if found.is_none() {
            log::warn!("no model named '{name}' in the catalog");
        }
        found
    }

    pub fn weapon(&self, name: &str) -> Option<Rc<Weapon>> {
        let found = self.weapons.get(name).cloned();
        if found.is_none() {
            log::warn!("no weapon named '{name}' in the catalog");
        }
        found
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn weapon_count(&self) -> usize {
        self.weapons.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_models_and_weapons_with_defaults() {
        let catalog = Catalog::from_json_str(
            r#"{
                "models": [{ "name": "Uber", "max_speed": 4.5 }],
                "weapons": [{ "name": "Laser", "fire_delay_ms": 250, "damage": 5 }]
            }"#,
        )
        .expect("catalog");
        let model = catalog.model("Uber").expect("model");
        assert!((model.max_speed - 4.5).abs() < f32::EPSILON);
        assert_eq!(model.hull_strength, 100);
        assert_eq!(catalog.weapon("Laser").expect("weapon").fire_delay_ms, 250);
    }

    #[test]
    fn unknown_names_resolve_to_none() {
        let catalog = Catalog::new();
        assert!(catalog.model("Ghost").is_none());
        assert!(catalog.weapon("Ghost").is_none());
    }
}
