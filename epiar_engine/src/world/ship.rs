use std::rc::Rc;

use super::{normalize_degrees, signed_degrees, Color, Coordinate};
use crate::catalog::{Model, Weapon};

/// Outcome of a fire attempt, exposed to scripts as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum FireStatus {
    Fired = 0,
    NoWeapon = 1,
    NoAmmo = 2,
    CoolingDown = 3,
}

impl FireStatus {
    pub fn code(self) -> i64 {
        self as i64
    }
}

const DEFAULT_HULL: u32 = 100;

#[derive(Debug, Clone)]
struct WeaponSlot {
    weapon: Rc<Weapon>,
    ammo: u32,
}

#[derive(Debug, Clone)]
pub struct Ship {
    position: Coordinate,
    angle: f32,
    momentum: Coordinate,
    model: Option<Rc<Model>>,
    script: Option<String>,
    radar_color: Color,
    weapons: Vec<WeaponSlot>,
    current_weapon: usize,
    damage: u32,
    last_fire_tick: Option<u64>,
}

impl Ship {
    pub fn new(position: Coordinate) -> Self {
        Ship {
            position,
            angle: 0.0,
            momentum: Coordinate::default(),
            model: None,
            script: None,
            radar_color: Color::WHITE,
            weapons: Vec::new(),
            current_weapon: 0,
            damage: 0,
            last_fire_tick: None,
        }
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn momentum(&self) -> Coordinate {
        self.momentum
    }

    pub fn model(&self) -> Option<&Rc<Model>> {
        self.model.as_ref()
    }

    pub fn set_model(&mut self, model: Option<Rc<Model>>) {
        self.model = model;
    }

    pub fn model_name(&self) -> &str {
        self.model.as_ref().map(|m| m.name.as_str()).unwrap_or("")
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn set_script(&mut self, script: impl Into<String>) {
        let script = script.into();
        self.script = (!script.is_empty()).then_some(script);
    }

    pub fn radar_color(&self) -> Color {
        self.radar_color
    }

    pub fn set_radar_color(&mut self, color: Color) {
        self.radar_color = color;
    }

    /// Pushes the ship along its heading, capped at the model's top speed.
    /// Ships without a model have no engine.
    pub fn accelerate(&mut self) {
        let Some(model) = self.model.as_ref() else {
            return;
        };
        let thrust = Coordinate::from_polar(self.angle, model.acceleration as f64);
        let mut momentum = self.momentum + thrust;
        let speed = momentum.magnitude();
        if speed > model.max_speed as f64 {
            momentum = momentum.scaled(model.max_speed as f64 / speed);
        }
        self.momentum = momentum;
    }

    /// Turns the ship by at most the model's rotation speed per call.
    /// Ships without a model turn freely.
    pub fn rotate(&mut self, degrees: f32) {
        let turn = match self.model.as_ref() {
            Some(model) => degrees.clamp(-model.rotation_speed, model.rotation_speed),
            None => degrees,
        };
        self.angle = normalize_degrees(self.angle + turn);
    }

    /// Shortest signed turn, in degrees, to face `angle`.
    pub fn direction_towards_angle(&self, angle: f32) -> f32 {
        signed_degrees(angle - self.angle)
    }

    pub fn direction_towards_point(&self, target: Coordinate) -> f32 {
        if target == self.position {
            return 0.0;
        }
        let heading = (target - self.position).angle();
        self.direction_towards_angle(heading)
    }

    pub fn apply_damage(&mut self, amount: u32) {
        self.damage = self.damage.saturating_add(amount);
    }

    /// Remaining hull as a fraction in `0.0..=1.0`.
    pub fn hull_integrity(&self) -> f32 {
        let hull = self
            .model
            .as_ref()
            .map(|m| m.hull_strength)
            .unwrap_or(DEFAULT_HULL)
            .max(1);
        let remaining = hull.saturating_sub(self.damage);
        remaining as f32 / hull as f32
    }

    /// Adds a weapon to the rack with no ammo. Returns false when the ship
    /// already carries it.
    pub fn add_weapon(&mut self, weapon: Rc<Weapon>) -> bool {
        if self.weapons.iter().any(|slot| slot.weapon.name == weapon.name) {
            return false;
        }
        self.weapons.push(WeaponSlot { weapon, ammo: 0 });
        true
    }

    pub fn add_ammo(&mut self, weapon_name: &str, quantity: u32) -> bool {
        match self.weapons.iter_mut().find(|slot| slot.weapon.name == weapon_name) {
            Some(slot) => {
                slot.ammo = slot.ammo.saturating_add(quantity);
                true
            }
            None => false,
        }
    }

    pub fn change_weapon(&mut self) {
        if !self.weapons.is_empty() {
            self.current_weapon = (self.current_weapon + 1) % self.weapons.len();
        }
    }

    pub fn current_weapon(&self) -> Option<&Weapon> {
        self.weapons.get(self.current_weapon).map(|slot| slot.weapon.as_ref())
    }

    pub fn current_ammo(&self) -> u32 {
        self.weapons
            .get(self.current_weapon)
            .map(|slot| slot.ammo)
            .unwrap_or(0)
    }

    /// Weapon names with the ammo held for each, in rack order.
    pub fn weapons_and_ammo(&self) -> Vec<(String, u32)> {
        self.weapons
            .iter()
            .map(|slot| (slot.weapon.name.clone(), slot.ammo))
            .collect()
    }

    /// Attempts to fire the current weapon at tick `now`. Ammo is only spent
    /// on `Fired`.
    pub fn fire(&mut self, now: u64) -> FireStatus {
        let last_fire_tick = self.last_fire_tick;
        let Some(slot) = self.weapons.get_mut(self.current_weapon) else {
            return FireStatus::NoWeapon;
        };
        if slot.ammo == 0 {
            return FireStatus::NoAmmo;
        }
        if let Some(last) = last_fire_tick {
            if now.saturating_sub(last) < slot.weapon.fire_delay_ms {
                return FireStatus::CoolingDown;
            }
        }
        slot.ammo -= 1;
        self.last_fire_tick = Some(now);
        FireStatus::Fired
    }
}
