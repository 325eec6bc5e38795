//! World objects and the registry that owns them.
//!
//! Every live sprite sits in one arena slot. Scripts and the HUD only ever
//! hold [`ObjectId`]s, so deleting a sprite can never leave a dangling
//! reference behind: later lookups simply miss.

mod ship;

pub use ship::{FireStatus, Ship};

use std::ops::{Add, Sub};

use crate::arena::{Arena, ObjectId};

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Coordinate { x, y }
    }

    pub fn from_polar(degrees: f32, magnitude: f64) -> Self {
        let radians = (degrees as f64).to_radians();
        Coordinate {
            x: radians.cos() * magnitude,
            y: radians.sin() * magnitude,
        }
    }

    pub fn magnitude(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Heading of the vector in degrees, normalized to `[0, 360)`.
    pub fn angle(self) -> f32 {
        normalize_degrees(self.y.atan2(self.x).to_degrees() as f32)
    }

    pub fn scaled(self, factor: f64) -> Self {
        Coordinate {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coordinate {
    type Output = Coordinate;

    fn sub(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Builds a color from script integers, clamping each channel to 0..=255.
    pub fn clamped(r: i64, g: i64, b: i64) -> Self {
        let channel = |value: i64| value.clamp(0, 255) as u8;
        Color {
            r: channel(r),
            g: channel(g),
            b: channel(b),
        }
    }
}

pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Maps an angle onto `(-180, 180]`.
pub fn signed_degrees(degrees: f32) -> f32 {
    let wrapped = normalize_degrees(degrees);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// One-shot or looping animation placed in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub position: Coordinate,
    pub animation: String,
    pub looping: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub position: Coordinate,
    pub angle: f32,
    pub owner: u32,
    pub damage: u32,
    pub spawned_at: u64,
}

#[derive(Debug, Clone)]
pub enum Sprite {
    Ship(Ship),
    Effect(Effect),
    Projectile(Projectile),
}

impl Sprite {
    pub fn kind(&self) -> &'static str {
        match self {
            Sprite::Ship(_) => "ship",
            Sprite::Effect(_) => "effect",
            Sprite::Projectile(_) => "projectile",
        }
    }

    pub fn position(&self) -> Coordinate {
        match self {
            Sprite::Ship(ship) => ship.position(),
            Sprite::Effect(effect) => effect.position,
            Sprite::Projectile(projectile) => projectile.position,
        }
    }
}

#[derive(Debug)]
struct Entry {
    serial: u32,
    sprite: Sprite,
}

/// Owner of every sprite in the world.
#[derive(Debug)]
pub struct SpriteRegistry {
    sprites: Arena<Entry>,
    next_serial: u32,
}

impl Default for SpriteRegistry {
    fn default() -> Self {
        SpriteRegistry {
            sprites: Arena::new(),
            next_serial: 1,
        }
    }
}

impl SpriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sprite: Sprite) -> ObjectId {
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        self.sprites.insert(Entry { serial, sprite })
    }

    /// Removes and frees the sprite immediately.
    pub fn delete(&mut self, id: ObjectId) -> Option<Sprite> {
        self.sprites.remove(id).map(|entry| entry.sprite)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Sprite> {
        self.sprites.get(id).map(|entry| &entry.sprite)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.sprites.contains(id)
    }

    /// Public sprite number shown to scripts; never reused.
    pub fn serial(&self, id: ObjectId) -> Option<u32> {
        self.sprites.get(id).map(|entry| entry.serial)
    }

    pub fn find_serial(&self, serial: u32) -> Option<ObjectId> {
        self.sprites
            .iter()
            .find_map(|(id, entry)| (entry.serial == serial).then_some(id))
    }

    pub fn ship(&self, id: ObjectId) -> Option<&Ship> {
        match self.get(id) {
            Some(Sprite::Ship(ship)) => Some(ship),
            _ => None,
        }
    }

    pub fn ship_mut(&mut self, id: ObjectId) -> Option<&mut Ship> {
        match self.sprites.get_mut(id) {
            Some(Entry {
                sprite: Sprite::Ship(ship),
                ..
            }) => Some(ship),
            _ => None,
        }
    }

    pub fn ship_ids(&self) -> Vec<ObjectId> {
        self.sprites
            .iter()
            .filter(|(_, entry)| matches!(entry.sprite, Sprite::Ship(_)))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn count_of(&self, kind: &str) -> usize {
        self.sprites
            .iter()
            .filter(|(_, entry)| entry.sprite.kind() == kind)
            .count()
    }

    /// Deletes projectiles spawned more than `lifetime_ms` before `now`.
    pub fn sweep_projectiles(&mut self, now: u64, lifetime_ms: u64) -> usize {
        let expired: Vec<ObjectId> = self
            .sprites
            .iter()
            .filter_map(|(id, entry)| match &entry.sprite {
                Sprite::Projectile(p) if now.saturating_sub(p.spawned_at) > lifetime_ms => Some(id),
                _ => None,
            })
            .collect();
        for id in &expired {
            self.sprites.remove(*id);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_survive_slot_reuse() {
        let mut registry = SpriteRegistry::new();
        let first = registry.add(Sprite::Ship(Ship::new(Coordinate::default())));
        assert_eq!(registry.serial(first), Some(1));
        registry.delete(first);
        let second = registry.add(Sprite::Ship(Ship::new(Coordinate::default())));
        assert_eq!(registry.serial(second), Some(2));
        assert_eq!(registry.find_serial(2), Some(second));
        assert!(registry.ship(first).is_none());
    }

    #[test]
    fn ship_lookup_ignores_other_sprites() {
        let mut registry = SpriteRegistry::new();
        let effect = registry.add(Sprite::Effect(Effect {
            position: Coordinate::new(1.0, 2.0),
            animation: "boom.ani".to_string(),
            looping: false,
        }));
        assert!(registry.ship(effect).is_none());
        assert_eq!(registry.count_of("effect"), 1);
        assert!(registry.ship_ids().is_empty());
    }

    #[test]
    fn old_projectiles_are_swept() {
        let mut registry = SpriteRegistry::new();
        for spawned_at in [0, 900] {
            registry.add(Sprite::Projectile(Projectile {
                position: Coordinate::default(),
                angle: 0.0,
                owner: 1,
                damage: 1,
                spawned_at,
            }));
        }
        assert_eq!(registry.sweep_projectiles(1_000, 500), 1);
        assert_eq!(registry.count_of("projectile"), 1);
    }

    #[test]
    fn angles_normalize_into_range() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(720.0), 0.0);
        assert_eq!(signed_degrees(270.0), -90.0);
        assert_eq!(signed_degrees(180.0), 180.0);
        assert!((Coordinate::new(0.0, -1.0).angle() - 270.0).abs() < 1e-4);
    }
}
