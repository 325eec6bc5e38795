use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::arena::ObjectId;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::hud::Hud;
use crate::timer::{TickSource, Timer};
use crate::world::{Coordinate, Effect, FireStatus, Projectile, Ship, Sprite, SpriteRegistry};

/// Shared handle to the engine state. Native functions installed into Lua
/// each keep a clone.
#[derive(Clone)]
pub struct EngineContextHandle {
    inner: Rc<RefCell<EngineContext>>,
}

impl EngineContextHandle {
    pub fn new(context: EngineContext) -> Self {
        Self {
            inner: Rc::new(RefCell::new(context)),
        }
    }

    pub fn borrow(&self) -> Ref<'_, EngineContext> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, EngineContext> {
        self.inner.borrow_mut()
    }

    pub fn log_event(&self, event: impl Into<String>) {
        self.inner.borrow_mut().log_event(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.inner.borrow().events.clone()
    }

    pub fn now(&self) -> u64 {
        self.inner.borrow().now()
    }
}

/// Everything scripts can reach: the world, the HUD and the lookup services
/// they depend on.
pub struct EngineContext {
    sprites: SpriteRegistry,
    hud: Hud,
    catalog: Catalog,
    timer: Timer,
    config: EngineConfig,
    events: Vec<String>,
}

impl EngineContext {
    pub fn new(config: EngineConfig, catalog: Catalog, clock: Box<dyn TickSource>) -> Self {
        let timer = Timer::new(clock, config.ticks_per_frame());
        EngineContext {
            sprites: SpriteRegistry::new(),
            hud: Hud::new(config.alert_duration_ms),
            catalog,
            timer,
            config,
            events: Vec::new(),
        }
    }

    pub fn log_event(&mut self, event: impl Into<String>) {
        let event = event.into();
        log::debug!("event: {event}");
        self.events.push(event);
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn now(&self) -> u64 {
        self.timer.ticks()
    }

    pub fn sprites(&self) -> &SpriteRegistry {
        &self.sprites
    }

    pub fn sprites_mut(&mut self) -> &mut SpriteRegistry {
        &mut self.sprites
    }

    pub fn hud(&self) -> &Hud {
        &self.hud
    }

    pub fn hud_mut(&mut self) -> &mut Hud {
        &mut self.hud
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Builds a ship, resolves its model and registers it with the world.
    /// An unknown model leaves the ship without one.
    pub fn spawn_ship(&mut self, position: Coordinate, model: &str, script: &str) -> ObjectId {
        let mut ship = Ship::new(position);
        ship.set_model(self.catalog.model(model));
        ship.set_script(script);
        let id = self.sprites.add(Sprite::Ship(ship));
        let serial = self.sprites.serial(id).unwrap_or_default();
        self.log_event(format!("ship.spawn {serial} {model}"));
        id
    }

    pub fn set_ship_model(&mut self, id: ObjectId, model: &str) -> Option<()> {
        let resolved = self.catalog.model(model);
        self.sprites.ship_mut(id)?.set_model(resolved);
        Some(())
    }

    /// Adds a catalog weapon to the ship. Unknown weapons are skipped.
    pub fn add_ship_weapon(&mut self, id: ObjectId, weapon: &str) -> Option<()> {
        let resolved = self.catalog.weapon(weapon);
        let ship = self.sprites.ship_mut(id)?;
        if let Some(resolved) = resolved {
            if !ship.add_weapon(resolved) {
                log::debug!("ship {id} already carries {weapon}");
            }
        }
        Some(())
    }

    /// Fires the ship's current weapon and, on success, puts the projectile
    /// into the world.
    pub fn fire_ship(&mut self, id: ObjectId) -> Option<FireStatus> {
        let now = self.now();
        let owner = self.sprites.serial(id)?;
        let ship = self.sprites.ship_mut(id)?;
        let status = ship.fire(now);
        if status != FireStatus::Fired {
            return Some(status);
        }
        let projectile = Projectile {
            position: ship.position(),
            angle: ship.angle(),
            owner,
            damage: ship.current_weapon().map(|w| w.damage).unwrap_or(0),
            spawned_at: now,
        };
        self.sprites.add(Sprite::Projectile(projectile));
        self.log_event(format!("ship.fire {owner}"));
        Some(status)
    }

    /// Replaces the ship with an explosion effect. The ship leaves the
    /// registry last, after everything that reads it.
    pub fn explode_ship(&mut self, id: ObjectId) -> Option<()> {
        let serial = self.sprites.serial(id)?;
        let ship = self.sprites.ship(id)?;
        let position = ship.position();
        log::info!("A {} Exploded!", ship.model_name());
        self.log_event(format!("ship.explode {serial}"));
        self.sprites.add(Sprite::Effect(Effect {
            position,
            animation: self.config.explosion_animation.clone(),
            looping: false,
        }));
        self.sprites.delete(id);
        Some(())
    }

    /// Advances the frame clock and ages transient world state.
    pub fn advance_frame(&mut self) -> u64 {
        self.timer.update();
        let now = self.now();
        let swept = self
            .sprites
            .sweep_projectiles(now, self.config.projectile_lifetime_ms);
        if swept > 0 {
            log::debug!("swept {swept} expired projectiles");
        }
        self.hud.update(now);
        now
    }

    /// Ships with a bound AI script, in registry order.
    pub fn scripted_ships(&self) -> Vec<(ObjectId, String)> {
        self.sprites
            .ship_ids()
            .into_iter()
            .filter_map(|id| {
                let script = self.sprites.ship(id)?.script()?;
                Some((id, script.to_string()))
            })
            .collect()
    }
}
