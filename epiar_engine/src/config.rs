use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tunables read once at startup. Every field falls back to the stock value
/// when the file omits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target frame rate used to derive the per-frame tick budget.
    pub fps: u32,
    /// How long a HUD alert stays on screen.
    pub alert_duration_ms: u64,
    /// Animation spawned when a ship explodes.
    pub explosion_animation: String,
    /// Projectiles older than this are swept from the world.
    pub projectile_lifetime_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            fps: 50,
            alert_duration_ms: 12_000,
            explosion_animation: "Resources/Animations/explosion1.ani".to_string(),
            projectile_lifetime_ms: 2_000,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(EngineConfig::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config: {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse engine config: {}", path.display()))?;
        Ok(config.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if self.fps == 0 {
            log::warn!("engine config requested 0 fps; using {}", Self::default().fps);
            self.fps = Self::default().fps;
        }
        self
    }

    pub fn ticks_per_frame(&self) -> u64 {
        1000 / u64::from(self.fps.max(1))
    }
}
