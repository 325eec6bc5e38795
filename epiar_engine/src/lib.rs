//! Headless Epiar game core: the mission lifecycle engine and the Lua
//! bridge that lets scripts drive ships and the HUD.

pub mod arena;
pub mod catalog;
pub mod config;
pub mod game;
pub mod hud;
pub mod lua_host;
pub mod mission;
pub mod timer;
pub mod world;
