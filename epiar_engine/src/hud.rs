//! Heads-up display state. Drawing lives elsewhere; this module only keeps
//! what the HUD would show.

use std::collections::VecDeque;

use crate::arena::{Arena, ObjectId};

pub const MAX_STATUS_BARS: usize = 20;
const MAX_TITLE_CHARS: usize = 39;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub message: String,
    pub start: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadPosition {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl QuadPosition {
    /// Script-side quadrant number, counted clockwise from the upper left
    /// corner.
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(QuadPosition::UpperLeft),
            1 => Some(QuadPosition::UpperRight),
            2 => Some(QuadPosition::LowerRight),
            3 => Some(QuadPosition::LowerLeft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusBar {
    title: String,
    width: u32,
    position: QuadPosition,
    name: String,
    ratio: f32,
}

impl StatusBar {
    pub fn new(title: &str, width: u32, position: QuadPosition) -> Self {
        StatusBar {
            title: title.chars().take(MAX_TITLE_CHARS).collect(),
            width,
            position,
            name: String::new(),
            ratio: 0.0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn position(&self) -> QuadPosition {
        self.position
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.clamp(0.0, 1.0);
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("the HUD already shows {MAX_STATUS_BARS} status bars")]
pub struct StatusBarsFull;

#[derive(Debug)]
pub struct Hud {
    alerts: VecDeque<AlertMessage>,
    bars: Arena<StatusBar>,
    target: Option<u32>,
    radar_visibility: i64,
    alert_duration_ms: u64,
}

impl Hud {
    pub fn new(alert_duration_ms: u64) -> Self {
        Hud {
            alerts: VecDeque::new(),
            bars: Arena::new(),
            target: None,
            radar_visibility: 7000,
            alert_duration_ms,
        }
    }

    pub fn alert(&mut self, message: impl Into<String>, now: u64) {
        let message = message.into();
        log::info!("HUD alert: {message}");
        self.alerts.push_back(AlertMessage { message, start: now });
    }

    /// Drops alerts that have been on screen longer than the configured
    /// duration.
    pub fn update(&mut self, now: u64) {
        let duration = self.alert_duration_ms;
        self.alerts
            .retain(|alert| now.saturating_sub(alert.start) <= duration);
    }

    pub fn alerts(&self) -> impl Iterator<Item = &AlertMessage> {
        self.alerts.iter()
    }

    pub fn add_status(&mut self, bar: StatusBar) -> Result<ObjectId, StatusBarsFull> {
        if self.bars.len() >= MAX_STATUS_BARS {
            return Err(StatusBarsFull);
        }
        Ok(self.bars.insert(bar))
    }

    pub fn status(&self, id: ObjectId) -> Option<&StatusBar> {
        self.bars.get(id)
    }

    pub fn status_mut(&mut self, id: ObjectId) -> Option<&mut StatusBar> {
        self.bars.get_mut(id)
    }

    pub fn delete_status(&mut self, id: ObjectId) -> Option<StatusBar> {
        self.bars.remove(id)
    }

    pub fn status_count(&self) -> usize {
        self.bars.len()
    }

    pub fn set_target(&mut self, serial: u32) {
        self.target = Some(serial);
    }

    pub fn target(&self) -> Option<u32> {
        self.target
    }

    pub fn set_radar_visibility(&mut self, visibility: i64) {
        self.radar_visibility = visibility;
    }

    pub fn radar_visibility(&self) -> i64 {
        self.radar_visibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_expire_after_duration() {
        let mut hud = Hud::new(1_000);
        hud.alert("Incoming!", 0);
        hud.alert("Docking granted", 800);
        hud.update(1_500);
        let remaining: Vec<&str> = hud.alerts().map(|a| a.message.as_str()).collect();
        assert_eq!(remaining, vec!["Docking granted"]);
    }

    #[test]
    fn status_bars_are_capped() {
        let mut hud = Hud::new(1_000);
        for index in 0..MAX_STATUS_BARS {
            hud.add_status(StatusBar::new(&format!("bar {index}"), 100, QuadPosition::UpperLeft))
                .expect("room for bar");
        }
        assert_eq!(
            hud.add_status(StatusBar::new("extra", 100, QuadPosition::UpperLeft)),
            Err(StatusBarsFull)
        );
    }

    #[test]
    fn closed_bars_free_their_slot() {
        let mut hud = Hud::new(1_000);
        let id = hud
            .add_status(StatusBar::new("Shields", 100, QuadPosition::LowerLeft))
            .expect("bar");
        hud.status_mut(id).expect("bar").set_ratio(1.5);
        assert_eq!(hud.status(id).map(StatusBar::ratio), Some(1.0));
        hud.delete_status(id);
        assert!(hud.status(id).is_none());
        assert_eq!(hud.status_count(), 0);
    }

    #[test]
    fn titles_are_truncated() {
        let bar = StatusBar::new(&"x".repeat(60), 10, QuadPosition::UpperRight);
        assert_eq!(bar.title().len(), 39);
    }
}
