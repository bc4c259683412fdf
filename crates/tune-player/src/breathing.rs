//! Cover "breathing" animation: a slow pulse on the now-playing panel.
//!
//! The pulse stops while the track is paused or loading, and is held briefly
//! while the list selection moves.

use std::time::{Duration, Instant};

use crate::cooldown::Debounce;

/// One full inhale/exhale.
const PERIOD: Duration = Duration::from_millis(4000);
const NAVIGATION_HOLD: Duration = Duration::from_millis(150);

#[derive(Debug)]
pub struct Breathing {
    enabled: bool,
    image_paused: bool,
    hold: Debounce,
    /// Position within the period, 0.0..1.0.
    phase: f64,
    last_tick: Option<Instant>,
}

impl Breathing {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            image_paused: true,
            hold: Debounce::new(NAVIGATION_HOLD),
            phase: 0.0,
            last_tick: None,
        }
    }

    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn set_image_paused(&mut self, paused: bool) {
        self.image_paused = paused;
    }

    /// Freeze the pulse until the selection has settled.
    pub fn hold(&mut self, now: Instant) {
        self.hold.arm(now);
    }

    fn is_running(&self) -> bool {
        self.enabled && !self.image_paused && !self.hold.is_armed()
    }

    pub fn tick(&mut self, now: Instant) {
        self.hold.fire_if_due(now);
        let elapsed = self
            .last_tick
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default();
        self.last_tick = Some(now);
        if self.is_running() {
            self.phase = (self.phase + elapsed.as_secs_f64() / PERIOD.as_secs_f64()).fract();
        }
    }

    /// Pulse strength in [0, 1], or `None` when animations are off.
    pub fn intensity(&self) -> Option<f64> {
        if !self.enabled {
            return None;
        }
        Some(0.5 - 0.5 * (self.phase * std::f64::consts::TAU).cos())
    }
}
