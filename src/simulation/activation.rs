//! Proximity-based activation of an airport
//!
//! The viewer's distance from the tower is only checked every `ACTIVE_POLL`
//! frames, and the on/off thresholds sit either side of `ACTIVE_DISTANCE` so
//! that hovering at the boundary doesn't flap.

use super::types::{ACTIVE_DISTANCE, ACTIVE_HYSTERESIS, ACTIVE_POLL, RESET_TIME};

/// Should an airport in the given state be active at this viewer distance?
pub fn should_be_active(active: bool, distance: f32) -> bool {
    if active {
        distance <= ACTIVE_DISTANCE + ACTIVE_HYSTERESIS
    } else {
        distance < ACTIVE_DISTANCE - ACTIVE_HYSTERESIS
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Start simulating. `resume` is set when the airport was last
    /// deactivated within `RESET_TIME` and holds how long it was inactive.
    Activate { resume: Option<f32> },
    Deactivate,
}

#[derive(Debug, Clone, Default)]
pub struct ActivationManager {
    active: bool,
    frames: u32,
    deactivated_at: Option<f32>,
}

impl ActivationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per frame. `distance` is only evaluated on poll frames.
    pub fn poll(&mut self, now: f32, distance: impl FnOnce() -> f32) -> Option<Transition> {
        let due = self.frames == 0;
        self.frames = (self.frames + 1) % ACTIVE_POLL;
        if !due {
            return None;
        }

        let wanted = should_be_active(self.active, distance());
        if wanted == self.active {
            return None;
        }
        self.active = wanted;
        if wanted {
            let resume = self
                .deactivated_at
                .take()
                .map(|at| now - at)
                .filter(|inactive| *inactive <= RESET_TIME);
            Some(Transition::Activate { resume })
        } else {
            self.deactivated_at = Some(now);
            Some(Transition::Deactivate)
        }
    }

    /// Forget everything, as when the config is cleared
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
