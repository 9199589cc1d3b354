//! [`SteeringWheel`] – exponential-smoothing animation of the wheel widget.
//!
//! Each command (and each animation frame, which targets the neutral pose)
//! moves the current rotation and tilt a fixed fraction toward the target.

use robodash_types::Command;

/// Fraction of the remaining distance covered per step.
const SMOOTHING: f64 = 0.2;
const TURN_TARGET_DEG: f64 = 3000.0;
const TILT_TARGET_DEG: f64 = 2000.0;
/// Below this magnitude the wheel counts as centred.
const SETTLED_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SteeringWheel {
    rotation: f64,
    tilt: f64,
}

impl SteeringWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step toward the pose of `command`.
    pub fn apply(&mut self, command: Command) {
        let (target_rotation, target_tilt) = match command {
            Command::Left => (-TURN_TARGET_DEG, 0.0),
            Command::Right => (TURN_TARGET_DEG, 0.0),
            Command::Forward => (0.0, TILT_TARGET_DEG),
            Command::Backward => (0.0, -TILT_TARGET_DEG),
            Command::Stop => (0.0, 0.0),
        };
        self.rotation += (target_rotation - self.rotation) * SMOOTHING;
        self.tilt += (target_tilt - self.tilt) * SMOOTHING;
    }

    /// One animation frame: drift back toward centre.
    ///
    /// Returns `false` once the wheel has settled and nothing moved.
    pub fn frame(&mut self) -> bool {
        if self.is_settled() {
            if self.rotation != 0.0 || self.tilt != 0.0 {
                self.rotation = 0.0;
                self.tilt = 0.0;
                return true;
            }
            return false;
        }
        self.apply(Command::Stop);
        true
    }

    pub fn is_settled(&self) -> bool {
        self.rotation.abs() < SETTLED_EPSILON && self.tilt.abs() < SETTLED_EPSILON
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn tilt(&self) -> f64 {
        self.tilt
    }

    /// CSS transform of the widget.
    pub fn transform(&self) -> String {
        format!("rotateX({:.2}deg) rotateZ({:.2}deg)", self.tilt, self.rotation)
    }
}
