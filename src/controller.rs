//! Drag and inertia rotation of the display group.
//!
//! Dragging sets a yaw spin and tilts the group. Once released the spin
//! decays towards a slow cruise speed instead of stopping, and the tilt
//! springs back to level. The shown orientation always trails its target,
//! which smooths out jumpy pointer input.

use crate::{
    config::ControllerConfig,
    data_structures::scene_graph::{DisplayGroup, Node},
};

/// An angle that eases towards its target.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Axis {
    pub current: f32,
    pub target: f32,
}

impl Axis {
    fn ease(&mut self, factor: f32) {
        self.current += (self.target - self.current) * factor;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct DragSession {
    last_x: f32,
    last_y: f32,
}

/// Below this a returning tilt counts as level.
const LEVEL_EPSILON: f32 = 1e-6;

pub struct RotationController {
    group: DisplayGroup,
    yaw: Axis,
    pitch: Axis,
    velocity: f32,
    drag: Option<DragSession>,
    tuning: ControllerConfig,
}

impl RotationController {
    pub fn new(tuning: ControllerConfig) -> Self {
        Self {
            group: DisplayGroup::new(),
            yaw: Axis::default(),
            pitch: Axis::default(),
            velocity: tuning.initial_velocity,
            drag: None,
            tuning,
        }
    }

    pub fn begin_drag(&mut self, x: f32, y: f32) {
        self.drag = Some(DragSession {
            last_x: x,
            last_y: y,
        });
    }

    /// Ignored unless a drag is active.
    pub fn continue_drag(&mut self, x: f32, y: f32) {
        let Some(drag) = &mut self.drag else {
            return;
        };
        let dx = x - drag.last_x;
        let dy = y - drag.last_y;
        drag.last_x = x;
        drag.last_y = y;

        let spin = dx * self.tuning.horizontal_gain;
        self.velocity = spin;
        self.yaw.target += spin;
        // Tuning built in code skips validation; clamp would panic on a bad limit.
        let limit = self.tuning.max_tilt.abs();
        self.pitch.target = (self.pitch.target + dy * self.tuning.vertical_gain)
            .max(-limit)
            .min(limit);
    }

    /// Velocity and targets carry over into the idle phase.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Steps the simulation by one frame and applies the result to the group.
    pub fn advance(&mut self) {
        if self.drag.is_none() {
            self.apply_friction();
            self.yaw.target += self.velocity;
            self.pitch.target *= 1.0 - self.tuning.return_speed;
            if self.pitch.target.abs() < LEVEL_EPSILON {
                self.pitch.target = 0.0;
            }
        }

        self.yaw.ease(self.tuning.smoothing);
        self.pitch.ease(self.tuning.smoothing);
        self.group.set_rotation(self.pitch.current, self.yaw.current);
    }

    /// Fast spins slow down to the cruise speed and keep turning; slow
    /// spins die out.
    fn apply_friction(&mut self) {
        let cruise = self.tuning.cruise_speed;
        if self.velocity.abs() > cruise {
            self.velocity *= self.tuning.friction;
            if self.velocity.abs() <= cruise {
                self.velocity = cruise.copysign(self.velocity);
            }
        } else {
            self.velocity *= self.tuning.friction;
            if self.velocity.abs() < self.tuning.stop_speed {
                self.velocity = 0.0;
            }
        }
    }

    /// Replaces whatever is shown with exactly these two models.
    pub fn set_displayed_models(&mut self, primary: Node, secondary: Node) {
        self.group.clear();
        self.group.add(primary);
        self.group.add(secondary);
    }

    /// `(pitch, yaw)` as currently shown.
    pub fn orientation(&self) -> (f32, f32) {
        (self.pitch.current, self.yaw.current)
    }

    pub fn yaw(&self) -> Axis {
        self.yaw
    }

    pub fn pitch(&self) -> Axis {
        self.pitch
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn group(&self) -> &DisplayGroup {
        &self.group
    }
}

impl Default for RotationController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}
