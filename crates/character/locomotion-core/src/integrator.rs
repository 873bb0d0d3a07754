//! Movement integrator: velocity decay, acceleration, yaw and translation.
//!
//! Each call runs the same four steps in the same order regardless of which flags are
//! held: decelerate → accelerate → rotate → translate.

use std::f32::consts::PI;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::ControllerConfig;
use crate::input::InputState;

/// Position and orientation of the controlled object.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    /// Unit vector the character faces (+Z in model space).
    pub fn forward(&self) -> Vec3 {
        (self.rotation * Vec3::Z).normalize()
    }

    /// Unit vector to the character's side (+X in model space).
    pub fn sideways(&self) -> Vec3 {
        (self.rotation * Vec3::X).normalize()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MovementIntegrator {
    pub deceleration: Vec3,
    pub acceleration: Vec3,
    pub sprint_multiplier: f32,
    pub forward_impulse: f32,
}

impl Default for MovementIntegrator {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

impl MovementIntegrator {
    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self {
            deceleration: cfg.deceleration,
            acceleration: cfg.acceleration,
            sprint_multiplier: cfg.sprint_multiplier,
            forward_impulse: cfg.forward_impulse,
        }
    }

    /// Advance `velocity` and `pose` by `dt` seconds under `input`.
    pub fn update(&self, dt: f32, input: &InputState, velocity: &mut Vec3, pose: &mut Pose) {
        // 1) Frame-scaled decay, per axis.
        let frame_deceleration = *velocity * self.deceleration * dt;
        *velocity += frame_deceleration;

        // 2) Forward/backward acceleration.
        let acc = if input.sprint {
            self.acceleration * self.sprint_multiplier
        } else {
            self.acceleration
        };
        if input.forward {
            velocity.z += acc.z * dt * self.forward_impulse;
        }
        if input.backward {
            velocity.z -= acc.z * dt * self.forward_impulse;
        }

        // 3) Yaw. Turn rate uses the unscaled acceleration so sprinting does not spin faster.
        let mut rotation = pose.rotation;
        if !input.dance {
            let step = 2.0 * PI * dt * self.acceleration.y;
            if input.left {
                rotation *= Quat::from_axis_angle(Vec3::Y, step);
            }
            if input.right {
                rotation *= Quat::from_axis_angle(Vec3::Y, -step);
            }
        }
        pose.rotation = rotation;

        // 4) Translate along the updated facing.
        let forward = pose.forward() * (velocity.z * dt);
        let sideways = pose.sideways() * (velocity.x * dt);
        pose.position += forward;
        pose.position += sideways;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    #[test]
    fn sprint_forward_from_rest() {
        let integ = MovementIntegrator::default();
        let input = InputState {
            forward: true,
            sprint: true,
            ..Default::default()
        };
        let mut v = Vec3::ZERO;
        let mut pose = Pose::default();
        integ.update(0.1, &input, &mut v, &mut pose);
        // 100 * 3 * 0.1 * 0.5; decay of a zero velocity contributes nothing.
        approx(v.z, 15.0, 1e-4);
        approx(pose.position.z, 1.5, 1e-4);
        approx(pose.position.x, 0.0, 1e-6);
    }

    #[test]
    fn decay_runs_before_acceleration() {
        let integ = MovementIntegrator::default();
        let input = InputState {
            forward: true,
            ..Default::default()
        };
        let mut v = Vec3::new(0.0, 0.0, 10.0);
        let mut pose = Pose::default();
        integ.update(0.1, &input, &mut v, &mut pose);
        // decay: 10 + 10 * -5 * 0.1 = 5; then + 100 * 0.1 * 0.5 = 10
        approx(v.z, 10.0, 1e-4);
    }

    #[test]
    fn decay_applies_with_no_input() {
        let integ = MovementIntegrator::default();
        let mut v = Vec3::new(2.0, 1.0, 4.0);
        let mut pose = Pose::default();
        integ.update(0.5, &InputState::default(), &mut v, &mut pose);
        approx(v.x, 2.0 - 2.0 * 0.0005 * 0.5, 1e-6);
        approx(v.y, 1.0 - 1.0 * 0.0001 * 0.5, 1e-6);
        approx(v.z, 4.0 - 4.0 * 5.0 * 0.5, 1e-5);
    }

    #[test]
    fn left_and_right_turn_in_opposite_directions() {
        let integ = MovementIntegrator::default();
        let dt = 0.1;
        let mut v = Vec3::ZERO;

        let mut left = Pose::default();
        integ.update(
            dt,
            &InputState {
                left: true,
                ..Default::default()
            },
            &mut v,
            &mut left,
        );
        let expected = Quat::from_axis_angle(Vec3::Y, 2.0 * PI * dt * 0.25);
        assert!(left.rotation.abs_diff_eq(expected, 1e-6));

        let mut right = Pose::default();
        integ.update(
            dt,
            &InputState {
                right: true,
                ..Default::default()
            },
            &mut v,
            &mut right,
        );
        assert!(right.rotation.abs_diff_eq(left.rotation.inverse(), 1e-6));
        assert!((left.rotation * right.rotation).abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn dancing_suppresses_turning() {
        let integ = MovementIntegrator::default();
        let mut v = Vec3::ZERO;
        let mut pose = Pose::default();
        let input = InputState {
            left: true,
            right: true,
            dance: true,
            ..Default::default()
        };
        integ.update(0.2, &input, &mut v, &mut pose);
        assert_eq!(pose.rotation, Quat::IDENTITY);
    }

    #[test]
    fn translation_follows_rotated_axes() {
        let integ = MovementIntegrator::default();
        let mut v = Vec3::new(0.0, 0.0, 10.0);
        let mut pose = Pose {
            position: Vec3::ZERO,
            rotation: Quat::from_axis_angle(Vec3::Y, PI / 2.0),
        };
        integ.update(0.1, &InputState::default(), &mut v, &mut pose);
        // Facing +X after a quarter turn; velocity decays to 5 first.
        approx(pose.position.x, 0.5, 1e-4);
        approx(pose.position.z, 0.0, 1e-4);
    }

    #[test]
    fn identical_inputs_give_identical_outputs() {
        let integ = MovementIntegrator::default();
        let input = InputState {
            forward: true,
            left: true,
            sprint: true,
            ..Default::default()
        };
        let run = || {
            let mut v = Vec3::new(0.3, 0.0, 1.0);
            let mut pose = Pose::default();
            for _ in 0..50 {
                integ.update(0.016, &input, &mut v, &mut pose);
            }
            (v, pose)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn zero_dt_is_a_fixed_point() {
        let integ = MovementIntegrator::default();
        let input = InputState {
            forward: true,
            left: true,
            ..Default::default()
        };
        let mut v = Vec3::new(1.0, 2.0, 3.0);
        let mut pose = Pose {
            position: Vec3::new(4.0, 5.0, 6.0),
            rotation: Quat::from_rotation_y(0.3),
        };
        let before = (v, pose);
        integ.update(0.0, &input, &mut v, &mut pose);
        assert_eq!(v, before.0);
        assert_eq!(pose.position, before.1.position);
        assert!(pose.rotation.abs_diff_eq(before.1.rotation, 1e-6));
    }
}
