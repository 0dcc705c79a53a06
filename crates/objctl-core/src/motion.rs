//! Circular motion generator.
//!
//! The phase is accumulated as `phase_origin + angular_speed * now`.  The
//! origin is folded in once, at registration, and `now` is the absolute clock
//! reading, not the time elapsed since registration.
//!
//! ```rust
//! use objctl_core::motion::position_at;
//!
//! let s = position_at(0.0, 0.0, 123.0);
//! assert!((s.x - 1.0).abs() < 1e-12);
//! assert!(s.y.abs() < 1e-12);
//! ```

use objctl_types::{Pose, Quaternion};

/// One point on the trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    /// Rotation about the vertical axis, radians.  Not wrapped.
    pub heading: f64,
}

impl MotionSample {
    /// Build the pose for `name` at this sample.  The heading is attached as
    /// an orientation only when `with_orientation` is set.
    pub fn to_pose(&self, name: &str, with_orientation: bool) -> Pose {
        let pose = Pose::at(name, self.x, self.y);
        if with_orientation {
            pose.with_rotation(Quaternion::from_yaw(self.heading))
        } else {
            pose
        }
    }
}

/// Position and heading at clock reading `now`.
pub fn position_at(phase_origin: f64, angular_speed: f64, now: f64) -> MotionSample {
    let phase = phase_origin + angular_speed * now;
    MotionSample {
        x: phase.cos(),
        y: phase.sin(),
        heading: phase,
    }
}
