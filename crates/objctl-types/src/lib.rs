//! `objctl-types` – shared vocabulary of the object controller.
//!
//! Poses, commands, tracked objects, bus events, and the crate-spanning
//! [`ObjctlError`].  Everything here is plain data and serialisable with
//! `serde` so it can cross the in-process bus or be encoded onto the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The fixed parent frame every pose is expressed in.
pub const MAP_FRAME: &str = "map";

/// Name of the object moved by [`Command::MoveTable`].
pub const TABLE_OBJECT: &str = "table";

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A rotation quaternion in the `(x, y, z, w)` order used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Rotation of `yaw` radians about the vertical (+Z) axis.
    ///
    /// Equivalent to a roll-pitch-yaw of `(0, 0, yaw)`.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw * 0.5;
        Self::new(0.0, 0.0, half.sin(), half.cos())
    }

    /// Recover the yaw angle, wrapped to `(-π, π]`.
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose
// ────────────────────────────────────────────────────────────────────────────

/// Position and optional orientation of a named object in [`MAP_FRAME`].
///
/// Constructed fresh for every publish and never stored.  A `None` rotation
/// leaves the orientation for the simulator to decide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub frame_id: String,
    pub child_frame_id: String,
    pub translation: Vec3,
    pub rotation: Option<Quaternion>,
}

impl Pose {
    /// A pose for `name` at `(x, y, 0)` with no orientation override.
    pub fn at(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            frame_id: MAP_FRAME.to_string(),
            child_frame_id: name.into(),
            translation: Vec3::new(x, y, 0.0),
            rotation: None,
        }
    }

    /// Attach an orientation.
    pub fn with_rotation(mut self, rotation: Quaternion) -> Self {
        self.rotation = Some(rotation);
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tracked objects and commands
// ────────────────────────────────────────────────────────────────────────────

/// A named object driven around the unit circle by a recurring schedule.
///
/// Parameters are fixed at registration; re-registering replaces the whole
/// record rather than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub name: String,
    /// Radians per second.
    pub angular_speed: f64,
    /// Clock reading (seconds) captured when the schedule was registered.
    pub phase_origin: f64,
}

/// A discrete operator command decoded from one keystroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum Command {
    /// Teleport the table to `(x, y, 0)`.
    MoveTable { x: f64, y: f64 },
    /// Tell the simulator `object` has been grasped.
    Grasp { object: String },
    /// Tell the simulator the held object was released.
    Release,
}

impl Command {
    /// Text payload for message-channel commands; `None` for pose commands.
    pub fn payload(&self) -> Option<String> {
        match self {
            Command::MoveTable { .. } => None,
            Command::Grasp { object } => Some(format!("grasped,{object}")),
            Command::Release => Some("released".to_string()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bus events
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the in-process bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"objctl-core::registry"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current UTC time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Data routed over the in-process bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Transform(Pose),
    Message(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by every objctl crate.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ObjctlError {
    /// The operator input stream broke.  Fatal to the controller loop.
    #[error("Input Stream Error: {0}")]
    Input(String),

    #[error("Publish Failed on {channel}: {details}")]
    Publish { channel: String, details: String },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Transport Error: {0}")]
    Transport(String),
}

impl ObjctlError {
    /// Whether this error must terminate the controller loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ObjctlError::Input(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_at_places_object_on_the_floor_in_map_frame() {
        let pose = Pose::at(TABLE_OBJECT, 0.5, 0.0);
        assert_eq!(pose.frame_id, "map");
        assert_eq!(pose.child_frame_id, "table");
        assert_eq!(pose.translation, Vec3::new(0.5, 0.0, 0.0));
        assert!(pose.rotation.is_none());
    }

    #[test]
    fn quaternion_from_yaw_is_unit_and_recovers_yaw() {
        for yaw in [0.0, 0.3, 1.2, -2.5, 3.0] {
            let q = Quaternion::from_yaw(yaw);
            let norm = (q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w).sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
            assert!((q.yaw() - yaw).abs() < 1e-9, "yaw {yaw} came back as {}", q.yaw());
        }
    }

    #[test]
    fn zero_yaw_is_identity() {
        assert_eq!(Quaternion::from_yaw(0.0), Quaternion::identity());
    }

    #[test]
    fn command_payloads() {
        let grasp = Command::Grasp {
            object: "bear_doll".to_string(),
        };
        assert_eq!(grasp.payload().as_deref(), Some("grasped,bear_doll"));
        assert_eq!(Command::Release.payload().as_deref(), Some("released"));
        assert_eq!(Command::MoveTable { x: 0.0, y: 0.5 }.payload(), None);
    }

    #[test]
    fn command_serialises_with_action_tag() {
        let json = serde_json::to_string(&Command::Release).unwrap();
        assert_eq!(json, r#"{"action":"Release"}"#);
    }

    #[test]
    fn only_input_errors_are_fatal() {
        assert!(ObjctlError::Input("EIO".to_string()).is_fatal());
        assert!(
            !ObjctlError::Publish {
                channel: "/goods/transform".to_string(),
                details: "closed".to_string(),
            }
            .is_fatal()
        );
        assert!(!ObjctlError::Channel("no receivers".to_string()).is_fatal());
    }

    #[test]
    fn error_display_names_the_channel() {
        let err = ObjctlError::Publish {
            channel: "/goods/message/from_ros".to_string(),
            details: "socket closed".to_string(),
        };
        assert!(err.to_string().contains("/goods/message/from_ros"));
    }
}
