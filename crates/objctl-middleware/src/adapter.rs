//! The transport seam.
//!
//! The controller never speaks rosbridge or touches the bus directly.  It
//! hands poses and strings to a [`Transport`], and the transport translates
//! them into whatever the outside world understands.
//!
//! - [`LoopbackTransport`][crate::loopback::LoopbackTransport] – in-process
//!   [`EventBus`][crate::bus::EventBus].
//! - [`RosbridgeTransport`][crate::rosbridge::RosbridgeTransport] – rosbridge
//!   v2 JSON over a websocket.

use objctl_types::{ObjctlError, Pose};

/// Every outbound/inbound channel implementation must implement this trait.
///
/// # Contract
///
/// * `publish_pose` / `publish_message` – exactly one transmission per call,
///   best effort, no retries and no acknowledgement wait.
/// * `poll_inbound` – must never block; returns every inbound string that has
///   arrived since the previous call (possibly none).
pub trait Transport {
    /// Transmit one pose on the transform channel.
    fn publish_pose(&mut self, pose: &Pose) -> Result<(), ObjctlError>;

    /// Transmit one string on the outbound message channel.
    fn publish_message(&mut self, payload: &str) -> Result<(), ObjctlError>;

    /// Drain inbound messages without blocking.
    fn poll_inbound(&mut self) -> Result<Vec<String>, ObjctlError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn publish_pose(&mut self, pose: &Pose) -> Result<(), ObjctlError> {
        (**self).publish_pose(pose)
    }

    fn publish_message(&mut self, payload: &str) -> Result<(), ObjctlError> {
        (**self).publish_message(payload)
    }

    fn poll_inbound(&mut self) -> Result<Vec<String>, ObjctlError> {
        (**self).poll_inbound()
    }
}
