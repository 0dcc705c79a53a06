//! rosbridge v2 transport.
//!
//! [`RosbridgeTransport`] speaks the rosbridge JSON protocol over a websocket:
//!
//! * **Outbound (poses)** – each [`Pose`] becomes a
//!   `geometry_msgs/TransformStamped` publish on the transform topic.
//! * **Outbound (messages)** – each string becomes a `std_msgs/String`
//!   publish on the outbound topic.
//! * **Inbound** – `std_msgs/String` publishes arriving on the inbound topic
//!   are returned from [`Transport::poll_inbound`].
//!
//! The handshake is performed blocking; afterwards the socket is switched to
//! non-blocking so the controller loop never stalls on the network.
//!
//! Losing the connection is reported once.  From then on the transport is
//! closed: polls return nothing and publishes are dropped.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

use objctl_types::{ObjctlError, Pose, Quaternion};
use serde_json::{Value, json};
use tracing::{debug, error, info};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::adapter::Transport;

/// rosbridge message type of the transform topic.
pub const TRANSFORM_TYPE: &str = "geometry_msgs/TransformStamped";

/// rosbridge message type of both message topics.
pub const STRING_TYPE: &str = "std_msgs/String";

/// Topic names used on the rosbridge connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosbridgeTopics {
    pub transform: String,
    pub outbound: String,
    pub inbound: String,
}

impl Default for RosbridgeTopics {
    fn default() -> Self {
        Self {
            transform: "/goods/transform".to_string(),
            outbound: "/goods/message/from_ros".to_string(),
            inbound: "/goods/message/from_sigverse".to_string(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Frame builders
// ────────────────────────────────────────────────────────────────────────────

/// `advertise` op announcing that we publish `msg_type` on `topic`.
pub fn advertise_frame(topic: &str, msg_type: &str) -> String {
    json!({ "op": "advertise", "topic": topic, "type": msg_type }).to_string()
}

/// `subscribe` op requesting delivery of `topic`.
pub fn subscribe_frame(topic: &str, msg_type: &str) -> String {
    json!({ "op": "subscribe", "topic": topic, "type": msg_type }).to_string()
}

/// `publish` op carrying a `TransformStamped` for `pose`.
///
/// A pose without rotation is sent with the all-zero quaternion, which the
/// simulator treats as "compute the orientation yourself".
pub fn transform_frame(topic: &str, pose: &Pose) -> String {
    let rotation = pose.rotation.unwrap_or(Quaternion::new(0.0, 0.0, 0.0, 0.0));
    json!({
        "op": "publish",
        "topic": topic,
        "msg": {
            "header": { "frame_id": pose.frame_id },
            "child_frame_id": pose.child_frame_id,
            "transform": {
                "translation": {
                    "x": pose.translation.x,
                    "y": pose.translation.y,
                    "z": pose.translation.z
                },
                "rotation": {
                    "x": rotation.x,
                    "y": rotation.y,
                    "z": rotation.z,
                    "w": rotation.w
                }
            }
        }
    })
    .to_string()
}

/// `publish` op carrying a `std_msgs/String`.
pub fn string_frame(topic: &str, data: &str) -> String {
    json!({ "op": "publish", "topic": topic, "msg": { "data": data } }).to_string()
}

/// Extract the string payload of a `publish` op on `topic`.
///
/// Anything else (other ops, other topics, malformed JSON) yields `None`.
pub fn parse_inbound_frame(text: &str, topic: &str) -> Option<String> {
    let frame: Value = serde_json::from_str(text).ok()?;
    if frame.get("op").and_then(Value::as_str) != Some("publish")
        || frame.get("topic").and_then(Value::as_str) != Some(topic)
    {
        return None;
    }
    frame
        .get("msg")
        .and_then(|m| m.get("data"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ────────────────────────────────────────────────────────────────────────────
// Transport
// ────────────────────────────────────────────────────────────────────────────

fn would_block(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(e) if e.kind() == ErrorKind::WouldBlock)
}

fn connection_lost(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Io(_)
    )
}

/// [`Transport`] speaking rosbridge v2 over a websocket.
pub struct RosbridgeTransport<S: Read + Write> {
    socket: WebSocket<S>,
    topics: RosbridgeTopics,
    closed: bool,
}

impl RosbridgeTransport<MaybeTlsStream<TcpStream>> {
    /// Connect to the rosbridge server at `url` (e.g. `ws://localhost:9090`)
    /// and set up the topics.
    ///
    /// # Errors
    ///
    /// Returns [`ObjctlError::Transport`] if the handshake fails or the
    /// socket cannot be made non-blocking.
    pub fn connect(url: &str, topics: RosbridgeTopics) -> Result<Self, ObjctlError> {
        let (socket, _response) = tungstenite::connect(url)
            .map_err(|e| ObjctlError::Transport(format!("connect to {url}: {e}")))?;
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream
                .set_nonblocking(true)
                .map_err(|e| ObjctlError::Transport(format!("set_nonblocking: {e}")))?;
        }
        info!(url, "connected to rosbridge");
        Self::from_socket(socket, topics)
    }
}

impl<S: Read + Write> RosbridgeTransport<S> {
    /// Wrap an already-handshaken websocket, advertising the outbound topics
    /// and subscribing to the inbound one.
    pub fn from_socket(socket: WebSocket<S>, topics: RosbridgeTopics) -> Result<Self, ObjctlError> {
        let mut transport = Self {
            socket,
            topics,
            closed: false,
        };
        let setup = [
            advertise_frame(&transport.topics.transform, TRANSFORM_TYPE),
            advertise_frame(&transport.topics.outbound, STRING_TYPE),
            subscribe_frame(&transport.topics.inbound, STRING_TYPE),
        ];
        for frame in setup {
            transport
                .send_frame(frame)
                .map_err(|e| ObjctlError::Transport(format!("topic setup: {e}")))?;
        }
        Ok(transport)
    }

    // A frame that hits WouldBlock stays queued inside the websocket and is
    // flushed by the next poll_inbound.
    fn send_frame(&mut self, frame: String) -> Result<(), tungstenite::Error> {
        match self.socket.send(Message::Text(frame.into())) {
            Err(e) if would_block(&e) => Ok(()),
            other => other,
        }
    }

    fn publish_on(&mut self, channel: &str, frame: String) -> Result<(), ObjctlError> {
        if self.closed {
            return Ok(());
        }
        match self.send_frame(frame) {
            Ok(()) => Ok(()),
            Err(e) if connection_lost(&e) => Err(self.mark_closed(format!("send: {e}"))),
            Err(e) => Err(ObjctlError::Publish {
                channel: channel.to_string(),
                details: e.to_string(),
            }),
        }
    }

    fn mark_closed(&mut self, reason: String) -> ObjctlError {
        self.closed = true;
        error!(reason = %reason, "rosbridge connection lost; dropping further traffic");
        ObjctlError::Transport(reason)
    }
}

impl<S: Read + Write> Transport for RosbridgeTransport<S> {
    fn publish_pose(&mut self, pose: &Pose) -> Result<(), ObjctlError> {
        let topic = self.topics.transform.clone();
        let frame = transform_frame(&topic, pose);
        self.publish_on(&topic, frame)
    }

    fn publish_message(&mut self, payload: &str) -> Result<(), ObjctlError> {
        let topic = self.topics.outbound.clone();
        let frame = string_frame(&topic, payload);
        self.publish_on(&topic, frame)
    }

    fn poll_inbound(&mut self) -> Result<Vec<String>, ObjctlError> {
        if self.closed {
            return Ok(Vec::new());
        }
        match self.socket.flush() {
            Err(e) if !would_block(&e) => return Err(self.mark_closed(format!("flush: {e}"))),
            _ => {}
        }

        let mut received = Vec::new();
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => {
                    match parse_inbound_frame(text.as_str(), &self.topics.inbound) {
                        Some(data) => received.push(data),
                        None => debug!(frame = %text.as_str(), "ignoring rosbridge frame"),
                    }
                }
                Ok(Message::Close(_)) => {
                    return Err(self.mark_closed("rosbridge closed the connection".to_string()));
                }
                Ok(_) => {}
                Err(e) if would_block(&e) => break,
                Err(e) => return Err(self.mark_closed(format!("read: {e}"))),
            }
        }
        Ok(received)
    }
}
