//! `objctl-middleware` – the wire side of the object controller.
//!
//! The controller only ever talks to the [`Transport`] trait: "publish a named
//! pose", "publish a string message", and "drain whatever arrived inbound".
//!
//! # Modules
//!
//! - [`bus`] – topic-based broadcast bus used for in-process delivery.
//! - [`adapter`] – the [`Transport`] trait.
//! - [`loopback`] – [`LoopbackTransport`], a transport over the [`EventBus`]
//!   for running without a simulator.
//! - [`rosbridge`] – [`RosbridgeTransport`], rosbridge v2 JSON over a
//!   websocket.

pub mod adapter;
pub mod bus;
pub mod loopback;
pub mod rosbridge;

pub use adapter::Transport;
pub use bus::{EventBus, Topic, TopicReceiver};
pub use loopback::LoopbackTransport;
pub use rosbridge::{RosbridgeTopics, RosbridgeTransport};
