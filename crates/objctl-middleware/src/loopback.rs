//! In-process loopback transport.
//!
//! [`LoopbackTransport`] routes every publish onto an [`EventBus`] instead of
//! a simulator.  It keeps its own monitor subscriptions on the outbound lanes
//! so publishing never fails for lack of a receiver, and it reads the inbound
//! lane so anything holding a clone of the bus can play the simulator's part
//! by publishing on [`Topic::InboundMessage`].

use objctl_types::{Event, EventPayload, ObjctlError, Pose};
use tracing::debug;

use crate::adapter::Transport;
use crate::bus::{EventBus, Topic, TopicReceiver};

const SOURCE: &str = "objctl-middleware::loopback";

/// [`Transport`] backed by the in-process [`EventBus`].
pub struct LoopbackTransport {
    bus: EventBus,
    transform_monitor: TopicReceiver,
    message_monitor: TopicReceiver,
    inbound: TopicReceiver,
}

impl LoopbackTransport {
    /// Create a transport on `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self {
            transform_monitor: bus.subscribe_to(Topic::Transform),
            message_monitor: bus.subscribe_to(Topic::OutboundMessage),
            inbound: bus.subscribe_to(Topic::InboundMessage),
            bus,
        }
    }

    // The monitors exist only to keep the outbound lanes open; whatever they
    // buffered is logged and discarded.
    fn drain_monitors(&mut self) {
        for event in self
            .transform_monitor
            .drain()
            .into_iter()
            .chain(self.message_monitor.drain())
        {
            debug!(source = %event.source, payload = ?event.payload, "loopback delivered");
        }
    }
}

impl Transport for LoopbackTransport {
    fn publish_pose(&mut self, pose: &Pose) -> Result<(), ObjctlError> {
        self.bus
            .publish_to(
                Topic::Transform,
                Event::new(SOURCE, EventPayload::Transform(pose.clone())),
            )
            .map(|_| ())
    }

    fn publish_message(&mut self, payload: &str) -> Result<(), ObjctlError> {
        self.bus
            .publish_to(
                Topic::OutboundMessage,
                Event::new(SOURCE, EventPayload::Message(payload.to_string())),
            )
            .map(|_| ())
    }

    fn poll_inbound(&mut self) -> Result<Vec<String>, ObjctlError> {
        self.drain_monitors();
        Ok(self
            .inbound
            .drain()
            .into_iter()
            .filter_map(|event| match event.payload {
                EventPayload::Message(text) => Some(text),
                EventPayload::Transform(_) => None,
            })
            .collect())
    }
}
