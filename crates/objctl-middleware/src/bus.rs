//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so every
//! subscriber receives every message without any single subscriber blocking
//! the others.  The controller loop is single-threaded, so receivers are read
//! with the non-blocking [`TopicReceiver::try_recv`] rather than awaited.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Transform`] | Object poses, up to 20 Hz per tracked object |
//! | [`Topic::OutboundMessage`] | `grasped,<name>` / `released` notifications |
//! | [`Topic::InboundMessage`] | Informational strings from the simulator |

use objctl_types::{Event, ObjctlError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Poses published for tracked objects and the table.
    Transform,
    /// String messages sent from the controller to the simulator.
    OutboundMessage,
    /// String messages sent from the simulator to the controller.
    InboundMessage,
}

/// Shared event bus.  Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    transform: broadcast::Sender<Event>,
    outbound_message: broadcast::Sender<Event>,
    inbound_message: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (transform, _) = broadcast::channel(capacity);
        let (outbound_message, _) = broadcast::channel(capacity);
        let (inbound_message, _) = broadcast::channel(capacity);
        Self {
            transform,
            outbound_message,
            inbound_message,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    ///
    /// # Errors
    ///
    /// Returns [`ObjctlError::Channel`] when nobody is subscribed to `topic`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, ObjctlError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| ObjctlError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Transform => &self.transform,
            Topic::OutboundMessage => &self.outbound_message,
            Topic::InboundMessage => &self.inbound_message,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Take the next buffered event without blocking.
    ///
    /// Returns `None` when the channel is currently empty or closed.  If the
    /// receiver fell behind, the dropped count is logged and the oldest
    /// retained event is returned.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every buffered event.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
