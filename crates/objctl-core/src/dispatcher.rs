//! Keystroke → command mapping.
//!
//! | Key | Command |
//! |---|---|
//! | `1` | move the table to `(0.0, 0.0)` |
//! | `2` | move the table to `(0.5, 0.0)` |
//! | `3` | move the table to `(0.0, 0.5)` |
//! | `g` | `grasped,bear_doll` |
//! | `h` | `grasped,dog_doll` |
//! | `i` | `grasped,rabbit_doll` |
//! | `r` | `released` |
//!
//! Keys are case-sensitive; anything else is ignored.

use objctl_middleware::Transport;
use objctl_types::{Command, Pose, TABLE_OBJECT};
use tracing::{info, warn};

/// One row of the help table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub key: char,
    pub description: &'static str,
}

/// The fixed key table, in display order.
pub const KEY_BINDINGS: [KeyBinding; 7] = [
    KeyBinding { key: '1', description: "Move Table to Position1" },
    KeyBinding { key: '2', description: "Move Table to Position2" },
    KeyBinding { key: '3', description: "Move Table to Position3" },
    KeyBinding { key: 'g', description: "Send Grasped bear_doll" },
    KeyBinding { key: 'h', description: "Send Grasped dog_doll" },
    KeyBinding { key: 'i', description: "Send Grasped rabbit_doll" },
    KeyBinding { key: 'r', description: "Send Released" },
];

/// Decodes operator bytes and performs the matching publish.
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    dispatched: u64,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one input byte to its command, if it has one.
    pub fn decode(byte: u8) -> Option<Command> {
        let grasp = |object: &str| Command::Grasp {
            object: object.to_string(),
        };
        match byte {
            b'1' => Some(Command::MoveTable { x: 0.0, y: 0.0 }),
            b'2' => Some(Command::MoveTable { x: 0.5, y: 0.0 }),
            b'3' => Some(Command::MoveTable { x: 0.0, y: 0.5 }),
            b'g' => Some(grasp("bear_doll")),
            b'h' => Some(grasp("dog_doll")),
            b'i' => Some(grasp("rabbit_doll")),
            b'r' => Some(Command::Release),
            _ => None,
        }
    }

    /// Decode `byte` and execute it against `transport`.
    ///
    /// Returns the command that was executed, or `None` for an unmapped byte
    /// (no publish happens).
    pub fn dispatch<T: Transport + ?Sized>(&mut self, byte: u8, transport: &mut T) -> Option<Command> {
        let command = Self::decode(byte)?;
        self.execute(&command, transport);
        Some(command)
    }

    /// Perform exactly one publish for `command`.  Failures are logged.
    pub fn execute<T: Transport + ?Sized>(&mut self, command: &Command, transport: &mut T) {
        self.dispatched += 1;
        match command {
            Command::MoveTable { x, y } => {
                if let Err(e) = transport.publish_pose(&Pose::at(TABLE_OBJECT, *x, *y)) {
                    warn!(error = %e, x, y, "table move failed");
                }
            }
            Command::Grasp { .. } | Command::Release => {
                let Some(payload) = command.payload() else {
                    return;
                };
                match transport.publish_message(&payload) {
                    Ok(()) => info!("Sent Message: {payload}"),
                    Err(e) => warn!(error = %e, payload = %payload, "message publish failed"),
                }
            }
        }
    }

    /// Number of commands executed so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::RecordingTransport;
    use objctl_types::Vec3;

    #[test]
    fn grasp_key_sends_one_message() {
        let mut dispatcher = CommandDispatcher::new();
        let mut transport = RecordingTransport::new();

        let command = dispatcher.dispatch(b'g', &mut transport);

        assert_eq!(
            command,
            Some(Command::Grasp {
                object: "bear_doll".to_string()
            })
        );
        assert_eq!(transport.messages(), vec!["grasped,bear_doll"]);
        assert!(transport.poses().is_empty());
    }

    #[test]
    fn unmapped_key_publishes_nothing() {
        let mut dispatcher = CommandDispatcher::new();
        let mut transport = RecordingTransport::new();

        for byte in [b'x', b'G', b'R', b'0', b'4', b' ', 0x1b] {
            assert_eq!(dispatcher.dispatch(byte, &mut transport), None);
        }
        assert!(transport.messages().is_empty());
        assert!(transport.poses().is_empty());
        assert_eq!(dispatcher.dispatched(), 0);
    }

    #[test]
    fn table_keys_publish_one_pose_each() {
        let mut dispatcher = CommandDispatcher::new();
        let mut transport = RecordingTransport::new();

        dispatcher.dispatch(b'2', &mut transport);
        let poses = transport.poses();
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].child_frame_id, "table");
        assert_eq!(poses[0].frame_id, "map");
        assert_eq!(poses[0].translation, Vec3::new(0.5, 0.0, 0.0));
        assert!(poses[0].rotation.is_none());

        dispatcher.dispatch(b'1', &mut transport);
        dispatcher.dispatch(b'3', &mut transport);
        let positions: Vec<Vec3> = transport.poses().iter().map(|p| p.translation).collect();
        assert_eq!(
            positions,
            vec![
                Vec3::new(0.5, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.5, 0.0)
            ]
        );
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn remaining_message_keys() {
        let mut dispatcher = CommandDispatcher::new();
        let mut transport = RecordingTransport::new();

        for byte in [b'h', b'i', b'r'] {
            dispatcher.dispatch(byte, &mut transport);
        }
        assert_eq!(
            transport.messages(),
            vec!["grasped,dog_doll", "grasped,rabbit_doll", "released"]
        );
        assert_eq!(dispatcher.dispatched(), 3);
    }

    #[test]
    fn every_key_binding_decodes() {
        for binding in KEY_BINDINGS {
            assert!(
                CommandDispatcher::decode(binding.key as u8).is_some(),
                "help lists '{}' but it does not decode",
                binding.key
            );
        }
    }

    #[test]
    fn publish_failure_is_swallowed() {
        let mut dispatcher = CommandDispatcher::new();
        let mut transport = RecordingTransport::new();
        transport.set_failing(true);

        assert!(dispatcher.dispatch(b'r', &mut transport).is_some());
        assert!(transport.messages().is_empty());
    }
}
