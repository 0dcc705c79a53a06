//! In-process doubles for running the controller headless.
//!
//! | Double | Stands in for |
//! |---|---|
//! | [`ManualClock`] | the wall clock; time only moves when told to |
//! | [`RecordingTransport`] | the simulator; records every publish, replays queued inbound strings |
//! | [`ScriptedInput`] | the operator; yields pre-recorded reads, optionally then breaks |
//!
//! Handles are cheap clones over shared state so a test can keep one copy
//! while the controller owns another.  Everything is single-threaded, like the
//! controller loop itself.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use objctl_middleware::Transport;
use objctl_types::{ObjctlError, Pose};

use crate::clock::Clock;
use crate::input::InputSource;

// ────────────────────────────────────────────────────────────────────────────
// ManualClock
// ────────────────────────────────────────────────────────────────────────────

/// Settable clock shared between clones.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RecordingTransport
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Recorded {
    poses: Vec<Pose>,
    messages: Vec<String>,
    inbound: VecDeque<String>,
    failing: bool,
}

/// [`Transport`] that records publishes instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    state: Rc<RefCell<Recorded>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pose published so far, in order.
    pub fn poses(&self) -> Vec<Pose> {
        self.state.borrow().poses.clone()
    }

    /// Every message published so far, in order.
    pub fn messages(&self) -> Vec<String> {
        self.state.borrow().messages.clone()
    }

    /// Queue a string for the next `poll_inbound`.
    pub fn push_inbound(&self, text: impl Into<String>) {
        self.state.borrow_mut().inbound.push_back(text.into());
    }

    /// While set, every publish fails and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.state.borrow_mut().failing = failing;
    }

    fn check(&self, channel: &str) -> Result<(), ObjctlError> {
        if self.state.borrow().failing {
            return Err(ObjctlError::Publish {
                channel: channel.to_string(),
                details: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl Transport for RecordingTransport {
    fn publish_pose(&mut self, pose: &Pose) -> Result<(), ObjctlError> {
        self.check("transform")?;
        self.state.borrow_mut().poses.push(pose.clone());
        Ok(())
    }

    fn publish_message(&mut self, payload: &str) -> Result<(), ObjctlError> {
        self.check("message")?;
        self.state.borrow_mut().messages.push(payload.to_string());
        Ok(())
    }

    fn poll_inbound(&mut self) -> Result<Vec<String>, ObjctlError> {
        Ok(self.state.borrow_mut().inbound.drain(..).collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedInput
// ────────────────────────────────────────────────────────────────────────────

/// [`InputSource`] that replays one chunk per poll.
///
/// An empty chunk models a poll with nothing available.  Once the script is
/// exhausted it keeps returning `Ok(0)`, or fails if built with
/// [`then_fail`][Self::then_fail].
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    chunks: Rc<RefCell<VecDeque<Vec<u8>>>>,
    failure: Option<String>,
    polls: Rc<Cell<usize>>,
}

impl ScriptedInput {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: Rc::new(RefCell::new(
                chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            )),
            ..Self::default()
        }
    }

    /// Report a broken stream once the script runs out.
    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Number of times the source has been polled.
    pub fn polls(&self) -> usize {
        self.polls.get()
    }
}

impl InputSource for ScriptedInput {
    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, ObjctlError> {
        self.polls.set(self.polls.get() + 1);
        match self.chunks.borrow_mut().pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            None => match &self.failure {
                Some(reason) => Err(ObjctlError::Input(reason.clone())),
                None => Ok(0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(10.0);
        let handle = clock.clone();
        handle.advance(0.5);
        assert_eq!(clock.now(), 10.5);
        clock.set(3.0);
        assert_eq!(handle.now(), 3.0);
    }

    #[test]
    fn recording_transport_clones_share_state() {
        let transport = RecordingTransport::new();
        let mut owned = transport.clone();
        owned.publish_message("released").unwrap();
        owned.publish_pose(&Pose::at("table", 0.0, 0.0)).unwrap();
        assert_eq!(transport.messages(), vec!["released"]);
        assert_eq!(transport.poses().len(), 1);

        transport.push_inbound("ping");
        assert_eq!(owned.poll_inbound().unwrap(), vec!["ping"]);
        assert!(owned.poll_inbound().unwrap().is_empty());
    }

    #[test]
    fn scripted_input_replays_then_fails() {
        let mut input = ScriptedInput::new([&b"ab"[..], &b""[..]]).then_fail("EIO");
        let mut buf = [0u8; 8];
        assert_eq!(input.poll_read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(input.poll_read(&mut buf).unwrap(), 0);
        assert!(matches!(input.poll_read(&mut buf), Err(ObjctlError::Input(_))));
        assert_eq!(input.polls(), 3);
    }
}
