//! `objctl-core` – the controller itself.
//!
//! Drives a handful of named objects around the simulation on fixed circular
//! trajectories and turns operator keystrokes into discrete commands.  All of
//! it runs on one thread: a fixed-rate loop polls input, fires due schedules,
//! and drains inbound messages, and nothing in between blocks.
//!
//! # Modules
//!
//! - [`motion`] – [`position_at`][motion::position_at]: pure phase →
//!   position/heading mapping on the unit circle.
//! - [`clock`] – the [`Clock`][clock::Clock] time source.
//! - [`registry`] – [`TimerRegistry`][registry::TimerRegistry]: one recurring
//!   schedule per tracked object name, fired by a single generic tick.
//! - [`dispatcher`] – [`CommandDispatcher`][dispatcher::CommandDispatcher]:
//!   the fixed keystroke → command table.
//! - [`input`] – non-blocking operator input and the scoped raw terminal
//!   mode.
//! - [`controller`] – [`ObjectController`][controller::ObjectController]: the
//!   top-level polling loop.
//! - [`sim`] – clock, transport, and input doubles for headless testing.

pub mod clock;
pub mod controller;
pub mod dispatcher;
pub mod input;
pub mod motion;
pub mod registry;
pub mod sim;

pub use clock::{Clock, SystemClock};
pub use controller::{ControllerConfig, ControllerState, ObjectController, ObjectSpec, Rate};
pub use dispatcher::{CommandDispatcher, KEY_BINDINGS, KeyBinding};
pub use input::{InputSource, RawTerminal, StdinInput};
pub use motion::{MotionSample, position_at};
pub use registry::TimerRegistry;
