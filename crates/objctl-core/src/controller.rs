//! [`ObjectController`] – the top-level polling loop.
//!
//! One iteration:
//!
//! 1. poll operator input without blocking and dispatch the **last** byte of
//!    whatever was read (earlier bytes of the same read are dropped);
//! 2. fire every due schedule in the [`TimerRegistry`] and log every inbound
//!    message the transport has received;
//! 3. sleep until the next cadence boundary.
//!
//! The shutdown flag is consulted once per iteration, before it starts, so an
//! iteration in progress always completes.  Only a broken input stream ends
//! the loop early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use objctl_middleware::Transport;
use objctl_types::{Command, ObjctlError, TrackedObject};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::dispatcher::CommandDispatcher;
use crate::input::{InputSource, READ_BUFFER_LEN};
use crate::registry::TimerRegistry;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// An object to put on a recurring schedule at bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub name: String,
    pub angular_speed: f64,
}

impl ObjectSpec {
    pub fn new(name: impl Into<String>, angular_speed: f64) -> Self {
        Self {
            name: name.into(),
            angular_speed,
        }
    }
}

/// Loop and schedule parameters.  The defaults reproduce the reference setup.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub loop_rate_hz: f64,
    pub timer_period_secs: f64,
    pub publish_orientation: bool,
    pub objects: Vec<ObjectSpec>,
}

pub const DEFAULT_LOOP_RATE_HZ: f64 = 50.0;
pub const DEFAULT_TIMER_PERIOD_SECS: f64 = 0.05;

/// Slowest accepted loop rate: one iteration every 1000 s.
pub const MIN_LOOP_RATE_HZ: f64 = 1e-3;

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            loop_rate_hz: DEFAULT_LOOP_RATE_HZ,
            timer_period_secs: DEFAULT_TIMER_PERIOD_SECS,
            publish_orientation: false,
            objects: vec![
                ObjectSpec::new("bear_doll", 0.5),
                ObjectSpec::new("dog_doll", 0.6),
                ObjectSpec::new("rabbit_doll", 0.7),
            ],
        }
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl ControllerConfig {
    /// Replace non-positive or non-finite rates, and loop rates below
    /// [`MIN_LOOP_RATE_HZ`], with the defaults.
    pub fn validated(mut self) -> Self {
        if !positive(self.loop_rate_hz) || self.loop_rate_hz < MIN_LOOP_RATE_HZ {
            warn!(loop_rate_hz = self.loop_rate_hz, "invalid loop rate, using default");
            self.loop_rate_hz = DEFAULT_LOOP_RATE_HZ;
        }
        if !positive(self.timer_period_secs) {
            warn!(
                timer_period_secs = self.timer_period_secs,
                "invalid timer period, using default"
            );
            self.timer_period_secs = DEFAULT_TIMER_PERIOD_SECS;
        }
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rate
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-rate sleeper.  Boundaries are spaced exactly one period apart; if an
/// iteration overruns its slot the schedule re-anchors at the current instant
/// instead of bursting to catch up.
#[derive(Debug)]
pub struct Rate {
    period: Duration,
    next: Instant,
}

impl Rate {
    /// A rate whose period is not representable as a [`Duration`] falls
    /// back to [`DEFAULT_LOOP_RATE_HZ`].
    pub fn new(hz: f64) -> Self {
        let period = Duration::try_from_secs_f64(1.0 / hz).unwrap_or_else(|_| {
            warn!(hz, "unusable loop rate, using default");
            Duration::from_secs_f64(1.0 / DEFAULT_LOOP_RATE_HZ)
        });
        Self {
            period,
            next: Instant::now(),
        }
    }

    /// Sleep until the next boundary.
    pub fn sleep(&mut self) {
        self.next += self.period;
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
        } else {
            self.next = now;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ObjectController
// ────────────────────────────────────────────────────────────────────────────

/// Lifecycle of the controller loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Constructed; bootstrap has not run.
    Starting,
    Running,
    ShuttingDown,
}

/// Owns the registry, the dispatcher, and the collaborators they talk to.
pub struct ObjectController<T, I, C> {
    config: ControllerConfig,
    transport: T,
    input: I,
    clock: C,
    registry: TimerRegistry,
    dispatcher: CommandDispatcher,
    state: ControllerState,
    buf: [u8; READ_BUFFER_LEN],
}

impl<T: Transport, I: InputSource, C: Clock> ObjectController<T, I, C> {
    pub fn new(config: ControllerConfig, transport: T, input: I, clock: C) -> Self {
        let config = config.validated();
        let registry =
            TimerRegistry::new(config.timer_period_secs).with_orientation(config.publish_orientation);
        Self {
            config,
            transport,
            input,
            clock,
            registry,
            dispatcher: CommandDispatcher::new(),
            state: ControllerState::Starting,
            buf: [0; READ_BUFFER_LEN],
        }
    }

    /// Register every configured object and enter [`ControllerState::Running`].
    pub fn bootstrap(&mut self) {
        let objects = self.config.objects.clone();
        for spec in objects {
            self.register(spec.name, spec.angular_speed);
        }
        self.state = ControllerState::Running;
        info!(
            objects = self.registry.len(),
            loop_rate_hz = self.config.loop_rate_hz,
            "object controller running"
        );
    }

    /// Put `name` on a recurring schedule starting now, replacing any
    /// existing schedule for it.
    pub fn register(&mut self, name: impl Into<String>, angular_speed: f64) -> Option<TrackedObject> {
        let now = self.clock.now();
        self.registry.register(name, angular_speed, now)
    }

    /// Stop the schedule for `name`, if any.
    pub fn unregister(&mut self, name: &str) -> Option<TrackedObject> {
        self.registry.unregister(name)
    }

    /// Poll input once and dispatch the last byte read.
    ///
    /// # Errors
    ///
    /// Propagates [`ObjctlError::Input`] from the input source.
    pub fn poll_input(&mut self) -> Result<Option<Command>, ObjctlError> {
        let n = self.input.poll_read(&mut self.buf)?.min(self.buf.len());
        if n == 0 {
            return Ok(None);
        }
        if n > 1 {
            debug!(discarded = n - 1, "only the last keystroke of the read is used");
        }
        let byte = self.buf[n - 1];
        Ok(self.dispatcher.dispatch(byte, &mut self.transport))
    }

    /// Fire due schedules and deliver inbound messages.  Returns the number
    /// of schedules fired.
    pub fn spin_once(&mut self) -> usize {
        let now = self.clock.now();
        let fired = self.registry.fire_due(now, &mut self.transport);
        match self.transport.poll_inbound() {
            Ok(messages) => {
                for message in messages {
                    info!("Subscribe Message: {message}");
                }
            }
            Err(e) => warn!(error = %e, "inbound poll failed"),
        }
        fired
    }

    /// One full iteration minus the sleep.
    pub fn run_iteration(&mut self) -> Result<(), ObjctlError> {
        self.poll_input()?;
        self.spin_once();
        Ok(())
    }

    /// Run until `shutdown` is set or the input stream breaks.
    ///
    /// Bootstraps first if that has not happened yet.  On return the state is
    /// [`ControllerState::ShuttingDown`].
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), ObjctlError> {
        if self.state == ControllerState::Starting {
            self.bootstrap();
        }
        let mut rate = Rate::new(self.config.loop_rate_hz);
        let result = loop {
            if shutdown.load(Ordering::SeqCst) {
                break Ok(());
            }
            match self.run_iteration() {
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "input stream failed");
                    break Err(e);
                }
                Err(e) => warn!(error = %e, "iteration failed"),
                Ok(()) => {}
            }
            rate.sleep();
        };
        self.state = ControllerState::ShuttingDown;
        info!("object controller shutting down");
        result
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }
}
