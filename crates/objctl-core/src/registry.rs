//! [`TimerRegistry`] – recurring pose schedules keyed by object name.
//!
//! Each entry is plain data ([`TrackedObject`] plus the index of its next
//! firing); no per-object closures are captured.  A single
//! [`TimerRegistry::fire_due`] step walks the registry, computes the motion
//! sample for every due object at the *current* time, and publishes it.
//!
//! Registering a name that is already present replaces its schedule, so there
//! is never more than one schedule publishing for the same object.

use std::collections::BTreeMap;

use objctl_middleware::Transport;
use objctl_types::TrackedObject;
use tracing::{debug, info, warn};

use crate::motion::position_at;

/// Slack applied when comparing the clock against a due time, so a tick that
/// lands exactly on a period boundary is not lost to rounding.
const DUE_EPSILON: f64 = 1e-9;

/// A due time further ahead of the clock than this many periods can only be
/// the result of the clock going backwards.
const STEP_BACK_FACTOR: f64 = 1.5;

struct ScheduledTask {
    object: TrackedObject,
    /// Firing `n` is due at `phase_origin + n * period`.  Negative once the
    /// clock has stepped back past the phase origin.
    next_firing: f64,
}

impl ScheduledTask {
    fn due_at(&self, period: f64) -> f64 {
        self.object.phase_origin + self.next_firing * period
    }
}

/// Owns one recurring schedule per tracked object name.
pub struct TimerRegistry {
    period: f64,
    publish_orientation: bool,
    tasks: BTreeMap<String, ScheduledTask>,
}

impl TimerRegistry {
    /// Create an empty registry whose schedules fire every `period` seconds.
    pub fn new(period: f64) -> Self {
        Self {
            period,
            publish_orientation: false,
            tasks: BTreeMap::new(),
        }
    }

    /// Attach the heading quaternion to every published pose.
    pub fn with_orientation(mut self, publish_orientation: bool) -> Self {
        self.publish_orientation = publish_orientation;
        self
    }

    /// Arm a recurring schedule for `name`, capturing `now` as its phase
    /// origin.  The first firing is due one period later.
    ///
    /// Returns the object whose schedule was torn down, if `name` was already
    /// registered.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        angular_speed: f64,
        now: f64,
    ) -> Option<TrackedObject> {
        let name = name.into();
        let task = ScheduledTask {
            object: TrackedObject {
                name: name.clone(),
                angular_speed,
                phase_origin: now,
            },
            next_firing: 1.0,
        };
        let replaced = self.tasks.insert(name.clone(), task).map(|old| old.object);
        match &replaced {
            Some(old) => info!(
                object = %name,
                angular_speed,
                previous_speed = old.angular_speed,
                "replaced recurring schedule"
            ),
            None => info!(object = %name, angular_speed, period = self.period, "registered recurring schedule"),
        }
        replaced
    }

    /// Remove the schedule for `name`.  Absent names are ignored.
    pub fn unregister(&mut self, name: &str) -> Option<TrackedObject> {
        let removed = self.tasks.remove(name).map(|task| task.object);
        if removed.is_some() {
            info!(object = %name, "unregistered recurring schedule");
        }
        removed
    }

    /// The tracked object registered under `name`.
    pub fn get(&self, name: &str) -> Option<&TrackedObject> {
        self.tasks.get(name).map(|task| &task.object)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Registered names, in firing order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Fire every schedule that is due at `now`, publishing one pose per due
    /// object.  Returns the number of schedules fired.
    ///
    /// A schedule fires at most once per call; if several periods were missed
    /// the next firing moves to the first boundary after `now`.  A due time
    /// more than one period ahead of `now` means the clock stepped backwards:
    /// that schedule fires immediately and realigns to `now`.  Publish
    /// failures are logged and do not affect the schedule.
    pub fn fire_due<T: Transport + ?Sized>(&mut self, now: f64, transport: &mut T) -> usize {
        let period = self.period;
        let mut fired = 0;
        for task in self.tasks.values_mut() {
            let due_at = task.due_at(period);
            let stepped_back = due_at - now > period * STEP_BACK_FACTOR;
            if now + DUE_EPSILON < due_at {
                if !stepped_back {
                    continue;
                }
                warn!(
                    object = %task.object.name,
                    behind = due_at - now,
                    "clock stepped backwards, realigning schedule"
                );
            }
            let object = &task.object;
            let sample = position_at(object.phase_origin, object.angular_speed, now);
            let pose = sample.to_pose(&object.name, self.publish_orientation);
            match transport.publish_pose(&pose) {
                Ok(()) => debug!(
                    object = %object.name,
                    x = sample.x,
                    y = sample.y,
                    heading = sample.heading,
                    "published pose"
                ),
                Err(e) => warn!(object = %object.name, error = %e, "pose publish failed"),
            }
            let mut next = ((now - object.phase_origin) / period).floor() + 1.0;
            if !stepped_back {
                next = next.max(task.next_firing + 1.0);
            }
            while object.phase_origin + next * period <= now + DUE_EPSILON {
                next += 1.0;
            }
            task.next_firing = next;
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::RecordingTransport;

    const PERIOD: f64 = 0.05;
    const T0: f64 = 100.0;

    #[test]
    fn nothing_fires_before_the_first_period() {
        let mut registry = TimerRegistry::new(PERIOD);
        let mut transport = RecordingTransport::new();
        registry.register("bear_doll", 0.5, T0);

        assert_eq!(registry.fire_due(T0, &mut transport), 0);
        assert_eq!(registry.fire_due(T0 + 0.049, &mut transport), 0);
        assert!(transport.poses().is_empty());
    }

    #[test]
    fn headings_follow_phase_accumulator_each_period() {
        let mut registry = TimerRegistry::new(PERIOD);
        let mut transport = RecordingTransport::new();
        registry.register("bear_doll", 0.5, T0);

        for k in 1..=3 {
            let now = T0 + k as f64 * PERIOD;
            assert_eq!(registry.fire_due(now, &mut transport), 1, "tick {k}");
            // Repeating the same instant must not fire again.
            assert_eq!(registry.fire_due(now, &mut transport), 0, "tick {k} repeat");
        }

        let poses = transport.poses();
        assert_eq!(poses.len(), 3);
        let headings: Vec<f64> = poses
            .iter()
            .map(|p| p.translation.y.atan2(p.translation.x))
            .collect();
        for (k, pose) in poses.iter().enumerate() {
            let now = T0 + (k + 1) as f64 * PERIOD;
            let expected = position_at(T0, 0.5, now);
            assert!((pose.translation.x - expected.x).abs() < 1e-9);
            assert!((pose.translation.y - expected.y).abs() < 1e-9);
        }
        // The per-tick phase step is 0.5 * 0.05 = 0.025 rad.
        for pair in headings.windows(2) {
            let mut step = pair[1] - pair[0];
            if step < -std::f64::consts::PI {
                step += std::f64::consts::TAU;
            }
            assert!((step - 0.025).abs() < 1e-9);
        }
    }

    #[test]
    fn register_same_name_twice_keeps_one_schedule() {
        let mut registry = TimerRegistry::new(PERIOD);
        let mut transport = RecordingTransport::new();

        assert!(registry.register("dog_doll", 0.6, T0).is_none());
        let replaced = registry.register("dog_doll", 1.2, T0 + 0.01);
        assert_eq!(replaced.map(|o| o.angular_speed), Some(0.6));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("dog_doll").map(|o| o.angular_speed), Some(1.2));

        assert_eq!(registry.fire_due(T0 + 1.0, &mut transport), 1);
        assert_eq!(transport.poses().len(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut registry = TimerRegistry::new(PERIOD);
        registry.register("rabbit_doll", 0.7, T0);

        assert!(registry.unregister("rabbit_doll").is_some());
        assert!(registry.unregister("rabbit_doll").is_none());
        assert!(registry.unregister("never_registered").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn missed_periods_fire_once_then_realign() {
        let mut registry = TimerRegistry::new(PERIOD);
        let mut transport = RecordingTransport::new();
        registry.register("bear_doll", 0.5, T0);

        // Five periods late: one catch-up firing, not five.
        assert_eq!(registry.fire_due(T0 + 5.0 * PERIOD + 0.01, &mut transport), 1);
        assert_eq!(registry.fire_due(T0 + 5.0 * PERIOD + 0.02, &mut transport), 0);
        assert_eq!(registry.fire_due(T0 + 6.0 * PERIOD, &mut transport), 1);
        assert_eq!(transport.poses().len(), 2);
    }

    #[test]
    fn fires_every_object_in_name_order() {
        let mut registry = TimerRegistry::new(PERIOD);
        let mut transport = RecordingTransport::new();
        registry.register("rabbit_doll", 0.7, T0);
        registry.register("bear_doll", 0.5, T0);
        registry.register("dog_doll", 0.6, T0);

        assert_eq!(registry.fire_due(T0 + PERIOD, &mut transport), 3);
        let names: Vec<String> = transport
            .poses()
            .into_iter()
            .map(|p| p.child_frame_id)
            .collect();
        assert_eq!(names, ["bear_doll", "dog_doll", "rabbit_doll"]);
    }

    #[test]
    fn publish_failures_do_not_stall_the_schedule() {
        let mut registry = TimerRegistry::new(PERIOD);
        let mut transport = RecordingTransport::new();
        transport.set_failing(true);
        registry.register("bear_doll", 0.5, T0);

        assert_eq!(registry.fire_due(T0 + PERIOD, &mut transport), 1);
        transport.set_failing(false);
        assert_eq!(registry.fire_due(T0 + 2.0 * PERIOD, &mut transport), 1);
        assert_eq!(transport.poses().len(), 1);
    }

    #[test]
    fn orientation_is_attached_when_enabled() {
        let mut registry = TimerRegistry::new(PERIOD).with_orientation(true);
        let mut transport = RecordingTransport::new();
        registry.register("bear_doll", 0.5, T0);
        registry.fire_due(T0 + PERIOD, &mut transport);

        let pose = &transport.poses()[0];
        assert!(pose.rotation.is_some());
    }

    #[test]
    fn backward_clock_step_realigns_instead_of_stalling() {
        let mut registry = TimerRegistry::new(PERIOD);
        let mut transport = RecordingTransport::new();
        registry.register("bear_doll", 0.5, T0);
        assert_eq!(registry.fire_due(T0 + PERIOD, &mut transport), 1);

        // One minute back, then ten seconds of 20 ms ticks.
        let restart = T0 + PERIOD - 60.0;
        let mut fired = 0;
        for i in 0..500 {
            fired += registry.fire_due(restart + i as f64 * 0.02, &mut transport);
        }
        // Every 50 ms for ten seconds, give or take the boundary ticks.
        assert!((195..=205).contains(&fired), "fired {fired}");

        let last = transport.poses().pop().expect("pose published");
        let expected = position_at(T0, 0.5, restart + 499.0 * 0.02);
        let tolerance = 0.5 * PERIOD + 1e-9;
        assert!((last.translation.x - expected.x).abs() <= tolerance);
        assert!((last.translation.y - expected.y).abs() <= tolerance);
    }

    #[test]
    fn small_jitter_backwards_does_not_fire_early() {
        let mut registry = TimerRegistry::new(PERIOD);
        let mut transport = RecordingTransport::new();
        registry.register("bear_doll", 0.5, T0);
        assert_eq!(registry.fire_due(T0 + PERIOD, &mut transport), 1);
        // Within one period of the next due time: just wait.
        assert_eq!(registry.fire_due(T0 + PERIOD - 0.01, &mut transport), 0);
        assert_eq!(registry.fire_due(T0 + 2.0 * PERIOD, &mut transport), 1);
    }
}
