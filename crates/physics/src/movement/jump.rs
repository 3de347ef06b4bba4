//! Jump arbitration.
//!
//! A press that cannot jump right away is queued and retried every step and
//! on landing until `queue_time` runs out. Leaving the ground opens a coyote
//! window during which a jump is still accepted. One jump per grounding.

use std::sync::Arc;

use crate::body::CharacterBody;
use crate::events::{EventBus, PreJumpCalculation};

use super::config::MovementConfig;
use super::integrator::VelocityIntegrator;

/// Jump timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpTiming {
    /// Vertical speed along body-up set by a jump (meters/second).
    pub jump_speed: f32,
    /// How long a queued press keeps retrying (seconds).
    pub queue_time: f32,
    /// Grace after leaving the ground (seconds).
    pub coyote_time: f32,
}

impl From<&MovementConfig> for JumpTiming {
    fn from(config: &MovementConfig) -> Self {
        Self {
            jump_speed: config.jump_speed,
            queue_time: config.queue_time,
            coyote_time: config.coyote_time,
        }
    }
}

#[derive(Debug)]
pub struct JumpArbiter {
    timing: JumpTiming,
    bus: Arc<EventBus>,
    last_grounded_time: f64,
    queued_at: Option<f64>,
    jumped_since_grounded: bool,
}

impl JumpArbiter {
    pub fn new(timing: JumpTiming, bus: Arc<EventBus>) -> Self {
        Self {
            timing,
            bus,
            last_grounded_time: f64::NEG_INFINITY,
            queued_at: None,
            jumped_since_grounded: false,
        }
    }

    pub fn is_queued(&self) -> bool {
        self.queued_at.is_some()
    }

    pub fn jumped_since_grounded(&self) -> bool {
        self.jumped_since_grounded
    }

    pub fn last_grounded_time(&self) -> f64 {
        self.last_grounded_time
    }

    /// Drop a queued press without jumping.
    pub fn clear_queue(&mut self) {
        self.queued_at = None;
    }

    /// Whether a jump would be accepted right now.
    pub fn can_jump(&self, now: f64, grounded: bool) -> bool {
        if self.jumped_since_grounded {
            return false;
        }
        grounded || now - self.last_grounded_time <= f64::from(self.timing.coyote_time.max(0.0))
    }

    /// Jump press edge. Jumps now if admissible, otherwise queues the press.
    /// Returns true if the jump executed.
    pub fn request_jump(
        &mut self,
        now: f64,
        grounded: bool,
        body: &CharacterBody,
        integrator: &mut VelocityIntegrator,
    ) -> bool {
        if self.try_jump(now, grounded, body, integrator) {
            return true;
        }
        self.queued_at = Some(now);
        false
    }

    /// Per-step bookkeeping: refresh the grounded stamp, expire or retry the queue.
    pub fn tick(
        &mut self,
        now: f64,
        grounded: bool,
        body: &CharacterBody,
        integrator: &mut VelocityIntegrator,
    ) -> bool {
        if grounded {
            self.last_grounded_time = now;
        }

        let Some(queued_at) = self.queued_at else {
            return false;
        };
        if now - queued_at > f64::from(self.timing.queue_time.max(0.0)) {
            log::debug!("queued jump from {queued_at:.3} expired");
            self.queued_at = None;
            return false;
        }
        self.try_jump(now, grounded, body, integrator)
    }

    /// Landing resets the per-grounding jump and retries a live queue.
    pub fn on_landed(
        &mut self,
        now: f64,
        body: &CharacterBody,
        integrator: &mut VelocityIntegrator,
    ) -> bool {
        self.jumped_since_grounded = false;
        self.last_grounded_time = now;

        match self.queued_at {
            Some(queued_at) if now - queued_at <= f64::from(self.timing.queue_time.max(0.0)) => {
                self.try_jump(now, true, body, integrator)
            }
            _ => false,
        }
    }

    /// Leaving the ground starts the coyote window.
    pub fn on_ungrounded(&mut self, now: f64) {
        self.last_grounded_time = now;
    }

    fn try_jump(
        &mut self,
        now: f64,
        grounded: bool,
        body: &CharacterBody,
        integrator: &mut VelocityIntegrator,
    ) -> bool {
        if !self.can_jump(now, grounded) {
            return false;
        }

        let velocity = integrator.pending_velocity(body);
        self.bus.publish(&PreJumpCalculation {
            time: now,
            position: body.position,
            rotation: body.rotation,
            velocity,
        });

        // Downward speed is cancelled, planar speed kept
        let up = body.up();
        let vertical = velocity.dot(up);
        integrator.queue_velocity_change(up * (self.timing.jump_speed - vertical));

        self.queued_at = None;
        self.jumped_since_grounded = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyConfig;
    use crate::events::handler;
    use glam::Vec3;
    use std::sync::Mutex;

    const DT: f64 = 0.02;

    struct Rig {
        arbiter: JumpArbiter,
        body: CharacterBody,
        integrator: VelocityIntegrator,
    }

    impl Rig {
        fn new() -> Self {
            let bus = Arc::new(EventBus::new());
            let timing = JumpTiming {
                jump_speed: 6.0,
                queue_time: 0.12,
                coyote_time: 0.12,
            };
            Self {
                arbiter: JumpArbiter::new(timing, bus.clone()),
                body: CharacterBody::new(Vec3::ZERO, BodyConfig::default()),
                integrator: VelocityIntegrator::new(MovementConfig::default(), bus),
            }
        }

        fn request(&mut self, now: f64, grounded: bool) -> bool {
            self.arbiter
                .request_jump(now, grounded, &self.body, &mut self.integrator)
        }

        fn tick(&mut self, now: f64, grounded: bool) -> bool {
            self.arbiter.tick(now, grounded, &self.body, &mut self.integrator)
        }

        fn land(&mut self, now: f64) -> bool {
            self.arbiter.on_landed(now, &self.body, &mut self.integrator)
        }
    }

    #[test]
    fn test_grounded_jump() {
        let mut rig = Rig::new();
        rig.tick(0.0, true);

        assert!(rig.request(0.0, true));
        assert!(rig.arbiter.jumped_since_grounded());

        rig.integrator.apply_queued(&mut rig.body);
        assert_eq!(rig.body.velocity(), Vec3::new(0.0, 6.0, 0.0));
    }

    #[test]
    fn test_jump_cancels_fall_keeps_planar() {
        let mut rig = Rig::new();
        rig.body.set_velocity(Vec3::new(3.0, -4.0, 1.0));

        assert!(rig.request(0.0, true));
        rig.integrator.apply_queued(&mut rig.body);

        let velocity = rig.body.velocity();
        assert!((velocity - Vec3::new(3.0, 6.0, 1.0)).length() < 1e-5, "v={velocity}");
    }

    #[test]
    fn test_one_jump_per_grounding() {
        let mut rig = Rig::new();
        assert!(rig.request(0.0, true));
        assert!(!rig.request(DT, true), "Second jump before landing must be rejected");
    }

    #[test]
    fn test_coyote_time() {
        let mut rig = Rig::new();
        rig.tick(0.0, true);
        rig.arbiter.on_ungrounded(0.0);

        assert!(rig.arbiter.can_jump(0.1, false));
        assert!(!rig.arbiter.can_jump(0.2, false), "Outside coyote time");
        assert!(rig.request(0.1, false));
    }

    #[test]
    fn test_queued_jump_fires_on_landing() {
        let mut rig = Rig::new();
        rig.tick(0.0, true);
        rig.arbiter.on_ungrounded(0.0);

        // Pressed 0.05 s before touching down, well after coyote time
        assert!(!rig.request(0.95, false));
        assert!(rig.arbiter.is_queued());
        assert!(!rig.tick(0.97, false));

        assert!(rig.land(1.0), "Queued jump should fire on the landing step");
        assert!(!rig.arbiter.is_queued());
    }

    #[test]
    fn test_queue_expires() {
        let mut rig = Rig::new();
        rig.arbiter.on_ungrounded(0.0);

        rig.request(1.0, false);
        rig.tick(1.1, false);
        assert!(rig.arbiter.is_queued());
        rig.tick(1.14, false);
        assert!(!rig.arbiter.is_queued(), "Queue should expire after queue_time");

        assert!(!rig.land(1.2), "Expired press must not jump on landing");
    }

    #[test]
    fn test_queued_jump_retries_each_step() {
        let mut rig = Rig::new();
        rig.arbiter.on_ungrounded(0.0);
        rig.request(1.0, false);

        // Grounded without a Landed edge (e.g. sensor already grounded)
        assert!(rig.tick(1.04, true));
    }

    #[test]
    fn test_publishes_pre_jump_before_change() {
        let mut rig = Rig::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            rig.arbiter.bus.subscribe::<PreJumpCalculation>(handler(
                move |event: &PreJumpCalculation| {
                    seen.lock().unwrap().push(event.velocity);
                    Ok(())
                },
            ));
        }
        rig.body.set_velocity(Vec3::new(1.0, 0.0, 0.0));

        rig.request(0.0, true);

        assert_eq!(*seen.lock().unwrap(), vec![Vec3::new(1.0, 0.0, 0.0)]);
    }
}
