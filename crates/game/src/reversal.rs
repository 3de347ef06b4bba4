//! Host-side time reversal.
//!
//! While an undo snaps the character back, the level is scrubbed backwards
//! so platforms return to where they were when the undone jump started. The
//! driver listens for `UndoBegan` and `UndoCompleted` and turns them into a
//! signed step for scrubbable objects.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hopper_physics::events::{handler, Handler, Reversal, UndoBegan, UndoCompleted};
use hopper_physics::EventBus;

#[derive(Debug, Default)]
struct Signals {
    began: Option<UndoBegan>,
    completed: bool,
}

pub struct TimeReversal {
    bus: Arc<EventBus>,
    signals: Arc<Mutex<Signals>>,
    on_began: Handler<UndoBegan>,
    on_completed: Handler<UndoCompleted>,
    reversal_delta: Option<f32>,
}

impl std::fmt::Debug for TimeReversal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeReversal")
            .field("reversal_delta", &self.reversal_delta)
            .finish_non_exhaustive()
    }
}

impl TimeReversal {
    pub fn new(bus: Arc<EventBus>) -> Self {
        let signals = Arc::new(Mutex::new(Signals::default()));

        let on_began = {
            let signals = signals.clone();
            handler(move |event: &UndoBegan| {
                lock(&signals).began = Some(*event);
                Ok(())
            })
        };
        let on_completed = {
            let signals = signals.clone();
            handler(move |_: &UndoCompleted| {
                lock(&signals).completed = true;
                Ok(())
            })
        };
        bus.subscribe(on_began.clone());
        bus.subscribe(on_completed.clone());

        Self {
            bus,
            signals,
            on_began,
            on_completed,
            reversal_delta: None,
        }
    }

    pub fn is_reversing(&self) -> bool {
        self.reversal_delta.is_some()
    }

    /// Per-step delta while reversing.
    pub fn reversal_delta(&self) -> Option<f32> {
        self.reversal_delta
    }

    /// Consume undo signals and return the step scrubbable objects should
    /// advance by: `fixed_dt` normally, the negative reversal delta while an
    /// undo is in flight.
    pub fn update(&mut self, now: f64, fixed_dt: f32) -> f32 {
        let (began, completed) = {
            let mut signals = lock(&self.signals);
            (signals.began.take(), std::mem::take(&mut signals.completed))
        };

        if completed && self.reversal_delta.take().is_some() {
            log::debug!("time reversal ended at {now:.3}");
            self.bus.publish(&Reversal {
                is_reversing: false,
                reversal_fixed_delta: 0.0,
            });
        }

        if let Some(began) = began {
            let steps = (began.snap_time / fixed_dt).ceil().max(1.0);
            let delta = ((began.snapshot.timestamp - now) / f64::from(steps)) as f32;
            log::debug!("time reversal to {:.3} over {steps} steps", began.snapshot.timestamp);
            self.reversal_delta = Some(delta);
            self.bus.publish(&Reversal {
                is_reversing: true,
                reversal_fixed_delta: delta,
            });
        }

        self.reversal_delta.unwrap_or(fixed_dt)
    }
}

impl Drop for TimeReversal {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.on_began);
        self.bus.unsubscribe(&self.on_completed);
    }
}

fn lock(signals: &Mutex<Signals>) -> MutexGuard<'_, Signals> {
    signals.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use hopper_physics::JumpSnapshot;

    fn began(timestamp: f64) -> UndoBegan {
        UndoBegan {
            snapshot: JumpSnapshot {
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                velocity: Vec3::ZERO,
                timestamp,
            },
            snap_time: 0.25,
        }
    }

    #[test]
    fn test_forward_without_undo() {
        let bus = Arc::new(EventBus::new());
        let mut reversal = TimeReversal::new(bus);

        assert_eq!(reversal.update(1.0, 0.02), 0.02);
        assert!(!reversal.is_reversing());
    }

    #[test]
    fn test_reverses_between_undo_events() {
        let bus = Arc::new(EventBus::new());
        let mut reversal = TimeReversal::new(bus.clone());
        let published = Arc::new(Mutex::new(Vec::new()));
        {
            let published = published.clone();
            bus.subscribe::<Reversal>(handler(move |event: &Reversal| {
                published.lock().unwrap().push(*event);
                Ok(())
            }));
        }

        // 2.0 s back over ceil(0.25 / 0.02) = 13 steps
        bus.publish(&began(1.0));
        let delta = reversal.update(3.0, 0.02);
        assert!((delta - (-2.0 / 13.0)).abs() < 1e-6, "delta={delta}");
        assert_eq!(reversal.update(3.02, 0.02), delta, "Delta holds until the undo completes");

        bus.publish(&UndoCompleted { time: 3.3 });
        assert_eq!(reversal.update(3.3, 0.02), 0.02);

        let published = published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert!(published[0].is_reversing);
        assert!(!published[1].is_reversing);
        assert_eq!(published[1].reversal_fixed_delta, 0.0);
    }

    #[test]
    fn test_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::new());
        drop(TimeReversal::new(bus.clone()));

        assert!(bus.channel::<UndoBegan>().is_empty());
        assert!(bus.channel::<UndoCompleted>().is_empty());
    }
}
