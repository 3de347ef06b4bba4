//! Jump history.
//!
//! Every jump leaves two signals on the bus: `PreJumpCalculation` on the
//! step the jump executes and `Ungrounded` a few steps later when the feet
//! clear the probe. The recorder pairs them into one [`JumpSnapshot`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::events::{handler, EventBus, Handler, Landed, PreJumpCalculation, Ungrounded};

/// Pose and velocity at the start of a jump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpSnapshot {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Largest gap between the two signals of one jump (seconds).
    pub merge_window: f32,
    /// Ungrounded signals this soon after a landing are ignored (seconds).
    pub min_time_after_landing: f32,
    /// Oldest snapshots are dropped beyond this many. Zero means unbounded.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            merge_window: 0.15,
            min_time_after_landing: 0.1,
            capacity: 32,
        }
    }
}

#[derive(Debug)]
struct Recorder {
    config: HistoryConfig,
    stack: VecDeque<JumpSnapshot>,
    paused: bool,
    last_landing: f64,
    pending_ungrounded: Option<Ungrounded>,
    pending_pre_jump: Option<PreJumpCalculation>,
}

impl Recorder {
    fn merge_window(&self) -> f64 {
        f64::from(self.config.merge_window.max(0.0))
    }

    fn push(&mut self, snapshot: JumpSnapshot) {
        if self.config.capacity > 0 && self.stack.len() >= self.config.capacity {
            self.stack.pop_front();
        }
        self.stack.push_back(snapshot);
    }

    fn on_ungrounded(&mut self, event: &Ungrounded) {
        self.expire(event.time);
        if self.paused {
            return;
        }
        if event.time - self.last_landing < f64::from(self.config.min_time_after_landing) {
            log::debug!("ungrounded at {:.3} too soon after landing, ignored", event.time);
            return;
        }

        match self.pending_pre_jump.take() {
            Some(pre_jump) if (event.time - pre_jump.time).abs() <= self.merge_window() => {
                self.push(JumpSnapshot {
                    position: event.position,
                    rotation: event.rotation,
                    velocity: pre_jump.velocity,
                    timestamp: pre_jump.time,
                });
            }
            pre_jump => {
                self.pending_pre_jump = pre_jump;
                self.pending_ungrounded = Some(*event);
            }
        }
    }

    fn on_pre_jump(&mut self, event: &PreJumpCalculation) {
        self.expire(event.time);
        if self.paused {
            return;
        }

        match self.pending_ungrounded.take() {
            Some(ungrounded) if (event.time - ungrounded.time).abs() <= self.merge_window() => {
                self.push(JumpSnapshot {
                    position: ungrounded.position,
                    rotation: ungrounded.rotation,
                    velocity: event.velocity,
                    timestamp: event.time,
                });
            }
            _ => {
                if let Some(previous) = self.pending_pre_jump.replace(*event) {
                    self.push(lone_pre_jump(&previous));
                }
            }
        }
    }

    fn on_landed(&mut self, event: &Landed) {
        self.last_landing = event.time;
        self.expire(event.time);
    }

    /// Commit a lone pre-jump and drop a lone ungrounded once their partner
    /// can no longer arrive.
    fn expire(&mut self, now: f64) {
        let window = self.merge_window();
        if let Some(pre_jump) = self.pending_pre_jump {
            if now - pre_jump.time > window {
                self.pending_pre_jump = None;
                self.push(lone_pre_jump(&pre_jump));
            }
        }
        if let Some(ungrounded) = self.pending_ungrounded {
            if now - ungrounded.time > window {
                self.pending_ungrounded = None;
            }
        }
    }
}

fn lone_pre_jump(event: &PreJumpCalculation) -> JumpSnapshot {
    JumpSnapshot {
        position: event.position,
        rotation: event.rotation,
        velocity: event.velocity,
        timestamp: event.time,
    }
}

/// LIFO stack of jump snapshots, fed from the event bus.
///
/// The bus subscriptions are removed when the history is dropped.
pub struct JumpHistory {
    recorder: Arc<Mutex<Recorder>>,
    bus: Arc<EventBus>,
    on_ungrounded: Handler<Ungrounded>,
    on_landed: Handler<Landed>,
    on_pre_jump: Handler<PreJumpCalculation>,
}

impl std::fmt::Debug for JumpHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JumpHistory")
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}

impl JumpHistory {
    pub fn new(config: HistoryConfig, bus: Arc<EventBus>) -> Self {
        let recorder = Arc::new(Mutex::new(Recorder {
            config,
            stack: VecDeque::new(),
            paused: false,
            last_landing: f64::NEG_INFINITY,
            pending_ungrounded: None,
            pending_pre_jump: None,
        }));

        let on_ungrounded = {
            let recorder = recorder.clone();
            handler(move |event: &Ungrounded| {
                lock(&recorder).on_ungrounded(event);
                Ok(())
            })
        };
        let on_landed = {
            let recorder = recorder.clone();
            handler(move |event: &Landed| {
                lock(&recorder).on_landed(event);
                Ok(())
            })
        };
        let on_pre_jump = {
            let recorder = recorder.clone();
            handler(move |event: &PreJumpCalculation| {
                lock(&recorder).on_pre_jump(event);
                Ok(())
            })
        };

        bus.subscribe(on_ungrounded.clone());
        bus.subscribe(on_landed.clone());
        bus.subscribe(on_pre_jump.clone());

        Self {
            recorder,
            bus,
            on_ungrounded,
            on_landed,
            on_pre_jump,
        }
    }

    fn recorder(&self) -> MutexGuard<'_, Recorder> {
        lock(&self.recorder)
    }

    pub fn push(&self, snapshot: JumpSnapshot) {
        self.recorder().push(snapshot);
    }

    /// Most recent snapshot, removed. `None` leaves the history untouched.
    pub fn pop(&self) -> Option<JumpSnapshot> {
        self.recorder().stack.pop_back()
    }

    pub fn peek(&self) -> Option<JumpSnapshot> {
        self.recorder().stack.back().copied()
    }

    pub fn len(&self) -> usize {
        self.recorder().stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorder().stack.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.recorder().config.capacity
    }

    /// Drop every snapshot and any half-recorded jump.
    pub fn clear(&self) {
        let mut recorder = self.recorder();
        recorder.stack.clear();
        recorder.pending_pre_jump = None;
        recorder.pending_ungrounded = None;
    }

    /// Stop recording. Half-recorded jumps are discarded.
    pub fn pause(&self) {
        let mut recorder = self.recorder();
        recorder.paused = true;
        recorder.pending_pre_jump = None;
        recorder.pending_ungrounded = None;
    }

    pub fn resume(&self) {
        self.recorder().paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.recorder().paused
    }

    /// Let pending signals expire without waiting for the next event.
    pub fn tick(&self, now: f64) {
        self.recorder().expire(now);
    }
}

impl Drop for JumpHistory {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.on_ungrounded);
        self.bus.unsubscribe(&self.on_landed);
        self.bus.unsubscribe(&self.on_pre_jump);
    }
}

fn lock(recorder: &Mutex<Recorder>) -> MutexGuard<'_, Recorder> {
    recorder.lock().unwrap_or_else(PoisonError::into_inner)
}
