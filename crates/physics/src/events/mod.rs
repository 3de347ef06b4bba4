//! Typed publish/subscribe between locomotion components.
//!
//! Every event type owns one [`EventChannel`] inside the [`EventBus`]. The
//! table is fixed at compile time: [`Event::channel`] resolves the channel for
//! a payload type without any runtime lookup.
//!
//! ```ignore
//! let bus = Arc::new(EventBus::new());
//! bus.subscribe::<Landed>(handler(|landed| {
//!     log::info!("landed at {}", landed.position);
//!     Ok(())
//! }));
//! bus.publish(&Landed { time: 1.0, position: Vec3::ZERO });
//! ```

mod channel;
mod types;

pub use channel::{handler, EventChannel, Handler};
pub use types::{
    DashCooldownFinished, DashExecuted, GroundedChanged, JumpPadBoost, Landed,
    MovingPlatformEntered, PlatformMoved, PreJumpCalculation, Reversal, SnapCompleted,
    UndoBegan, UndoCompleted, Ungrounded,
};

/// A payload type with a dedicated channel on the [`EventBus`].
pub trait Event: Sized + Send + Sync + 'static {
    fn channel(bus: &EventBus) -> &EventChannel<Self>;
}

macro_rules! event_table {
    ($($field:ident: $event:ty),+ $(,)?) => {
        /// One channel per event type.
        #[derive(Debug, Default)]
        pub struct EventBus {
            $($field: EventChannel<$event>,)+
        }

        impl EventBus {
            /// Drop every subscriber on every channel.
            pub fn clear(&self) {
                $(self.$field.clear();)+
            }
        }

        $(
            impl Event for $event {
                fn channel(bus: &EventBus) -> &EventChannel<Self> {
                    &bus.$field
                }
            }
        )+
    };
}

event_table! {
    grounded_changed: GroundedChanged,
    landed: Landed,
    ungrounded: Ungrounded,
    moving_platform_entered: MovingPlatformEntered,
    pre_jump: PreJumpCalculation,
    dash_executed: DashExecuted,
    dash_cooldown_finished: DashCooldownFinished,
    jump_pad_boost: JumpPadBoost,
    undo_began: UndoBegan,
    undo_completed: UndoCompleted,
    reversal: Reversal,
    snap_completed: SnapCompleted,
    platform_moved: PlatformMoved,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel for `E`.
    pub fn channel<E: Event>(&self) -> &EventChannel<E> {
        E::channel(self)
    }

    pub fn subscribe<E: Event>(&self, handler: Handler<E>) -> bool {
        E::channel(self).subscribe(handler)
    }

    pub fn unsubscribe<E: Event>(&self, handler: &Handler<E>) -> bool {
        E::channel(self).unsubscribe(handler)
    }

    /// Publish to the channel for `E`. Returns false if nobody listens.
    pub fn publish<E: Event>(&self, event: &E) -> bool {
        E::channel(self).publish(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_channels_are_independent() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let seen = seen.clone();
            bus.subscribe::<Landed>(handler(move |event: &Landed| {
                seen.lock().unwrap().push(event.time);
                Ok(())
            }));
        }

        assert!(bus.publish(&Landed {
            time: 2.0,
            position: Vec3::ZERO,
        }));
        assert!(
            !bus.publish(&SnapCompleted { position: Vec3::ZERO }),
            "No subscriber on SnapCompleted"
        );
        assert_eq!(*seen.lock().unwrap(), vec![2.0]);
    }

    #[test]
    fn test_publish_from_inside_handler() {
        let bus = Arc::new(EventBus::new());
        let completed = Arc::new(Mutex::new(0));

        {
            let inner_bus = bus.clone();
            bus.subscribe::<UndoCompleted>(handler(move |_: &UndoCompleted| {
                inner_bus.publish(&Reversal {
                    is_reversing: false,
                    reversal_fixed_delta: 0.0,
                });
                Ok(())
            }));
        }
        {
            let completed = completed.clone();
            bus.subscribe::<Reversal>(handler(move |event: &Reversal| {
                assert!(!event.is_reversing);
                *completed.lock().unwrap() += 1;
                Ok(())
            }));
        }

        bus.publish(&UndoCompleted { time: 0.0 });
        assert_eq!(*completed.lock().unwrap(), 1);
    }

    #[test]
    fn test_bus_clear() {
        let bus = EventBus::new();
        bus.subscribe::<Landed>(handler(|_: &Landed| Ok(())));
        bus.subscribe::<Reversal>(handler(|_: &Reversal| Ok(())));

        bus.clear();
        assert!(bus.channel::<Landed>().is_empty());
        assert!(bus.channel::<Reversal>().is_empty());
    }
}
