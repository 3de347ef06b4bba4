//! A single typed publish/subscribe channel.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A subscriber callback. Identity is the `Arc` allocation, so subscribing the
/// same `Handler` twice is detected while two separately built closures are
/// always distinct.
pub type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<E, F>(f: F) -> Handler<E>
where
    F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Publish/subscribe channel for one event type.
///
/// The subscriber list is guarded by a mutex. Dispatch works on a snapshot
/// taken under the lock and runs with the lock released, so handlers may
/// subscribe, unsubscribe or publish re-entrantly.
pub struct EventChannel<E> {
    subscribers: Mutex<Vec<Handler<E>>>,
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<E> std::fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("event", &std::any::type_name::<E>())
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<E> EventChannel<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Returns false if it is already registered.
    pub fn subscribe(&self, handler: Handler<E>) -> bool {
        let mut subscribers = self.lock();
        if subscribers.iter().any(|existing| same_handler(existing, &handler)) {
            return false;
        }
        subscribers.push(handler);
        true
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, handler: &Handler<E>) -> bool {
        let mut subscribers = self.lock();
        match subscribers
            .iter()
            .position(|existing| same_handler(existing, handler))
        {
            Some(index) => {
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Deliver an event to every subscriber, in registration order.
    ///
    /// Returns false if nobody was subscribed. A failing or panicking handler
    /// is logged and skipped; the rest still run.
    pub fn publish(&self, event: &E) -> bool {
        let snapshot: Vec<Handler<E>> = {
            let subscribers = self.lock();
            if subscribers.is_empty() {
                return false;
            }
            subscribers.clone()
        };

        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    log::error!(
                        "{} handler failed: {err:#}",
                        std::any::type_name::<E>()
                    );
                }
                Err(_) => {
                    log::error!("{} handler panicked", std::any::type_name::<E>());
                }
            }
        }

        true
    }

    /// Remove every subscriber. Returns false if there were none.
    pub fn clear(&self) -> bool {
        let mut subscribers = self.lock();
        let had_any = !subscribers.is_empty();
        subscribers.clear();
        had_any
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Handler<E>>> {
        // A handler never runs under this lock, so a poisoned guard still
        // holds a consistent list.
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn same_handler<E>(a: &Handler<E>, b: &Handler<E>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ping(u32);

    #[test]
    fn test_publish_without_subscribers() {
        let channel = EventChannel::<Ping>::new();
        assert!(!channel.publish(&Ping(1)));
    }

    #[test]
    fn test_duplicate_subscription_rejected() {
        let channel = EventChannel::<Ping>::new();
        let h = handler(|_: &Ping| Ok(()));

        assert!(channel.subscribe(h.clone()));
        assert!(!channel.subscribe(h.clone()), "Same handler twice should be rejected");
        assert_eq!(channel.len(), 1);

        assert!(channel.unsubscribe(&h));
        assert!(!channel.unsubscribe(&h));
        assert!(channel.is_empty());
    }

    #[test]
    fn test_registration_order() {
        let channel = EventChannel::<Ping>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = order.clone();
            channel.subscribe(handler(move |_: &Ping| {
                order.lock().unwrap().push(id);
                Ok(())
            }));
        }

        assert!(channel.publish(&Ping(0)));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_handlers_do_not_stop_dispatch() {
        let channel = EventChannel::<Ping>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        channel.subscribe(handler(|_: &Ping| anyhow::bail!("listener broke")));
        channel.subscribe(handler(|_: &Ping| -> anyhow::Result<()> { panic!("listener panicked") }));
        {
            let calls = calls.clone();
            channel.subscribe(handler(move |event: &Ping| {
                calls.fetch_add(event.0 as usize, Ordering::SeqCst);
                Ok(())
            }));
        }

        assert!(channel.publish(&Ping(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let channel = Arc::new(EventChannel::<Ping>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<Handler<Ping>>>> = Arc::new(Mutex::new(None));
        let self_removing = {
            let channel = channel.clone();
            let slot = slot.clone();
            let calls = calls.clone();
            handler(move |_: &Ping| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = slot.lock().unwrap().take() {
                    channel.unsubscribe(&me);
                }
                Ok(())
            })
        };
        *slot.lock().unwrap() = Some(self_removing.clone());
        channel.subscribe(self_removing);

        let tail_calls = calls.clone();
        channel.subscribe(handler(move |_: &Ping| {
            tail_calls.fetch_add(10, Ordering::SeqCst);
            Ok(())
        }));

        channel.publish(&Ping(0));
        assert_eq!(calls.load(Ordering::SeqCst), 11, "Snapshot should still reach the second handler");

        channel.publish(&Ping(0));
        assert_eq!(calls.load(Ordering::SeqCst), 21, "Self-removing handler should be gone");
    }

    #[test]
    fn test_clear() {
        let channel = EventChannel::<Ping>::new();
        assert!(!channel.clear());
        channel.subscribe(handler(|_: &Ping| Ok(())));
        assert!(channel.clear());
        assert!(!channel.publish(&Ping(0)));
    }
}
