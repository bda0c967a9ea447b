// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Change-notification plumbing shared by the session store and change feed.
//!
//! Every `add` hands back a [`Subscription`]. Dropping it (or calling
//! [`Subscription::unsubscribe`]) removes the listener exactly once.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Disposer for a registered listener.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(dispose: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// A subscription with nothing to dispose.
    pub fn noop() -> Self {
        Self { dispose: None }
    }

    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        self.dispose_once();
    }

    fn dispose_once(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose_once();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}

/// Listener callback receiving a borrowed event.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Registry of listeners for one kind of event.
pub struct ListenerSet<T> {
    listeners: Arc<DashMap<u64, Listener<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T: 'static> ListenerSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`; it stays registered until the subscription is disposed.
    pub fn add(&self, listener: Listener<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, listener);

        let listeners = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.remove(&id);
            }
        })
    }

    /// Call every registered listener with `event`.
    ///
    /// Listeners are snapshotted first, so a listener may unsubscribe (or
    /// subscribe another) while being called without deadlocking the map.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn test_dispose_runs_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        sub.unsubscribe(); // explicit unsubscribe, then drop inside
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = Arc::clone(&count);
        drop(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_reaches_only_live_listeners() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s1 = Arc::clone(&seen);
        let first = set.add(Arc::new(move |v: &u32| s1.lock().unwrap().push(("first", *v))));
        let s2 = Arc::clone(&seen);
        let _second = set.add(Arc::new(move |v: &u32| s2.lock().unwrap().push(("second", *v))));

        set.emit(&1);
        first.unsubscribe();
        set.emit(&2);

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![("first", 1), ("second", 1), ("second", 2)]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_during_emit() {
        let set: Arc<ListenerSet<()>> = Arc::new(ListenerSet::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&slot);
        let sub = set.add(Arc::new(move |_: &()| {
            if let Some(sub) = inner.lock().unwrap().take() {
                sub.unsubscribe();
            }
        }));
        *slot.lock().unwrap() = Some(sub);

        set.emit(&());
        assert!(set.is_empty());
    }

    #[test]
    fn test_subscription_outliving_set_is_harmless() {
        let set: ListenerSet<()> = ListenerSet::new();
        let sub = set.add(Arc::new(|_: &()| {}));
        drop(set);
        sub.unsubscribe();
    }
}
