//! Listener registries and subscription handles.
//!
//! An [`EventEmitter`] owns a set of callbacks. Registering one returns a
//! [`Subscription`], which unregisters the callback when removed or dropped,
//! exactly once. Tie the handle to the scope that owns the check and release
//! happens on every exit path, early returns and unwinding included.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<T>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Type-erased removal so [`Subscription`] does not carry the event type.
trait Unregister: Send + Sync {
    fn unregister(&self, id: u64) -> bool;
}

impl<T> Unregister for Mutex<Registry<T>>
where
    T: 'static,
{
    fn unregister(&self, id: u64) -> bool {
        lock(self).listeners.remove(&id).is_some()
    }
}

/// A named source of events of type `T`.
///
/// Clones share the same listener set.
pub struct EventEmitter<T> {
    name: &'static str,
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> std::fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("name", &self.name)
            .field("listeners", &lock(&self.registry).listeners.len())
            .finish()
    }
}

impl<T: 'static> EventEmitter<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }

    /// Register `listener`. It stays registered until the returned handle is
    /// removed or dropped.
    #[must_use = "dropping the subscription unregisters the listener immediately"]
    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.insert(id, Arc::new(listener));
            id
        };
        tracing::debug!(source = self.name, id, "Listener registered");

        let registry: Arc<dyn Unregister> = self.registry.clone();
        Subscription {
            id,
            source: self.name,
            registry: Some(Arc::downgrade(&registry)),
        }
    }

    /// Deliver `event` to every registered listener, in registration order.
    ///
    /// Listeners run outside the registry lock, so a callback may add or
    /// remove subscriptions. Returns the number of listeners invoked.
    pub fn emit(&self, event: &T) -> usize {
        let listeners: Vec<Listener<T>> =
            lock(&self.registry).listeners.values().cloned().collect();
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

/// Handle for one registered listener.
///
/// Released by [`Subscription::remove`] or on drop, whichever comes first.
#[must_use = "dropping the subscription unregisters the listener immediately"]
pub struct Subscription {
    id: u64,
    source: &'static str,
    registry: Option<Weak<dyn Unregister>>,
}

impl Subscription {
    /// Unregister the listener now.
    ///
    /// Returns `false` if the source was already gone.
    pub fn remove(mut self) -> bool {
        self.release()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .as_ref()
            .is_some_and(|registry| registry.strong_count() > 0)
    }

    fn release(&mut self) -> bool {
        let Some(registry) = self.registry.take() else {
            return false;
        };
        let removed = registry
            .upgrade()
            .is_some_and(|registry| registry.unregister(self.id));
        tracing::debug!(source = self.source, id = self.id, removed, "Listener released");
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Last-write-wins slot for the most recent event seen by a listener.
pub struct LatestEvent<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for LatestEvent<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for LatestEvent<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T: Clone + Send + 'static> LatestEvent<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: T) {
        *lock(&self.slot) = Some(event);
    }

    #[must_use]
    pub fn get(&self) -> Option<T> {
        lock(&self.slot).clone()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        lock(&self.slot).is_some()
    }

    /// A callback that records every event it sees into this slot.
    pub fn recorder(&self) -> impl Fn(&T) + Send + Sync + 'static {
        let slot = Arc::clone(&self.slot);
        move |event: &T| *lock(&slot) = Some(event.clone())
    }
}
