// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listener registry for device state updates.
//!
//! - [`SubscriptionId`] - Unique identifier of a listener
//! - [`Subscription`] - Token returned at subscribe time, used to unsubscribe
//! - [`CallbackRegistry`] - Stores listeners and dispatches snapshots

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::state::DeviceState;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Listener receiving the new snapshot.
type StateCallback = Arc<dyn Fn(&DeviceState) + Send + Sync>;

/// Listener taking no arguments.
type BareCallback = Arc<dyn Fn() + Send + Sync>;

/// The two listener shapes.
///
/// Bare listeners exist for consumers that re-read state on their own and
/// only need the "something changed" signal; both shapes are kept for
/// compatibility with such consumers.
#[derive(Clone)]
enum Listener {
    WithState(StateCallback),
    Bare(BareCallback),
}

impl Listener {
    fn call(&self, state: &DeviceState) {
        match self {
            Self::WithState(callback) => callback(state),
            Self::Bare(callback) => callback(),
        }
    }
}

/// Registry of update listeners.
///
/// Dispatch copies the listener list under the read lock and invokes the
/// listeners after releasing it, so a listener may subscribe or unsubscribe
/// from inside its callback. A panicking listener is logged and skipped;
/// the remaining listeners still run.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<SubscriptionId, Listener>>,
}

impl CallbackRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn register(self: &Arc<Self>, listener: Listener) -> Subscription {
        let id = self.next_id();
        self.listeners.write().insert(id, listener);
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a listener that receives each new snapshot.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&DeviceState) + Send + Sync + 'static,
    {
        self.register(Listener::WithState(Arc::new(callback)))
    }

    /// Registers a listener that is only told that something changed.
    pub fn subscribe_bare<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(Listener::Bare(Arc::new(callback)))
    }

    /// Removes a listener. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Invokes every listener with `state`.
    pub fn dispatch(&self, state: &DeviceState) {
        let listeners: Vec<(SubscriptionId, Listener)> = self
            .listeners
            .read()
            .iter()
            .map(|(id, listener)| (*id, listener.clone()))
            .collect();

        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.call(state))).is_err() {
                tracing::warn!(subscription = %id, "Update listener panicked");
            }
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("listeners", &self.len())
            .finish_non_exhaustive()
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<CallbackRegistry>,
}

impl Subscription {
    /// Returns the subscription ID.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the listener. Returns `true` if it was still registered.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.unsubscribe(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn dispatch_reaches_both_shapes() {
        let registry = Arc::new(CallbackRegistry::new());
        let with_state = counter();
        let bare = counter();

        let seen = Arc::clone(&with_state);
        registry.subscribe(move |state| {
            assert_eq!(state.available_zones, vec![0]);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let seen = Arc::clone(&bare);
        registry.subscribe_bare(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&DeviceState::default());

        assert_eq!(with_state.load(Ordering::SeqCst), 1);
        assert_eq!(bare.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_token_removes_listener() {
        let registry = Arc::new(CallbackRegistry::new());
        let calls = counter();

        let seen = Arc::clone(&calls);
        let subscription = registry.subscribe_bare(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let copy = subscription.clone();

        assert!(subscription.unsubscribe());
        assert!(!copy.unsubscribe());

        registry.dispatch(&DeviceState::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribe_after_registry_dropped() {
        let registry = Arc::new(CallbackRegistry::new());
        let subscription = registry.subscribe_bare(|| {});
        drop(registry);
        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let registry = Arc::new(CallbackRegistry::new());
        let calls = counter();

        registry.subscribe_bare(|| panic!("listener failure"));
        let seen = Arc::clone(&calls);
        registry.subscribe_bare(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&DeviceState::default());
        registry.dispatch(&DeviceState::default());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn listener_may_unsubscribe_during_dispatch() {
        let registry = Arc::new(CallbackRegistry::new());
        let inner = Arc::clone(&registry);
        registry.subscribe_bare(move || inner.clear());

        registry.dispatch(&DeviceState::default());
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let registry = Arc::new(CallbackRegistry::new());
        let a = registry.subscribe_bare(|| {});
        let b = registry.subscribe_bare(|| {});
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().to_string(), format!("Sub({})", a.id().value()));
    }
}
