//! State observer registry with RAII unsubscription.

use crate::core::PipelineState;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::error;

/// Callback invoked with every published snapshot.
pub type StateObserver = Arc<dyn Fn(&PipelineState) + Send + Sync>;

/// Observers registered on one orchestrator.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: AtomicU64,
    observers: RwLock<Vec<(u64, StateObserver)>>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers an observer. The returned guard removes it when dropped.
    pub(crate) fn subscribe(self: &Arc<Self>, observer: StateObserver) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.write().push((id, observer));
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.observers.write().retain(|(existing, _)| *existing != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Calls every observer in registration order.
    ///
    /// The list is copied out first so observers may subscribe or drop
    /// subscriptions from inside the callback.
    pub(crate) fn notify(&self, state: &PipelineState) {
        let observers: Vec<StateObserver> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                observer(state);
            })) {
                error!(
                    run_id = ?state.run_id,
                    panic = %panic_message(e.as_ref()),
                    "State observer panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle for a registered state observer.
///
/// Dropping the subscription unregisters the observer. Holding it past the
/// orchestrator's lifetime is harmless.
#[must_use = "dropping a Subscription immediately unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    registry: Weak<ObserverRegistry>,
}

impl Subscription {
    /// Unregisters the observer now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &(self.registry.strong_count() > 0))
            .finish()
    }
}
