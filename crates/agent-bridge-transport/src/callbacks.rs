//! Ordered subscriber lists per event kind.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use agent_bridge_core::{ConnectionEvent, EventHandler, EventKind};

/// Registry of connection event subscribers.
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: RwLock<HashMap<EventKind, Vec<Arc<dyn EventHandler>>>>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber for one event kind.
    pub fn register(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(handler);
    }

    /// Remove every subscriber.
    pub fn clear(&self) {
        tracing::debug!("Unregistering all callbacks");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of subscribers for one event kind.
    #[must_use]
    pub fn len(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver an event to its subscribers, in registration order.
    ///
    /// The subscriber list is snapshotted first, so handlers may register or
    /// clear callbacks without deadlocking.
    pub fn dispatch(&self, event: &ConnectionEvent) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for handler in handlers {
            handler.on_event(event);
        }
    }
}
