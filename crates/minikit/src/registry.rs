//! Event name to handler mapping driven by host callbacks.
//!
//! Each event name has at most one active handler. Subscribing again replaces
//! the previous handler; there is no queueing or fan-out at this level.

use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use anyhow::anyhow;
use serde_json::Value;
use shared::domain::EventName;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::RegistryError;

pub type EventHandler = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    NoHandler,
    HandlerFailed,
}

struct Subscription {
    id: SubscriptionId,
    handler: EventHandler,
}

#[derive(Default)]
pub struct EventRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventName, Subscription>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handlers(&self) -> MutexGuard<'_, HashMap<EventName, Subscription>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, event: EventName, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.install(event, Arc::new(handler))
    }

    /// Forwards every dispatched payload for `event` into `tx`.
    pub fn subscribe_channel(
        &self,
        event: EventName,
        tx: mpsc::UnboundedSender<Value>,
    ) -> Result<SubscriptionId, RegistryError> {
        if tx.is_closed() {
            return Err(RegistryError::InvalidHandler { event });
        }
        Ok(self.subscribe(event, move |payload| {
            tx.send(payload.clone())
                .map_err(|_| anyhow!("subscriber for {event} dropped its receiver"))
        }))
    }

    fn install(&self, event: EventName, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if self
            .handlers()
            .insert(event, Subscription { id, handler })
            .is_some()
        {
            debug!(event = %event, "registry: replaced existing handler");
        }
        id
    }

    pub fn unsubscribe(&self, event: EventName) -> bool {
        self.handlers().remove(&event).is_some()
    }

    /// Removes the handler for `event` only while it is still `id`.
    pub fn unsubscribe_if(&self, event: EventName, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers();
        match handlers.get(&event) {
            Some(current) if current.id == id => {
                handlers.remove(&event);
                true
            }
            _ => false,
        }
    }

    pub fn is_subscribed(&self, event: EventName) -> bool {
        self.handlers().contains_key(&event)
    }

    /// Invokes the current handler for `event`. Handler errors and panics are
    /// logged and never escape; the lock is released before the handler runs
    /// so handlers may unsubscribe themselves.
    pub fn dispatch(&self, event: EventName, payload: &Value) -> DispatchOutcome {
        let handler = self
            .handlers()
            .get(&event)
            .map(|subscription| Arc::clone(&subscription.handler));
        let Some(handler) = handler else {
            warn!(event = %event, "No handler registered for event");
            return DispatchOutcome::NoHandler;
        };

        match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(err)) => {
                error!(event = %event, "Error in event handler: {err:#}");
                DispatchOutcome::HandlerFailed
            }
            Err(_) => {
                error!(event = %event, "event handler panicked");
                DispatchOutcome::HandlerFailed
            }
        }
    }

    pub fn clear(&self) {
        self.handlers().clear();
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
