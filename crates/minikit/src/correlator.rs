//! Pairs outbound commands with the inbound event that answers them.
//!
//! The host bridge has no request/response pairing, so a pending call waits on
//! an event name. In [`CorrelationMode::Queued`] each call also carries a
//! [`CorrelationId`] on the wire; responses echoing it resolve that call, and
//! responses without one resolve the oldest waiter for the event.
//! [`CorrelationMode::SingleSlot`] allows one waiter per event name: a newer
//! call displaces the older one.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use anyhow::anyhow;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use shared::domain::{CommandId, CorrelationId, EventName};
use tokio::{sync::oneshot, time::Instant};
use tracing::{debug, warn};

use crate::{
    error::{CommandError, TriggerError},
    registry::{EventRegistry, SubscriptionId},
};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(600_000);
pub const CORRELATION_ID_FIELD: &str = "correlation_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    #[default]
    Queued,
    SingleSlot,
}

impl CorrelationMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Some(Self::Queued),
            "single_slot" | "single-slot" => Some(Self::SingleSlot),
            _ => None,
        }
    }
}

/// What the trigger built locally and what the host answered.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedResponse<C, F = Value> {
    pub command_payload: C,
    pub final_payload: F,
}

impl<C> CorrelatedResponse<C, Value> {
    pub fn decode<F: DeserializeOwned>(
        self,
        event: EventName,
    ) -> Result<CorrelatedResponse<C, F>, CommandError> {
        let final_payload = serde_json::from_value(self.final_payload)
            .map_err(|source| CommandError::MalformedResponse { event, source })?;
        Ok(CorrelatedResponse {
            command_payload: self.command_payload,
            final_payload,
        })
    }
}

#[derive(Debug)]
enum Settlement {
    Resolved(Value),
    Displaced,
    Cancelled,
}

struct Waiter {
    correlation_id: CorrelationId,
    tx: oneshot::Sender<Settlement>,
}

#[derive(Default)]
struct EventWaiters {
    subscription: Option<SubscriptionId>,
    queue: VecDeque<Waiter>,
}

type PendingMap = Mutex<HashMap<EventName, EventWaiters>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<EventName, EventWaiters>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Correlator {
    registry: Arc<EventRegistry>,
    pending: Arc<PendingMap>,
    mode: CorrelationMode,
    timeout: Duration,
}

impl Correlator {
    pub fn new(registry: Arc<EventRegistry>, mode: CorrelationMode, timeout: Duration) -> Self {
        Self {
            registry,
            pending: Arc::new(Mutex::new(HashMap::new())),
            mode,
            timeout,
        }
    }

    pub fn mode(&self) -> CorrelationMode {
        self.mode
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of calls currently waiting on `event`.
    pub fn pending_count(&self, event: EventName) -> usize {
        lock(&self.pending)
            .get(&event)
            .map_or(0, |waiters| waiters.queue.len())
    }

    /// Registers a waiter for `event`, runs `trigger` to send `command`, and
    /// waits for the matching response or the timeout, whichever comes first.
    ///
    /// `trigger` receives the token to put on the wire (`None` in single-slot
    /// mode). If it fails, nothing is awaited and the waiter is released.
    pub async fn await_command<C, T>(
        &self,
        event: EventName,
        command: CommandId,
        trigger: T,
    ) -> Result<CorrelatedResponse<C>, CommandError>
    where
        T: FnOnce(Option<CorrelationId>) -> Result<C, TriggerError>,
    {
        let deadline = Instant::now() + self.timeout;
        let correlation_id = CorrelationId::new();
        let mut rx = self.register(event, correlation_id);
        let guard = PendingGuard {
            correlator: self,
            event,
            correlation_id,
            armed: true,
        };

        let wire_token = match self.mode {
            CorrelationMode::Queued => Some(correlation_id),
            CorrelationMode::SingleSlot => None,
        };
        let command_payload = match trigger(wire_token) {
            Ok(payload) => payload,
            Err(source) => {
                guard.release();
                return Err(CommandError::Trigger { command, source });
            }
        };
        debug!(
            command = %command,
            event = %event,
            correlation_id = %correlation_id,
            "correlator: command sent, awaiting response"
        );

        let waited = tokio::time::timeout_at(deadline, &mut rx).await;
        let settlement = match waited {
            Ok(Ok(settlement)) => {
                guard.disarm();
                settlement
            }
            Ok(Err(_)) => {
                guard.disarm();
                Settlement::Cancelled
            }
            Err(_) => {
                if guard.release() {
                    warn!(
                        command = %command,
                        event = %event,
                        timeout = ?self.timeout,
                        "correlator: command timed out"
                    );
                    return Err(CommandError::Timeout {
                        command,
                        elapsed: self.timeout,
                    });
                }
                // The response claimed the waiter before the timer could.
                rx.try_recv().unwrap_or(Settlement::Cancelled)
            }
        };

        match settlement {
            Settlement::Resolved(final_payload) => Ok(CorrelatedResponse {
                command_payload,
                final_payload,
            }),
            Settlement::Displaced => Err(CommandError::Displaced { command, event }),
            Settlement::Cancelled => Err(CommandError::Cancelled { command }),
        }
    }

    fn register(
        &self,
        event: EventName,
        correlation_id: CorrelationId,
    ) -> oneshot::Receiver<Settlement> {
        let (tx, rx) = oneshot::channel();
        let mut pending = lock(&self.pending);
        let waiters = pending.entry(event).or_default();

        if self.mode == CorrelationMode::SingleSlot {
            for displaced in waiters.queue.drain(..) {
                warn!(
                    event = %event,
                    correlation_id = %displaced.correlation_id,
                    "correlator: pending call displaced by a newer call for the same event"
                );
                let _ = displaced.tx.send(Settlement::Displaced);
            }
        }
        waiters.queue.push_back(Waiter { correlation_id, tx });

        let router = route_handler(
            Arc::downgrade(&self.pending),
            Arc::downgrade(&self.registry),
            self.mode,
            event,
        );
        waiters.subscription = Some(self.registry.subscribe(event, router));
        rx
    }

    /// Drops the waiter for `correlation_id`. Returns `false` if it was
    /// already settled.
    fn release(&self, event: EventName, correlation_id: CorrelationId) -> bool {
        let mut pending = lock(&self.pending);
        let Some(waiters) = pending.get_mut(&event) else {
            return false;
        };
        let Some(index) = waiters
            .queue
            .iter()
            .position(|waiter| waiter.correlation_id == correlation_id)
        else {
            return false;
        };
        waiters.queue.remove(index);
        if waiters.queue.is_empty() {
            if let Some(subscription) = waiters.subscription.take() {
                self.registry.unsubscribe_if(event, subscription);
            }
            pending.remove(&event);
        }
        true
    }

    /// Fails every pending call with [`CommandError::Cancelled`].
    pub fn cancel_all(&self) {
        let drained: Vec<_> = lock(&self.pending).drain().collect();
        for (event, waiters) in drained {
            if let Some(subscription) = waiters.subscription {
                self.registry.unsubscribe_if(event, subscription);
            }
            for waiter in waiters.queue {
                let _ = waiter.tx.send(Settlement::Cancelled);
            }
        }
    }
}

/// Releases a waiter whose caller stopped polling before it settled.
struct PendingGuard<'a> {
    correlator: &'a Correlator,
    event: EventName,
    correlation_id: CorrelationId,
    armed: bool,
}

impl PendingGuard<'_> {
    fn release(mut self) -> bool {
        self.armed = false;
        self.correlator.release(self.event, self.correlation_id)
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(
                event = %self.event,
                correlation_id = %self.correlation_id,
                "correlator: caller dropped pending call"
            );
            self.correlator.release(self.event, self.correlation_id);
        }
    }
}

fn route_handler(
    pending: Weak<PendingMap>,
    registry: Weak<EventRegistry>,
    mode: CorrelationMode,
    event: EventName,
) -> impl Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static {
    move |payload: &Value| {
        let pending = pending
            .upgrade()
            .ok_or_else(|| anyhow!("correlator for {event} is gone"))?;
        let mut guard = lock(&pending);
        let Some(waiters) = guard.get_mut(&event) else {
            warn!(event = %event, "correlator: response with no pending call");
            return Ok(());
        };
        // Callers that gave up (dropped their future) must not swallow a response.
        waiters.queue.retain(|waiter| !waiter.tx.is_closed());

        let token = payload
            .get(CORRELATION_ID_FIELD)
            .and_then(|raw| serde_json::from_value::<CorrelationId>(raw.clone()).ok());
        let index = match (mode, token) {
            (CorrelationMode::Queued, Some(token)) => waiters
                .queue
                .iter()
                .position(|waiter| waiter.correlation_id == token),
            _ => (!waiters.queue.is_empty()).then_some(0),
        };

        match index.and_then(|index| waiters.queue.remove(index)) {
            Some(waiter) => {
                debug!(
                    event = %event,
                    correlation_id = %waiter.correlation_id,
                    "correlator: response matched pending call"
                );
                let _ = waiter.tx.send(Settlement::Resolved(payload.clone()));
            }
            None => {
                warn!(
                    event = %event,
                    correlation_id = ?token,
                    "correlator: response matched no pending call"
                );
            }
        }

        if waiters.queue.is_empty() {
            if let (Some(subscription), Some(registry)) =
                (waiters.subscription.take(), registry.upgrade())
            {
                registry.unsubscribe_if(event, subscription);
            }
            guard.remove(&event);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/correlator_tests.rs"]
mod tests;
