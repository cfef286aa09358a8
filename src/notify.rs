//! Real-time notifier: best-effort, at-most-once fan-out to connected
//! sessions, keyed by (role, principal id). There is no outbox and no
//! redelivery on reconnect; the REST listings are the correctness path and
//! these events only cut latency. A transition must already be committed to
//! the store before anything is published here, and a failed publish never
//! rolls it back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::entities::booking;
use crate::entities::user::UserRole;

/// A single event frame, named exactly as the client listens for it.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new_booking_for_driver(driver_id: Uuid, b: &booking::Model) -> Self {
        Self {
            event: format!("new_booking_for_driver_{}", driver_id),
            data: json!({ "booking": b }),
        }
    }

    pub fn booking_accepted(user_id: Uuid, b: &booking::Model) -> Self {
        Self {
            event: format!("booking_accepted_{}", user_id),
            data: json!({ "booking": b }),
        }
    }

    pub fn trip_started(user_id: Uuid, b: &booking::Model) -> Self {
        Self {
            event: format!("trip_started_{}", user_id),
            data: json!({ "booking": b }),
        }
    }

    pub fn trip_completed(user_id: Uuid, b: &booking::Model) -> Self {
        Self {
            event: format!("trip_completed_{}", user_id),
            data: json!({ "booking": b }),
        }
    }

    pub fn booking_cancelled(principal_id: Uuid, b: &booking::Model, cancelled_by: &str) -> Self {
        Self {
            event: format!("booking_cancelled_{}", principal_id),
            data: json!({ "booking": b, "cancelledBy": cancelled_by }),
        }
    }
}

type Key = (UserRole, Uuid);

struct Session {
    id: u64,
    tx: mpsc::UnboundedSender<Event>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<Key, Vec<Session>>,
}

/// Cheap to clone; all clones share one registry.
#[derive(Clone, Default)]
pub struct Notifier {
    registry: Arc<Mutex<Registry>>,
    next_session: Arc<AtomicU64>,
}

/// A live event feed for one connected session. Dropping it (normal close,
/// network error, task abort) unregisters the sender, so the registry never
/// accumulates dead sessions.
pub struct Subscription {
    pub rx: mpsc::UnboundedReceiver<Event>,
    key: Key,
    session_id: u64,
    registry: Arc<Mutex<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut reg = self.registry.lock().expect("notifier registry poisoned");
        if let Some(sessions) = reg.sessions.get_mut(&self.key) {
            sessions.retain(|s| s.id != self.session_id);
            if sessions.is_empty() {
                reg.sessions.remove(&self.key);
            }
        }
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, role: UserRole, principal_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let key = (role, principal_id);

        {
            let mut reg = self.registry.lock().expect("notifier registry poisoned");
            reg.sessions
                .entry(key)
                .or_default()
                .push(Session { id: session_id, tx });
        }

        tracing::debug!(role = role.as_str(), principal = %principal_id, "session subscribed");
        Subscription {
            rx,
            key,
            session_id,
            registry: self.registry.clone(),
        }
    }

    /// Fire-and-forget delivery to every connected session of a principal.
    /// Failures are logged and swallowed.
    pub fn publish(&self, role: UserRole, principal_id: Uuid, event: Event) {
        let reg = self.registry.lock().expect("notifier registry poisoned");
        let Some(sessions) = reg.sessions.get(&(role, principal_id)) else {
            tracing::trace!(event = %event.event, "no connected sessions, event dropped");
            return;
        };

        for session in sessions {
            if session.tx.send(event.clone()).is_err() {
                tracing::debug!(
                    event = %event.event,
                    session = session.id,
                    "delivery failed, session gone"
                );
            }
        }
    }

    #[cfg(test)]
    fn session_count(&self, role: UserRole, principal_id: Uuid) -> usize {
        self.registry
            .lock()
            .expect("notifier registry poisoned")
            .sessions
            .get(&(role, principal_id))
            .map_or(0, Vec::len)
    }
}
