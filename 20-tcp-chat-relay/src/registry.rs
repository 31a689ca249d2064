use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::mpsc;
use tracing::trace;

use crate::protocol::Message;

pub type SessionId = u64;

/// Rendered bytes queued for one session's connection.
pub type Outgoing = std::sync::Arc<[u8]>;

/// What the registry keeps for a live session.
///
/// The connection itself stays with the session task; the registry only holds
/// the sending side of that task's outbox. Queued payloads are written by the
/// session in order, so two broadcasts racing towards the same recipient never
/// interleave bytes. The outbox is unbounded: a peer that stops reading keeps
/// accumulating queued lines until its connection fails.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    name: String,
    outbox: mpsc::UnboundedSender<Outgoing>,
}

impl SessionHandle {
    pub fn new(id: SessionId, name: String, outbox: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self { id, name, outbox }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues `payload` for this session without waiting on the socket.
    ///
    /// Returns `false` if the session task has already gone away; that task
    /// deregisters itself on its way out, so the caller has nothing to clean up.
    pub fn deliver(&self, payload: Outgoing) -> bool {
        self.outbox.send(payload).is_ok()
    }
}

/// The set of sessions that have picked a name and not yet failed.
///
/// All access goes through one lock, which is never held across an `.await`.
#[derive(Debug)]
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    next_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, handle: SessionHandle) {
        let mut sessions = self.lock();
        let previous = sessions.insert(handle.id, handle);
        debug_assert!(previous.is_none(), "session registered twice");
    }

    pub fn deregister(&self, id: SessionId) -> Option<SessionHandle> {
        self.lock().remove(&id)
    }

    /// Hands `message` to every registered session except `sender`.
    ///
    /// The membership cannot change while the loop runs. Delivery only
    /// enqueues, so the lock is released as soon as the loop ends. Returns how
    /// many sessions accepted the message.
    pub fn broadcast(&self, sender: SessionId, message: &Message<'_>) -> usize {
        let payload = message.render();
        let sessions = self.lock();

        let mut delivered = 0;
        for (id, session) in sessions.iter().filter(|(id, _)| **id != sender) {
            if session.deliver(payload.clone()) {
                delivered += 1;
            } else {
                trace!(session = id, "outbox closed; session is terminating");
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Display names of the current members, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.lock()
            .values()
            .map(|session| session.name.clone())
            .collect()
    }

    // Every critical section leaves the map consistent, so a panic elsewhere
    // while holding the guard does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
