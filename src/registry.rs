//! Connection registry.
//!
//! Single source of truth for which resource addresses currently have a
//! live session and which handle represents each. At most one live entry
//! exists per distinct address; the instrument open path upholds that by
//! holding [`ConnectionRegistry::open_gate`] across its
//! lookup-through-register sequence, so `register` itself stays free of
//! duplicate checks.
//!
//! Entry counts are small (tens of instruments), so the backing store is a
//! plain vector scanned linearly.

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::debug;

use crate::session::SharedSession;

/// One live connection: the address it was opened for and the shared handle.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    /// Resource address the session was opened for.
    pub address: String,
    /// The session handle shared by every instrument bound to the address.
    pub handle: SharedSession,
}

/// Process-wide mapping from resource address to open session handle.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: Mutex<Vec<ConnectionEntry>>,
    open_gate: Mutex<()>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle registered for `address`, if any. Exact string match.
    pub fn lookup(&self, address: &str) -> Option<SharedSession> {
        self.entries
            .lock()
            .iter()
            .find(|entry| entry.address == address)
            .map(|entry| entry.handle.clone())
    }

    /// Append an entry. No duplicate check happens here; callers must hold
    /// the [`open_gate`](Self::open_gate) and `lookup` first.
    pub fn register(&self, address: impl Into<String>, handle: SharedSession) {
        let address = address.into();
        debug!(resource = %address, "registering session");
        self.entries.lock().push(ConnectionEntry { address, handle });
    }

    /// Remove every entry whose handle is identical to `handle`. Identity,
    /// not address, because an address may have been rebound since.
    pub fn unregister(&self, handle: &SharedSession) {
        self.entries
            .lock()
            .retain(|entry| !Arc::ptr_eq(&entry.handle, handle));
    }

    /// A copy of the current entries. Mutating the returned list does not
    /// affect the registry.
    pub fn snapshot(&self) -> Vec<ConnectionEntry> {
        self.entries.lock().clone()
    }

    /// Best-effort close of every registered handle, then clear the
    /// registry unconditionally. A handle that fails to close does not
    /// block the rest.
    pub fn close_all(&self) {
        let drained = std::mem::take(&mut *self.entries.lock());
        for entry in drained {
            if let Some(session) = entry.handle.message_based() {
                if let Err(err) = session.close() {
                    debug!(resource = %entry.address, error = %err, "close failed");
                }
            }
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry has no live entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Serializes the open path. An instrument opening a session holds this
    /// guard from `lookup` through `register`, so two concurrent opens of
    /// the same address cannot both miss the lookup and open twice.
    pub(crate) fn open_gate(&self) -> MutexGuard<'_, ()> {
        self.open_gate.lock()
    }
}
