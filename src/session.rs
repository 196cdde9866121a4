//! Session handles and the message-based I/O capability.
//!
//! A bus open yields a [`SessionHandle`]: either a resource that speaks the
//! message-based read/write/query protocol this crate is built around, or
//! some other resource kind that was opened successfully but cannot be used
//! for I/O here. The distinction is structural - a handle either carries a
//! [`MessageBased`] implementation or it does not - rather than a runtime
//! type inspection.
//!
//! Handles are shared: every instrument bound to the same address holds a
//! clone of the same [`SharedSession`], and identity (`Arc::ptr_eq`) is what
//! the connection registry keys removal on.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

/// Message-based I/O over an open instrument session.
///
/// Implementations serialize their own interior access; all methods take
/// `&self` so a session can be driven through a shared handle. Errors are
/// transport-level and get wrapped into the operation's
/// [`VisaError`](crate::VisaError) kind at the instrument boundary.
pub trait MessageBased: Send + Sync {
    /// Send a text command.
    fn send(&self, command: &str) -> Result<()>;

    /// Send raw bytes verbatim.
    fn send_raw(&self, payload: &[u8]) -> Result<()>;

    /// Read one text response line.
    fn receive(&self) -> Result<String>;

    /// Read exactly `count` raw bytes.
    fn receive_bytes(&self, count: usize) -> Result<Vec<u8>>;

    /// Read all currently available raw bytes.
    fn receive_raw(&self) -> Result<Vec<u8>>;

    /// Clear pending device state (buffers, partial transfers).
    fn clear(&self) -> Result<()>;

    /// Close the underlying session. Further I/O through any holder of the
    /// same handle fails with a transport error.
    fn close(&self) -> Result<()>;
}

/// An open session as returned by a bus backend.
pub enum SessionHandle {
    /// A resource exposing message-based I/O; the only kind this crate
    /// performs operations on, and the only kind the registry tracks.
    MessageBased(Box<dyn MessageBased>),
    /// Some other resource kind. Retained by the instrument that opened it
    /// but never registered and never usable for I/O.
    Other,
}

impl SessionHandle {
    /// The message-based capability, if this handle has it.
    pub fn message_based(&self) -> Option<&dyn MessageBased> {
        match self {
            SessionHandle::MessageBased(session) => Some(session.as_ref()),
            SessionHandle::Other => None,
        }
    }

    /// Whether this handle exposes message-based I/O.
    pub fn is_message_based(&self) -> bool {
        matches!(self, SessionHandle::MessageBased(_))
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionHandle::MessageBased(_) => f.write_str("SessionHandle::MessageBased"),
            SessionHandle::Other => f.write_str("SessionHandle::Other"),
        }
    }
}

/// A session handle shared between every instrument bound to one address.
pub type SharedSession = Arc<SessionHandle>;
