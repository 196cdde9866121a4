//! Error types for instrument communication.
//!
//! Every I/O primitive re-signals transport failures as the named kind for
//! that operation, carrying the instrument name, resource address, and (for
//! command-bearing operations) the command. The underlying transport error
//! is emitted on the tracing layer at the failure site; callers should not
//! depend on transport text appearing in these messages.

use thiserror::Error;

/// Convenience alias for results using [`VisaError`].
pub type VisaResult<T> = std::result::Result<T, VisaError>;

/// Errors surfaced by instrument sessions and the instrument manager.
#[derive(Debug, Error)]
pub enum VisaError {
    /// Opening the session failed after exhausting all retry attempts.
    #[error("VISA open error: {name}, address: {address}")]
    Open {
        /// Instrument label supplied by the caller.
        name: String,
        /// Resource address the open was attempted against.
        address: String,
    },

    /// The held handle does not expose message-based I/O (or the instrument
    /// was already closed), so the requested operation cannot be performed.
    #[error("VISA handle for '{name}' is not a message-based resource")]
    NotMessageBased {
        /// Instrument label supplied by the caller.
        name: String,
    },

    /// Transport failure during a text query.
    #[error("VISA query error: {name}, address: {address}, command: {command}")]
    Query {
        /// Instrument label supplied by the caller.
        name: String,
        /// Resource address of the session.
        address: String,
        /// Command that was being sent.
        command: String,
    },

    /// Transport failure during a text write.
    #[error("VISA write error: {name}, address: {address}, command: {command}")]
    Write {
        /// Instrument label supplied by the caller.
        name: String,
        /// Resource address of the session.
        address: String,
        /// Command that was being sent.
        command: String,
    },

    /// Transport failure during a text read.
    #[error("VISA read error: {name}, address: {address}")]
    Read {
        /// Instrument label supplied by the caller.
        name: String,
        /// Resource address of the session.
        address: String,
    },

    /// Transport failure while reading raw bytes.
    #[error("VISA read binary error: {name}, address: {address}")]
    ReadBinary {
        /// Instrument label supplied by the caller.
        name: String,
        /// Resource address of the session.
        address: String,
    },

    /// Transport failure while writing raw bytes.
    #[error("VISA write binary error: {name}, address: {address}")]
    WriteBinary {
        /// Instrument label supplied by the caller.
        name: String,
        /// Resource address of the session.
        address: String,
    },

    /// Transport failure during a binary query.
    #[error("VISA query binary error: {name}, address: {address}, command: {command}")]
    QueryBinary {
        /// Instrument label supplied by the caller.
        name: String,
        /// Resource address of the session.
        address: String,
        /// Command that was being sent.
        command: String,
    },

    /// An instrument with this name is already registered in the manager.
    #[error("instrument '{0}' already exists")]
    DuplicateName(String),
}
