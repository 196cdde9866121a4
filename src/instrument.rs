//! Instrument sessions.
//!
//! An [`Instrument`] is a named session bound to one resource address.
//! Construction opens immediately: either by adopting the handle another
//! instrument already holds for the same address (via the connection
//! registry) or by a bounded-retry open of a new session. There is no
//! separate connect step and no re-open after close - a closed instance is
//! terminal, construct a new one.
//!
//! Every operation consults the shared [`Settings`] first. With sending
//! disabled the operation skips all device interaction and returns its
//! dummy value; the registry is never touched. With printing enabled the
//! operation emits a human-readable trace line before doing anything.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::context::VisaContext;
use crate::error::{VisaError, VisaResult};
use crate::registry::ConnectionRegistry;
use crate::retry::open_with_retry;
use crate::session::{MessageBased, SessionHandle, SharedSession};
use crate::settings::Settings;

/// Delay between write and raw read in [`Instrument::query_binary`] when the
/// caller does not pass one.
pub const DEFAULT_QUERY_BINARY_DELAY: Duration = Duration::from_millis(100);

const DUMMY_TEXT: &str = "0";
const DUMMY_BINARY: &[u8] = b"0";

/// A named instrument session over a message-based bus.
///
/// The handle is shared ownership: instruments bound to the same address
/// hold the same underlying session, and whoever closes first closes it for
/// everyone (the registry entry disappears; siblings notice on their next
/// operation, which fails with a transport-level error).
pub struct Instrument {
    name: String,
    address: String,
    handle: Option<SharedSession>,
    settings: Arc<Settings>,
    registry: Arc<ConnectionRegistry>,
}

impl Instrument {
    /// Open an instrument session for `address` within `ctx`.
    ///
    /// With sending disabled this returns a handle-less instrument whose
    /// operations all produce dummy values. Otherwise an existing session
    /// for the address is adopted, or a new one is opened with bounded
    /// retry and registered.
    ///
    /// # Errors
    ///
    /// [`VisaError::Open`] when every open attempt failed.
    pub fn open(
        ctx: &VisaContext,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> VisaResult<Self> {
        let name = name.into();
        let address = address.into();
        let settings = ctx.settings_arc();
        let registry = ctx.registry_arc();

        if settings.print_enabled() {
            info!(instrument = %name, resource = %address, "open");
        }
        if !settings.send_enabled() {
            return Ok(Self {
                name,
                address,
                handle: None,
                settings,
                registry,
            });
        }

        // Held from lookup through register so concurrent opens of the same
        // address cannot both miss the lookup.
        let gate = registry.open_gate();

        if let Some(handle) = registry.lookup(&address) {
            debug!(instrument = %name, resource = %address, "reusing existing session");
            drop(gate);
            return Ok(Self {
                name,
                address,
                handle: Some(handle),
                settings,
                registry,
            });
        }

        let handle = match open_with_retry(ctx.opener().as_ref(), &address, ctx.retry_policy()) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(instrument = %name, resource = %address, error = %err, "open failed");
                return Err(VisaError::Open { name, address });
            }
        };

        if handle.is_message_based() {
            registry.register(address.clone(), handle.clone());
        }
        drop(gate);

        Ok(Self {
            name,
            address,
            handle: Some(handle),
            settings,
            registry,
        })
    }

    /// The caller-supplied label, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resource address this instrument is bound to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The shared session handle, if this instance holds one. Absent in
    /// disabled mode and after `close`.
    pub fn handle(&self) -> Option<&SharedSession> {
        self.handle.as_ref()
    }

    fn message_based(&self) -> VisaResult<&dyn MessageBased> {
        self.handle
            .as_deref()
            .and_then(SessionHandle::message_based)
            .ok_or_else(|| VisaError::NotMessageBased {
                name: self.name.clone(),
            })
    }

    /// Send a text command and read the text response, optionally sleeping
    /// `delay` between the two.
    ///
    /// Returns `"0"` with sending disabled.
    ///
    /// # Errors
    ///
    /// [`VisaError::NotMessageBased`] when no message-based handle is held,
    /// [`VisaError::Query`] on transport failure.
    pub fn query(&self, command: &str, delay: Option<Duration>) -> VisaResult<String> {
        if self.settings.print_enabled() {
            if self.settings.print_payloads() {
                info!(instrument = %self.name, command, "query");
            } else {
                info!(instrument = %self.name, "query");
            }
        }
        if !self.settings.send_enabled() {
            return Ok(DUMMY_TEXT.to_string());
        }

        let session = self.message_based()?;
        let result = session.send(command).and_then(|()| {
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            session.receive()
        });

        match result {
            Ok(response) => {
                if self.settings.print_enabled() && self.settings.print_payloads() {
                    info!(instrument = %self.name, response = %response, "recv");
                }
                Ok(response)
            }
            Err(err) => {
                warn!(
                    instrument = %self.name,
                    resource = %self.address,
                    command,
                    error = %err,
                    "query failed"
                );
                Err(VisaError::Query {
                    name: self.name.clone(),
                    address: self.address.clone(),
                    command: command.to_string(),
                })
            }
        }
    }

    /// Send a text command without reading a response.
    ///
    /// No-op with sending disabled.
    ///
    /// # Errors
    ///
    /// [`VisaError::NotMessageBased`] when no message-based handle is held,
    /// [`VisaError::Write`] on transport failure.
    pub fn write(&self, command: &str) -> VisaResult<()> {
        if self.settings.print_enabled() {
            if self.settings.print_payloads() {
                info!(instrument = %self.name, command, "write");
            } else {
                info!(instrument = %self.name, "write");
            }
        }
        if !self.settings.send_enabled() {
            return Ok(());
        }

        let session = self.message_based()?;
        session.send(command).map_err(|err| {
            warn!(
                instrument = %self.name,
                resource = %self.address,
                command,
                error = %err,
                "write failed"
            );
            VisaError::Write {
                name: self.name.clone(),
                address: self.address.clone(),
                command: command.to_string(),
            }
        })
    }

    /// Read from the instrument: a text line, or with `count` exactly that
    /// many raw bytes decoded as UTF-8.
    ///
    /// Returns `"0"` with sending disabled.
    ///
    /// # Errors
    ///
    /// [`VisaError::NotMessageBased`] when no message-based handle is held,
    /// [`VisaError::Read`] on transport failure or invalid UTF-8.
    pub fn read(&self, count: Option<usize>) -> VisaResult<String> {
        if self.settings.print_enabled() {
            info!(instrument = %self.name, "read");
        }
        if !self.settings.send_enabled() {
            return Ok(DUMMY_TEXT.to_string());
        }

        let session = self.message_based()?;
        let result = match count {
            Some(count) => session
                .receive_bytes(count)
                .and_then(|bytes| String::from_utf8(bytes).map_err(Into::into)),
            None => session.receive(),
        };

        match result {
            Ok(response) => {
                if self.settings.print_enabled() && self.settings.print_payloads() {
                    info!(instrument = %self.name, response = %response, "recv");
                }
                Ok(response)
            }
            Err(err) => {
                warn!(
                    instrument = %self.name,
                    resource = %self.address,
                    error = %err,
                    "read failed"
                );
                Err(VisaError::Read {
                    name: self.name.clone(),
                    address: self.address.clone(),
                })
            }
        }
    }

    /// Read all currently available raw bytes.
    ///
    /// Returns empty bytes with sending disabled.
    ///
    /// # Errors
    ///
    /// [`VisaError::NotMessageBased`] when no message-based handle is held,
    /// [`VisaError::ReadBinary`] on transport failure.
    pub fn read_binary(&self) -> VisaResult<Vec<u8>> {
        if self.settings.print_enabled() {
            info!(instrument = %self.name, "read binary");
        }
        if !self.settings.send_enabled() {
            return Ok(Vec::new());
        }

        let session = self.message_based()?;
        session.receive_raw().map_err(|err| {
            warn!(
                instrument = %self.name,
                resource = %self.address,
                error = %err,
                "read binary failed"
            );
            VisaError::ReadBinary {
                name: self.name.clone(),
                address: self.address.clone(),
            }
        })
    }

    /// Send raw bytes verbatim.
    ///
    /// No-op with sending disabled.
    ///
    /// # Errors
    ///
    /// [`VisaError::NotMessageBased`] when no message-based handle is held,
    /// [`VisaError::WriteBinary`] on transport failure.
    pub fn write_binary(&self, payload: &[u8]) -> VisaResult<()> {
        if self.settings.print_enabled() {
            info!(instrument = %self.name, payload_len = payload.len(), "write binary");
        }
        if !self.settings.send_enabled() {
            return Ok(());
        }

        let session = self.message_based()?;
        session.send_raw(payload).map_err(|err| {
            warn!(
                instrument = %self.name,
                resource = %self.address,
                error = %err,
                "write binary failed"
            );
            VisaError::WriteBinary {
                name: self.name.clone(),
                address: self.address.clone(),
            }
        })
    }

    /// Send a text command, wait `delay` (default 0.1 s), then read all
    /// available raw bytes.
    ///
    /// Returns `b"0"` with sending disabled.
    ///
    /// # Errors
    ///
    /// [`VisaError::NotMessageBased`] when no message-based handle is held,
    /// [`VisaError::QueryBinary`] when either sub-operation fails.
    pub fn query_binary(&self, command: &str, delay: Option<Duration>) -> VisaResult<Vec<u8>> {
        if self.settings.print_enabled() {
            if self.settings.print_payloads() {
                info!(instrument = %self.name, command, "query binary");
            } else {
                info!(instrument = %self.name, "query binary");
            }
        }
        if !self.settings.send_enabled() {
            return Ok(DUMMY_BINARY.to_vec());
        }
        self.message_based()?;

        let result = self.write(command).and_then(|()| {
            thread::sleep(delay.unwrap_or(DEFAULT_QUERY_BINARY_DELAY));
            self.read_binary()
        });

        match result {
            Ok(response) => {
                if self.settings.print_enabled() && self.settings.print_payloads() {
                    info!(instrument = %self.name, response_len = response.len(), "recv");
                }
                Ok(response)
            }
            Err(err) => {
                warn!(
                    instrument = %self.name,
                    resource = %self.address,
                    command,
                    error = %err,
                    "query binary failed"
                );
                Err(VisaError::QueryBinary {
                    name: self.name.clone(),
                    address: self.address.clone(),
                    command: command.to_string(),
                })
            }
        }
    }

    /// Close this instrument's session.
    ///
    /// No-op with sending disabled, and safe to call twice. Closing a
    /// message-based handle is best-effort (failures are swallowed), removes
    /// the handle from the registry by identity - which affects every
    /// instrument sharing it - and clears this instance's handle. A handle
    /// without message-based I/O is left in place; it was never registered.
    pub fn close(&mut self) {
        if self.settings.print_enabled() {
            info!(instrument = %self.name, "close");
        }
        if !self.settings.send_enabled() {
            return;
        }

        if let Some(handle) = self.handle.take() {
            if let Some(session) = handle.message_based() {
                if let Err(err) = session.close() {
                    debug!(
                        instrument = %self.name,
                        resource = %self.address,
                        error = %err,
                        "close failed"
                    );
                }
                self.registry.unregister(&handle);
            } else {
                // Never registered, nothing to tear down; keep it.
                self.handle = Some(handle);
            }
        }
    }
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("open", &self.handle.is_some())
            .finish()
    }
}
