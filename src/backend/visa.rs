//! Real VISA backend (`instrument_visa` feature).
//!
//! Wraps `visa-rs`. VISA sessions are not thread-safe, so each session's
//! instrument handle sits behind a mutex and all I/O goes through it
//! serially. A resource manager is created per open; the manager itself
//! holds no long-lived VISA state.

use std::ffi::CString;
use std::io::{BufRead, BufReader, Read, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use tracing::debug;
use visa_rs::{AccessMode, DefaultRM, Instrument, TIMEOUT_IMMEDIATE};

use crate::backend::ResourceOpener;
use crate::session::{MessageBased, SessionHandle, SharedSession};

/// Bus backend driving real instruments through the system VISA library.
#[derive(Debug, Default)]
pub struct VisaBus;

impl VisaBus {
    /// Create the backend. Cheap; the VISA library is touched on first use.
    pub fn new() -> Self {
        Self
    }
}

impl ResourceOpener for VisaBus {
    fn open_resource(&self, address: &str) -> Result<SharedSession> {
        let rm = DefaultRM::new().context("failed to create VISA resource manager")?;
        let res = CString::new(address)
            .context("resource address contains an interior NUL")?
            .into();
        let instr = rm
            .open(&res, AccessMode::NO_LOCK, TIMEOUT_IMMEDIATE)
            .with_context(|| format!("failed to open VISA resource: {address}"))?;

        debug!(resource = %address, "opened VISA session");
        Ok(Arc::new(SessionHandle::MessageBased(Box::new(
            VisaSession {
                address: address.to_string(),
                instr: Mutex::new(Some(instr)),
            },
        ))))
    }

    fn list_resources(&self) -> Result<Vec<String>> {
        let rm = DefaultRM::new().context("failed to create VISA resource manager")?;
        let pattern = CString::new("?*::INSTR")
            .map_err(|err| anyhow!("invalid search pattern: {err}"))?
            .into();
        let mut addresses = Vec::new();
        for res in rm.find_res_list(&pattern)? {
            addresses.push(res?.to_string());
        }
        Ok(addresses)
    }
}

struct VisaSession {
    address: String,
    instr: Mutex<Option<Instrument>>,
}

impl VisaSession {
    fn with_instr<T>(&self, op: impl FnOnce(&mut Instrument) -> Result<T>) -> Result<T> {
        let mut guard = self.instr.lock();
        match guard.as_mut() {
            Some(instr) => op(instr),
            None => bail!("session closed: {}", self.address),
        }
    }
}

impl MessageBased for VisaSession {
    fn send(&self, command: &str) -> Result<()> {
        self.with_instr(|instr| {
            instr.write_all(command.as_bytes())?;
            instr.write_all(b"\n")?;
            Ok(())
        })
    }

    fn send_raw(&self, payload: &[u8]) -> Result<()> {
        self.with_instr(|instr| {
            instr.write_all(payload)?;
            Ok(())
        })
    }

    fn receive(&self) -> Result<String> {
        self.with_instr(|instr| {
            let mut line = Vec::new();
            BufReader::new(instr).read_until(b'\n', &mut line)?;
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            String::from_utf8(line).map_err(|err| anyhow!("non-UTF-8 response: {err}"))
        })
    }

    fn receive_bytes(&self, count: usize) -> Result<Vec<u8>> {
        self.with_instr(|instr| {
            let mut payload = vec![0u8; count];
            instr.read_exact(&mut payload)?;
            Ok(payload)
        })
    }

    fn receive_raw(&self) -> Result<Vec<u8>> {
        self.with_instr(|instr| {
            let mut payload = Vec::new();
            instr.read_to_end(&mut payload)?;
            Ok(payload)
        })
    }

    fn clear(&self) -> Result<()> {
        self.with_instr(|instr| {
            instr.clear()?;
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        match self.instr.lock().take() {
            // Dropping the instrument closes the underlying VISA session.
            Some(instr) => {
                drop(instr);
                Ok(())
            }
            None => bail!("session already closed: {}", self.address),
        }
    }
}
