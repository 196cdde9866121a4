//! Simulated instrument bus.
//!
//! Stands in for real hardware in tests and dry runs: open failures and I/O
//! failures can be injected, every call is logged for verification, and
//! query commands get canned responses. This is the default backend when the
//! `instrument_visa` feature is off.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;

use crate::backend::ResourceOpener;
use crate::session::{MessageBased, SessionHandle, SharedSession};

/// A simulated bus with scriptable behavior.
///
/// # Example
///
/// ```
/// use visa_bundle::backend::{ResourceOpener, SimBus};
///
/// let bus = SimBus::new().with_resources(["SIM::1::INSTR"]);
/// let handle = bus.open_resource("SIM::1::INSTR")?;
/// assert!(handle.is_message_based());
/// assert_eq!(bus.open_count("SIM::1::INSTR"), 1);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Default)]
pub struct SimBus {
    resources: Mutex<Vec<String>>,
    open_failures: Mutex<HashMap<String, u32>>,
    non_message_based: Mutex<HashSet<String>>,
    fail_enumeration: AtomicBool,
    opens: Mutex<HashMap<String, u32>>,
    sessions: Mutex<Vec<(String, SimSession)>>,
}

impl SimBus {
    /// Create an empty simulated bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the addresses `list_resources` reports.
    pub fn with_resources<I, S>(self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.resources.lock() = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Make the next `count` open attempts for `address` fail.
    pub fn fail_next_opens(&self, address: &str, count: u32) {
        self.open_failures.lock().insert(address.to_string(), count);
    }

    /// Make opens of `address` yield a handle without message-based I/O.
    pub fn mark_non_message_based(&self, address: &str) {
        self.non_message_based.lock().insert(address.to_string());
    }

    /// Make `list_resources` fail until called with `false`.
    pub fn fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    /// How many open attempts (successful or not) have been made for
    /// `address`.
    pub fn open_count(&self, address: &str) -> u32 {
        self.opens.lock().get(address).copied().unwrap_or(0)
    }

    /// The most recently opened session for `address`, for scripting and
    /// inspection from tests.
    pub fn session(&self, address: &str) -> Option<SimSession> {
        self.sessions
            .lock()
            .iter()
            .rev()
            .find(|(addr, _)| addr == address)
            .map(|(_, session)| session.clone())
    }
}

impl ResourceOpener for SimBus {
    fn open_resource(&self, address: &str) -> Result<SharedSession> {
        *self.opens.lock().entry(address.to_string()).or_insert(0) += 1;

        {
            let mut failures = self.open_failures.lock();
            if let Some(remaining) = failures.get_mut(address) {
                if *remaining > 0 {
                    *remaining -= 1;
                    bail!("simulated open failure: {address}");
                }
            }
        }

        if self.non_message_based.lock().contains(address) {
            return Ok(Arc::new(SessionHandle::Other));
        }

        let session = SimSession::new(address);
        self.sessions
            .lock()
            .push((address.to_string(), session.clone()));
        Ok(Arc::new(SessionHandle::MessageBased(Box::new(session))))
    }

    fn list_resources(&self) -> Result<Vec<String>> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            bail!("simulated enumeration failure");
        }
        Ok(self.resources.lock().clone())
    }
}

struct SimSessionInner {
    address: String,
    closed: AtomicBool,
    fail_next: AtomicBool,
    replies: Mutex<HashMap<String, String>>,
    rx: Mutex<VecDeque<u8>>,
    log: Mutex<Vec<String>>,
}

/// One simulated session. Clones share state, so a test can keep a clone
/// while the instrument drives the session through its shared handle.
#[derive(Clone)]
pub struct SimSession {
    inner: Arc<SimSessionInner>,
}

impl SimSession {
    fn new(address: &str) -> Self {
        Self {
            inner: Arc::new(SimSessionInner {
                address: address.to_string(),
                closed: AtomicBool::new(false),
                fail_next: AtomicBool::new(false),
                replies: Mutex::new(HashMap::new()),
                rx: Mutex::new(VecDeque::new()),
                log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Script the response to a specific command.
    pub fn stub_reply(&self, command: &str, reply: &str) {
        self.inner
            .replies
            .lock()
            .insert(command.to_string(), reply.to_string());
    }

    /// Queue raw bytes for the next read.
    pub fn push_bytes(&self, payload: &[u8]) {
        self.inner.rx.lock().extend(payload.iter().copied());
    }

    /// Make the next operation on this session fail.
    pub fn inject_next_failure(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }

    /// All calls made on this session, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.inner.log.lock().clone()
    }

    /// Whether `close` has been called on this session.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn log(&self, entry: String) {
        self.inner.log.lock().push(entry);
    }

    fn check_usable(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            bail!("session closed: {}", self.inner.address);
        }
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            bail!("injected failure: {}", self.inner.address);
        }
        Ok(())
    }

    fn reply_for(&self, command: &str) -> Option<String> {
        if let Some(reply) = self.inner.replies.lock().get(command) {
            return Some(reply.clone());
        }
        match command {
            "*IDN?" => Some("Sim Instrument,Model XYZ,Serial123,Firmware1.0".to_string()),
            cmd if cmd.ends_with('?') => Some(format!("sim response for query: {cmd}")),
            _ => None,
        }
    }
}

impl MessageBased for SimSession {
    fn send(&self, command: &str) -> Result<()> {
        self.check_usable()?;
        self.log(format!("send: {command}"));
        if let Some(reply) = self.reply_for(command) {
            let mut rx = self.inner.rx.lock();
            rx.extend(reply.into_bytes());
            rx.push_back(b'\n');
        }
        Ok(())
    }

    fn send_raw(&self, payload: &[u8]) -> Result<()> {
        self.check_usable()?;
        self.log(format!("send_raw: {} bytes", payload.len()));
        Ok(())
    }

    fn receive(&self) -> Result<String> {
        self.check_usable()?;
        self.log("receive".to_string());
        let mut rx = self.inner.rx.lock();
        if rx.is_empty() {
            bail!("nothing to read: {}", self.inner.address);
        }
        let mut line = Vec::new();
        while let Some(byte) = rx.pop_front() {
            if byte == b'\n' {
                break;
            }
            line.push(byte);
        }
        String::from_utf8(line).map_err(|err| anyhow!("non-UTF-8 response: {err}"))
    }

    fn receive_bytes(&self, count: usize) -> Result<Vec<u8>> {
        self.check_usable()?;
        self.log(format!("receive_bytes: {count}"));
        let mut rx = self.inner.rx.lock();
        if rx.len() < count {
            bail!(
                "short read: wanted {count} bytes, have {}: {}",
                rx.len(),
                self.inner.address
            );
        }
        Ok(rx.drain(..count).collect())
    }

    fn receive_raw(&self) -> Result<Vec<u8>> {
        self.check_usable()?;
        self.log("receive_raw".to_string());
        let mut rx = self.inner.rx.lock();
        Ok(rx.drain(..).collect())
    }

    fn clear(&self) -> Result<()> {
        self.check_usable()?;
        self.log("clear".to_string());
        self.inner.rx.lock().clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            bail!("injected close failure: {}", self.inner.address);
        }
        self.log("close".to_string());
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
