//! Bus backends.
//!
//! A backend knows how to enumerate resource addresses and open sessions on
//! them. The instrument layer only sees the [`ResourceOpener`] trait, so the
//! same pooling/retry/gating semantics run against real VISA hardware or the
//! in-process simulated bus.
//!
//! The real backend wraps the `visa-rs` crate and is gated behind the
//! `instrument_visa` feature; default builds carry no hardware dependency
//! and fall back to the simulated bus.

use std::sync::Arc;

use anyhow::Result;

use crate::session::SharedSession;

pub mod sim;
#[cfg(feature = "instrument_visa")]
pub mod visa;

pub use sim::{SimBus, SimSession};
#[cfg(feature = "instrument_visa")]
pub use visa::VisaBus;

/// Opens sessions on, and enumerates, an instrument bus.
///
/// Addresses are opaque resource strings (e.g. `"USB0::0x1234::0x5678::INSTR"`,
/// `"TCPIP0::host::INSTR"`) passed through unmodified; no syntax validation
/// happens at this layer.
pub trait ResourceOpener: Send + Sync {
    /// Open a session on `address`. One call corresponds to one physical
    /// open attempt; retry policy lives above this seam.
    fn open_resource(&self, address: &str) -> Result<SharedSession>;

    /// List the resource addresses currently visible on the bus.
    fn list_resources(&self) -> Result<Vec<String>>;
}

/// The backend this build defaults to: real VISA when the `instrument_visa`
/// feature is enabled, the simulated bus otherwise.
pub fn default_opener() -> Arc<dyn ResourceOpener> {
    #[cfg(feature = "instrument_visa")]
    {
        Arc::new(visa::VisaBus::new())
    }
    #[cfg(not(feature = "instrument_visa"))]
    {
        Arc::new(sim::SimBus::new())
    }
}
