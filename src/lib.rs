//! Managed instrument communication over message-based buses.
//!
//! A single abstraction to open, query, write, and close sessions to
//! laboratory/test instruments addressed by VISA resource strings
//! (USB, GPIB, TCP/IP, serial), providing:
//!
//! - Connection pooling - at most one physical session per address; a
//!   second instrument bound to the same address adopts the existing handle
//! - Bounded retry on open - stale claims from a previous process routinely
//!   fail the first attempt, so opens retry once after a short backoff
//! - Dry-run gating - with sending disabled every operation is a no-op
//!   returning a safe dummy value, so sequences run without hardware
//!
//! Commands pass through unmodified: no SCPI parsing, no framing, no
//! address-syntax validation. This layer only adds pooling, retry, and
//! gating semantics on top of the raw read/write/query primitives.
//!
//! # Features
//!
//! - `instrument_visa` - drive real instruments through the system VISA
//!   library (`visa-rs`). Default builds use the simulated bus.
//!
//! # Example
//!
//! ```
//! use visa_bundle::VisaContext;
//!
//! let ctx = VisaContext::new();
//! ctx.settings().set_send_enabled(true);
//!
//! let scope = ctx.instrument("scope", "SIM::1::INSTR")?;
//! let id = scope.query("*IDN?", None)?;
//! assert!(!id.is_empty());
//! # Ok::<(), visa_bundle::VisaError>(())
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod instrument;
pub mod manager;
pub mod registry;
pub mod retry;
pub mod session;
pub mod settings;

pub use backend::ResourceOpener;
pub use config::{BundleConfig, ConfigError, RetryConfig, SettingsConfig};
pub use context::VisaContext;
pub use error::{VisaError, VisaResult};
pub use instrument::{Instrument, DEFAULT_QUERY_BINARY_DELAY};
pub use manager::InstrumentManager;
pub use registry::{ConnectionEntry, ConnectionRegistry};
pub use retry::{open_with_retry, RetryPolicy};
pub use session::{MessageBased, SessionHandle, SharedSession};
pub use settings::Settings;
