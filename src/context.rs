//! Shared communication context.
//!
//! The original design kept the connection list and settings as module-level
//! globals; here they live in an explicitly constructed [`VisaContext`]
//! handed to every instrument by shared ownership. Cloning a context is
//! cheap and clones observe the same settings and registry. Tests construct
//! a fresh context each; code that wants the original's process-wide
//! singleton ergonomics uses [`VisaContext::global`].

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::backend::{default_opener, ResourceOpener};
use crate::config::BundleConfig;
use crate::error::VisaResult;
use crate::instrument::Instrument;
use crate::registry::{ConnectionEntry, ConnectionRegistry};
use crate::retry::RetryPolicy;
use crate::settings::Settings;

static GLOBAL: Lazy<VisaContext> = Lazy::new(VisaContext::new);

/// Settings, registry, bus backend, and retry policy for one instrument
/// stack.
#[derive(Clone)]
pub struct VisaContext {
    settings: Arc<Settings>,
    registry: Arc<ConnectionRegistry>,
    opener: Arc<dyn ResourceOpener>,
    retry: RetryPolicy,
}

impl Default for VisaContext {
    fn default() -> Self {
        Self::new()
    }
}

impl VisaContext {
    /// A fresh context over this build's default backend (see
    /// [`default_opener`]), with default settings and retry policy.
    pub fn new() -> Self {
        Self::with_opener(default_opener())
    }

    /// A fresh context over a specific bus backend.
    pub fn with_opener(opener: Arc<dyn ResourceOpener>) -> Self {
        Self {
            settings: Arc::new(Settings::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            opener,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A fresh context over the default backend with settings and retry
    /// policy taken from `config`.
    pub fn from_config(config: &BundleConfig) -> Self {
        let ctx = Self::new().with_retry(config.retry.to_policy());
        config.settings.apply(ctx.settings());
        ctx
    }

    /// The process-wide context, created on first use. Every caller sees
    /// the same settings and registry, matching the original's global
    /// connection list.
    pub fn global() -> &'static VisaContext {
        &GLOBAL
    }

    /// The shared settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Open an instrument session for `address`, labelled `name`. See
    /// [`Instrument::open`].
    ///
    /// # Errors
    ///
    /// [`VisaError::Open`](crate::VisaError::Open) when every open attempt
    /// failed.
    pub fn instrument(
        &self,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> VisaResult<Instrument> {
        Instrument::open(self, name, address)
    }

    /// Resource addresses currently visible on the bus. Discovery is
    /// advisory: enumeration failure yields an empty list, not an error.
    pub fn list_resources(&self) -> Vec<String> {
        match self.opener.list_resources() {
            Ok(addresses) => addresses,
            Err(err) => {
                debug!(error = %err, "resource enumeration failed");
                Vec::new()
            }
        }
    }

    /// A copy of the currently open connections.
    pub fn snapshot(&self) -> Vec<ConnectionEntry> {
        self.registry.snapshot()
    }

    /// Best-effort close of every registered session; the registry is
    /// cleared unconditionally.
    pub fn close_all(&self) {
        self.registry.close_all();
    }

    pub(crate) fn settings_arc(&self) -> Arc<Settings> {
        self.settings.clone()
    }

    pub(crate) fn registry_arc(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub(crate) fn opener(&self) -> &Arc<dyn ResourceOpener> {
        &self.opener
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }
}

impl std::fmt::Debug for VisaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisaContext")
            .field("open_connections", &self.registry.len())
            .field("retry", &self.retry)
            .finish()
    }
}
