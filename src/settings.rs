//! Process-wide communication settings.
//!
//! Two flags gate every instrument operation: `send_enabled` decides whether
//! physical I/O happens at all (off by default, so a freshly constructed
//! stack is a dry run), and `print_enabled` decides whether each operation
//! emits a human-readable trace line. Both may be flipped by any caller at
//! any time; instruments read them on every operation, never caching a
//! stale value.
//!
//! The remaining flags (`debug_enabled`, `interrupt_requested`,
//! `server_mode`) are observed only by collaborating layers; the
//! communication core stores them and otherwise treats them opaquely.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared mutable flags for the whole instrument stack.
///
/// All fields default to off except `print_payloads`, which only matters
/// once `print_enabled` is on.
#[derive(Debug)]
pub struct Settings {
    send_enabled: AtomicBool,
    print_enabled: AtomicBool,
    print_payloads: AtomicBool,
    debug_enabled: AtomicBool,
    interrupt_requested: AtomicBool,
    server_mode: AtomicBool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            send_enabled: AtomicBool::new(false),
            print_enabled: AtomicBool::new(false),
            print_payloads: AtomicBool::new(true),
            debug_enabled: AtomicBool::new(false),
            interrupt_requested: AtomicBool::new(false),
            server_mode: AtomicBool::new(false),
        }
    }
}

impl Settings {
    /// Create settings with everything off (safe-by-default: no hardware
    /// I/O, no trace output).
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether physical instrument I/O is performed. When off, every
    /// operation is a no-op returning its dummy value.
    pub fn send_enabled(&self) -> bool {
        self.send_enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable physical instrument I/O.
    pub fn set_send_enabled(&self, enabled: bool) {
        self.send_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether each operation emits a trace line.
    pub fn print_enabled(&self) -> bool {
        self.print_enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable per-operation trace lines.
    pub fn set_print_enabled(&self, enabled: bool) {
        self.print_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether trace lines include command/response bodies. Turn off when
    /// instrument traffic must not land in logs.
    pub fn print_payloads(&self) -> bool {
        self.print_payloads.load(Ordering::SeqCst)
    }

    /// Include or redact command/response bodies in trace lines.
    pub fn set_print_payloads(&self, enabled: bool) {
        self.print_payloads.store(enabled, Ordering::SeqCst);
    }

    /// Auxiliary debug flag for collaborating layers.
    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled.load(Ordering::SeqCst)
    }

    /// Set the auxiliary debug flag.
    pub fn set_debug_enabled(&self, enabled: bool) {
        self.debug_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Auxiliary interrupt flag for collaborating layers.
    pub fn interrupt_requested(&self) -> bool {
        self.interrupt_requested.load(Ordering::SeqCst)
    }

    /// Set the auxiliary interrupt flag.
    pub fn set_interrupt_requested(&self, requested: bool) {
        self.interrupt_requested.store(requested, Ordering::SeqCst);
    }

    /// Auxiliary server-mode flag for collaborating layers.
    pub fn server_mode(&self) -> bool {
        self.server_mode.load(Ordering::SeqCst)
    }

    /// Set the auxiliary server-mode flag.
    pub fn set_server_mode(&self, enabled: bool) {
        self.server_mode.store(enabled, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let settings = Settings::new();
        assert!(!settings.send_enabled());
        assert!(!settings.print_enabled());
        assert!(!settings.debug_enabled());
        assert!(!settings.interrupt_requested());
        assert!(!settings.server_mode());
    }

    #[test]
    fn payloads_are_included_by_default() {
        let settings = Settings::new();
        assert!(settings.print_payloads());
    }

    #[test]
    fn flags_toggle_independently() {
        let settings = Settings::new();
        settings.set_send_enabled(true);
        assert!(settings.send_enabled());
        assert!(!settings.print_enabled());

        settings.set_print_enabled(true);
        settings.set_send_enabled(false);
        assert!(settings.print_enabled());
        assert!(!settings.send_enabled());

        settings.set_print_payloads(false);
        assert!(!settings.print_payloads());
    }
}
