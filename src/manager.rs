//! Instrument manager.
//!
//! A convenience layer mapping caller-chosen names to instruments for bulk
//! lifecycle operations. Name uniqueness is enforced here and only here;
//! the connection registry underneath keys on addresses and happily serves
//! the same session to differently named instruments.

use std::collections::HashMap;

use crate::context::VisaContext;
use crate::error::{VisaError, VisaResult};
use crate::instrument::Instrument;

/// Named instruments over one shared [`VisaContext`].
#[derive(Debug)]
pub struct InstrumentManager {
    ctx: VisaContext,
    instruments: HashMap<String, Instrument>,
}

impl InstrumentManager {
    /// A manager over `ctx`.
    pub fn new(ctx: VisaContext) -> Self {
        Self {
            ctx,
            instruments: HashMap::new(),
        }
    }

    /// Open an instrument for `address` and store it under `name`.
    ///
    /// The duplicate check happens before any open attempt, so a rejected
    /// `add` has no bus side effects.
    ///
    /// # Errors
    ///
    /// [`VisaError::DuplicateName`] when `name` is already present,
    /// [`VisaError::Open`] when the open fails.
    pub fn add(&mut self, name: &str, address: &str) -> VisaResult<&Instrument> {
        if self.instruments.contains_key(name) {
            return Err(VisaError::DuplicateName(name.to_string()));
        }
        let instrument = self.ctx.instrument(name, address)?;
        Ok(self.instruments.entry(name.to_string()).or_insert(instrument))
    }

    /// The instrument stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Instrument> {
        self.instruments.get(name)
    }

    /// Mutable access to the instrument stored under `name`, if any.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Instrument> {
        self.instruments.get_mut(name)
    }

    /// Close and drop the instrument stored under `name`. Returns whether
    /// anything was removed; a missing name is not an error.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.instruments.remove(name) {
            Some(mut instrument) => {
                instrument.close();
                true
            }
            None => false,
        }
    }

    /// Close every managed instrument and clear the mapping.
    pub fn close_all(&mut self) {
        for instrument in self.instruments.values_mut() {
            instrument.close();
        }
        self.instruments.clear();
    }

    /// Names of all managed instruments.
    pub fn names(&self) -> Vec<String> {
        self.instruments.keys().cloned().collect()
    }

    /// Number of managed instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Whether the manager holds no instruments.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Resource addresses currently visible on the bus; empty on
    /// enumeration failure (discovery is advisory, not critical-path).
    pub fn discover(&self) -> Vec<String> {
        self.ctx.list_resources()
    }
}
