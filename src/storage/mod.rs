//! Storage backends and the traits they implement.

pub mod memory;
pub mod session;

pub use memory::{MemorySession, MemoryStore};
pub use session::{EntitySet, Store, StoreSession};

/// Backend behavior knobs, injected at store construction.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    strict_writes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            strict_writes: true,
        }
    }
}

impl StoreOptions {
    /// Options with the defaults: strict writes on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Control what a flush does when an update or removal targets a row
    /// the store does not hold. Strict (the default) surfaces a
    /// concurrency conflict; lenient skips the write and counts zero rows.
    pub fn with_strict_writes(mut self, strict: bool) -> Self {
        self.strict_writes = strict;
        self
    }

    /// Whether writes against missing rows are conflicts.
    pub fn strict_writes(&self) -> bool {
        self.strict_writes
    }
}
