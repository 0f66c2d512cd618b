//! Session history stores for Marionette.
//!
//! Histories are process-local; nothing here survives a restart.

pub mod in_memory;

pub use in_memory::InMemoryHistory;
