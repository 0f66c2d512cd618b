//! The autopilot pipeline: a free-text instruction in, a stream of
//! animation commands out.
//!
//! 1. **Locate** the avatar on stage and prefix the instruction with it
//! 2. **Detect** deterministic navigation ("go to center") up front
//! 3. **Stream** the model's reply through the configured provider
//! 4. **Reassemble** fragments into lines as they arrive
//! 5. **Normalize** each line into a validated [`Command`] and emit it
//! 6. **Commit** the exchange to session history, then emit `Done`
//!
//! [`Command`]: marionette_core::Command

pub mod normalize;
pub mod orchestrator;
pub mod prompt;
pub mod reassembler;
pub mod spatial;
pub mod vocabulary;

#[cfg(test)]
mod test_helpers;

pub use normalize::{MalformedLine, normalize, parse_line};
pub use orchestrator::{Autopilot, AutopilotRequest};
pub use reassembler::LineReassembler;
pub use spatial::{Facing, NavDetector, NavIntent, StagePosition};
