//! # Marionette Core
//!
//! Domain types, traits, and error definitions for the Marionette avatar
//! autopilot. This crate has **no framework dependencies**: it defines the
//! command model and the seams (token sources, history stores) that the other
//! crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem the autopilot talks to is a trait here:
//! - [`Provider`] turns a prompt into a stream of text fragments
//! - [`HistoryStore`] keeps the per-session turn log
//!
//! Implementations live in their own crates, so the pipeline can be tested
//! with scripted providers and swapped between upstreams by configuration.

pub mod command;
pub mod error;
pub mod history;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use command::{
    ArmGesture, BodyMotion, Command, Cue, FaceExpression, FullAnimation, FullOverride, Goto,
    HoldSeconds, Pose,
};
pub use error::{Error, MemoryError, ProviderError, Result};
pub use history::{HistoryStore, SessionId};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, TokenStream};
