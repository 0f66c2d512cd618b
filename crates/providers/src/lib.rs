//! Token source implementations for Marionette.
//!
//! All providers implement the `marionette_core::Provider` trait and hand
//! back plain text fragments, whatever their upstream wire protocol.
//! The router selects the correct provider based on configuration.

pub mod ollama;
pub mod openai_compat;
pub mod router;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, Route};
pub use transport::Timeouts;
