//! # NetLens Protocols
//!
//! Interface definitions shared by the NetLens crates.
//! Contains only contracts - no network or browser implementations.
//!
//! ## Core Traits
//!
//! - [`LLMProvider`] - Trait for reasoning-service (LLM) implementations

pub mod error;
pub mod provider;
pub mod types;

pub use error::ProviderError;
pub use provider::{CompletionRequest, CompletionResponse, LLMProvider};
pub use types::*;
