//! # NetLens Provider - Gemini
//!
//! Google Gemini `generateContent` provider used for keyword synthesis,
//! URL suggestion and the final traffic analysis.

mod client;
mod provider;
mod types;

pub use provider::GeminiProvider;
pub use types::*;
