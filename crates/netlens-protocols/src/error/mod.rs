//! Error types for the NetLens protocol layer.

mod provider;

pub use provider::*;
