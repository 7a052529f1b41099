//! LLM Provider protocol definitions.
//!
//! Providers connect to a text-completion API and turn a prompt into
//! generated text plus usage counters.

mod request;
mod response;
mod traits;

pub use request::*;
pub use response::*;
pub use traits::*;
