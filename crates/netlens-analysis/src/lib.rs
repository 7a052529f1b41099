//! Relevance pipeline over captured network traffic.
//!
//! A question is turned into search terms, the captured exchanges are
//! narrowed to those containing the terms, and the survivors are handed
//! to a reasoning service together with the question.

pub mod analyzer;
mod error;
pub mod filter;
pub mod keywords;
pub mod prompts;
pub mod report;
pub mod suggest;

#[cfg(test)]
mod testing;

pub use analyzer::{AnalysisOutcome, AnalysisReport, AnalyzerSettings, NetworkAnalyzer};
pub use error::AnalysisError;
pub use filter::{FilterSettings, FocusedSelection, KeywordMatch, RelevantExchange};
pub use keywords::{KeywordSettings, KeywordSynthesizer};
pub use report::render_raw_report;
pub use suggest::{UrlSuggester, normalize_target_url};
