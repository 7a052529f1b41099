//! Which exchanges the page snapshot may stand in for.

use crate::model::{CapturedExchange, PageSnapshot};

/// Decides whether a page snapshot replaces an exchange's missing body.
///
/// Only consulted for exchanges whose body is unavailable.
pub trait FallbackAffinity: Send + Sync {
    fn applies(&self, snapshot: &PageSnapshot, exchange: &CapturedExchange) -> bool;
}

impl<F> FallbackAffinity for F
where
    F: Fn(&PageSnapshot, &CapturedExchange) -> bool + Send + Sync,
{
    fn applies(&self, snapshot: &PageSnapshot, exchange: &CapturedExchange) -> bool {
        self(snapshot, exchange)
    }
}

/// Every unavailable body receives the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyUnavailable;

impl FallbackAffinity for AnyUnavailable {
    fn applies(&self, _snapshot: &PageSnapshot, _exchange: &CapturedExchange) -> bool {
        true
    }
}

/// The fallback applies only when the page URL contains one of the fragments.
#[derive(Debug, Clone, Default)]
pub struct PageUrlFragments {
    fragments: Vec<String>,
}

impl PageUrlFragments {
    pub fn new(fragments: Vec<String>) -> Self {
        Self { fragments }
    }
}

impl FallbackAffinity for PageUrlFragments {
    fn applies(&self, snapshot: &PageSnapshot, _exchange: &CapturedExchange) -> bool {
        self.fragments
            .iter()
            .any(|fragment| snapshot.url.contains(fragment.as_str()))
    }
}
