//! URL filter applied to new exchanges.

/// Admits URLs that share a substring relation with any term.
///
/// A term matches when it occurs in the URL or the URL occurs in it. An
/// empty filter admits everything.
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    terms: Vec<String>,
}

impl UrlFilter {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    pub fn is_active(&self) -> bool {
        !self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn allows(&self, url: &str) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        self.terms
            .iter()
            .any(|term| url.contains(term.as_str()) || (!url.is_empty() && term.contains(url)))
    }
}
