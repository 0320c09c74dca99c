//! Route matching logic.
//!
//! # Responsibilities
//! - Decide whether a request path falls under a registered prefix
//! - Pick one prefix deterministically when several match
//! - Strip the matched prefix before forwarding
//!
//! # Design Decisions
//! - Matching is segment-aligned: `/a` matches `/a` and `/a/x`, never `/ab`
//! - Longest prefix wins, so `/a/b` shadows `/a` for paths under `/a/b`
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

/// Matches the request path against one prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True if `path` is the prefix itself or lies beneath it.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix.is_empty() || self.prefix == "/" {
            return false;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// The path the backend sees. Always starts with `/`.
    pub fn strip<'a>(&self, path: &'a str) -> &'a str {
        match path.strip_prefix(self.prefix.as_str()) {
            Some("") | None => "/",
            Some(rest) => rest,
        }
    }
}

/// Select the longest prefix that matches `path`.
pub fn longest_match<'a, I>(prefixes: I, path: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    prefixes
        .into_iter()
        .filter(|p| PathPrefixMatcher::new(*p).matches(path))
        .max_by_key(|p| p.len())
}
