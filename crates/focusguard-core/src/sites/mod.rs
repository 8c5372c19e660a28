//! Blocked-site patterns and the ordered block list.
//!
//! Three pattern kinds share one stored string form, told apart by prefix:
//!
//! ```text
//! *youtube.com          wildcard   -> substring anywhere in the URL
//! https://youtube.com   exact      -> same host, `www.` ignored
//! youtube.com           legacy     -> substring anywhere in the URL
//! ```
//!
//! Everything is lowercase. User input goes through [`Pattern::from_input`],
//! which never produces the legacy kind; it only survives in old data.

mod matcher;

pub use matcher::{matches, strip_www};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A stored rule describing which pages to block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Pattern {
    /// `*<needle>`; holds the needle without the star.
    Wildcard(String),
    /// `http(s)://<host>`; holds the full lowercase URL.
    Exact(String),
    /// Bare substring from older versions.
    Legacy(String),
}

impl Pattern {
    /// Classify a stored pattern string.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if let Some(needle) = lower.strip_prefix('*') {
            Pattern::Wildcard(needle.to_string())
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            Pattern::Exact(lower)
        } else {
            Pattern::Legacy(lower)
        }
    }

    /// Normalize what a user typed into the add-site box.
    ///
    /// `youtube.com`, `www.youtube.com/` and `*youtube.com` all become the
    /// wildcard `*youtube.com`; `https://youtube.com/` becomes the exact
    /// pattern `https://youtube.com`.
    pub fn from_input(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim().to_lowercase();
        let trimmed = trimmed.strip_suffix('/').unwrap_or(&trimmed);

        if let Some(needle) = trimmed.strip_prefix('*') {
            if needle.is_empty() {
                return Err(ValidationError::EmptyPattern);
            }
            return Ok(Pattern::Wildcard(needle.to_string()));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(Pattern::Exact(trimmed.to_string()));
        }

        let domain = trimmed.strip_prefix("www.").unwrap_or(trimmed);
        if domain.is_empty() {
            return Err(ValidationError::EmptyPattern);
        }
        Ok(Pattern::Wildcard(domain.to_string()))
    }

    /// Decide whether `url` (already lowercase) is blocked by this pattern.
    pub fn matches(&self, url: &str) -> bool {
        matcher::matches(url, self)
    }

    /// Human-facing label: wildcard marker and protocol dropped.
    pub fn display_site(&self) -> String {
        match self {
            Pattern::Wildcard(needle) | Pattern::Legacy(needle) => needle.clone(),
            Pattern::Exact(url) => {
                let rest = url
                    .strip_prefix("https://")
                    .or_else(|| url.strip_prefix("http://"))
                    .unwrap_or(url);
                let host = rest.split('/').next().unwrap_or(rest);
                strip_www(host).to_string()
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Wildcard(needle) => write!(f, "*{needle}"),
            Pattern::Exact(url) => f.write_str(url),
            Pattern::Legacy(needle) => f.write_str(needle),
        }
    }
}

impl From<String> for Pattern {
    fn from(raw: String) -> Self {
        Pattern::parse(&raw)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.to_string()
    }
}

/// Ordered set of patterns; newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Pattern>", into = "Vec<Pattern>")]
pub struct BlockedSites(Vec<Pattern>);

impl BlockedSites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.0.iter()
    }

    pub fn contains(&self, pattern: &Pattern) -> bool {
        self.0.contains(pattern)
    }

    /// Prepend a new pattern.
    pub fn add(&mut self, pattern: Pattern) -> Result<(), ValidationError> {
        if self.contains(&pattern) {
            return Err(ValidationError::DuplicateSite(pattern.to_string()));
        }
        self.0.insert(0, pattern);
        Ok(())
    }

    pub fn remove(&mut self, pattern: &Pattern) -> Result<(), ValidationError> {
        let before = self.0.len();
        self.0.retain(|p| p != pattern);
        if self.0.len() == before {
            return Err(ValidationError::UnknownSite(pattern.to_string()));
        }
        Ok(())
    }

    /// Append every pattern not already present, keeping existing order.
    /// Returns how many were added.
    pub fn union<I: IntoIterator<Item = Pattern>>(&mut self, other: I) -> usize {
        let before = self.0.len();
        for pattern in other {
            if !self.contains(&pattern) {
                self.0.push(pattern);
            }
        }
        self.0.len() - before
    }

    /// First pattern in list order that blocks `url`.
    pub fn first_match(&self, url: &str) -> Option<&Pattern> {
        let url = url.to_lowercase();
        self.0.iter().find(|p| p.matches(&url))
    }
}

impl From<Vec<Pattern>> for BlockedSites {
    fn from(patterns: Vec<Pattern>) -> Self {
        let mut sites = BlockedSites::new();
        sites.union(patterns);
        sites
    }
}

impl From<BlockedSites> for Vec<Pattern> {
    fn from(sites: BlockedSites) -> Self {
        sites.0
    }
}

impl FromIterator<Pattern> for BlockedSites {
    fn from_iter<I: IntoIterator<Item = Pattern>>(iter: I) -> Self {
        let mut sites = BlockedSites::new();
        sites.union(iter);
        sites
    }
}
