//! URL-against-pattern matching.
//!
//! Never fails: when either side does not parse as a URL, an exact pattern
//! falls back to a prefix test.

use url::Url;

use super::Pattern;

/// Decide whether a lowercase page URL is blocked by `pattern`.
pub fn matches(url: &str, pattern: &Pattern) -> bool {
    match pattern {
        // An empty needle would block every page.
        Pattern::Wildcard(needle) | Pattern::Legacy(needle) => {
            !needle.is_empty() && url.contains(needle.as_str())
        }
        Pattern::Exact(literal) => match (host_of(url), host_of(literal)) {
            (Some(page), Some(blocked)) => page == blocked,
            _ => url.starts_with(literal.as_str()),
        },
    }
}

/// Drop a single leading `www.`.
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn host_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(strip_www(host).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(url: &str, pattern: &str) -> bool {
        matches(url, &Pattern::parse(pattern))
    }

    #[test]
    fn wildcard_matches_subdomains_and_paths() {
        assert!(m("https://music.youtube.com/watch", "*youtube.com"));
        assert!(m("https://youtube.com/", "*youtube.com"));
        assert!(!m("https://vimeo.com/", "*youtube.com"));
    }

    #[test]
    fn exact_does_not_match_subdomains() {
        assert!(!m("https://music.youtube.com/watch", "https://youtube.com"));
    }

    #[test]
    fn exact_strips_www_on_both_sides() {
        assert!(m("https://youtube.com/watch", "https://www.youtube.com"));
        assert!(m("https://www.youtube.com/watch", "https://youtube.com"));
    }

    #[test]
    fn exact_ignores_scheme_difference() {
        assert!(m("http://youtube.com/", "https://youtube.com"));
    }

    #[test]
    fn exact_falls_back_to_prefix_on_parse_failure() {
        // Unparseable page URL
        assert!(m("https://[bad/path", "https://[bad"));
        assert!(!m("https://[bad/path", "https://other"));
    }

    #[test]
    fn legacy_is_substring() {
        assert!(m("https://old.reddit.com/r/rust", "reddit"));
        assert!(!m("https://example.com", "reddit"));
    }

    #[test]
    fn empty_wildcard_matches_nothing() {
        assert!(!matches("https://example.com", &Pattern::Wildcard(String::new())));
    }
}
