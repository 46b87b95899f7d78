//! Shared User-Agent and header profile for browser and download traffic.
//!
//! Both the browser session and the streaming HTTP client present the same
//! desktop profile so the gateway sees one consistent client.

/// Desktop Chrome User-Agent used by browser sessions and downloads.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Extra request headers sent alongside the User-Agent.
#[must_use]
pub(crate) fn default_extra_headers() -> Vec<(String, String)> {
    vec![
        ("Accept-Language".to_string(), ACCEPT_LANGUAGE.to_string()),
        ("Accept".to_string(), ACCEPT.to_string()),
    ]
}
