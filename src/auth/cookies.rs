//! Browser session cookies and reqwest jar loading.
//!
//! [`SessionCookie`] is the common currency between the browser driver (which
//! reads and seeds cookies over CDP) and the download client (which carries
//! them in a `reqwest::cookie::Jar`).

use std::fmt;
use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, warn};

/// A single cookie shared between the browser session and the HTTP client.
///
/// The value field is intentionally redacted in Debug output to prevent
/// accidental logging of session tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name.
    pub name: String,
    /// The domain the cookie belongs to (e.g., `.example.com`).
    pub domain: String,
    /// The URL path scope for the cookie.
    pub path: String,
    /// Whether the cookie should only be sent over HTTPS.
    pub secure: bool,
    /// Whether the cookie is hidden from page scripts.
    pub http_only: bool,
    value: String,
}

impl SessionCookie {
    /// Creates a plain (non-secure, script-visible) cookie.
    #[must_use]
    pub fn new(name: &str, value: &str, domain: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            domain: domain.to_string(),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            secure: false,
            http_only: false,
            value: value.to_string(),
        }
    }

    /// Sets the `Secure` and `HttpOnly` flags.
    #[must_use]
    pub fn with_flags(mut self, secure: bool, http_only: bool) -> Self {
        self.secure = secure;
        self.http_only = http_only;
        self
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive; never log the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

// Custom Debug impl that redacts the cookie value.
impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Creates a fresh jar holding `cookies`.
#[must_use]
pub fn load_cookies_into_jar(cookies: &[SessionCookie]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());
    add_cookies_to_jar(&jar, cookies);
    jar
}

/// Adds (or replaces) `cookies` in an existing jar.
///
/// Returns the number of cookies accepted.
pub fn add_cookies_to_jar(jar: &Jar, cookies: &[SessionCookie]) -> usize {
    let mut added = 0;
    for cookie in cookies {
        let origin_url = build_origin_url(cookie);
        match origin_url.parse::<url::Url>() {
            Ok(url) => {
                jar.add_cookie_str(&build_set_cookie_string(cookie), &url);
                added += 1;
                debug!(domain = %cookie.domain, name = %cookie.name, "loaded cookie into jar");
            }
            Err(_) => {
                warn!(
                    domain = %cookie.domain,
                    name = %cookie.name,
                    "skipping cookie with unparseable domain"
                );
            }
        }
    }
    added
}

/// Builds a `Set-Cookie` header string from a `SessionCookie`.
fn build_set_cookie_string(cookie: &SessionCookie) -> String {
    let mut parts = vec![
        format!("{}={}", cookie.name, cookie.value()),
        format!("Domain={}", cookie.domain),
        format!("Path={}", cookie.path),
    ];
    if cookie.secure {
        parts.push("Secure".to_string());
    }
    if cookie.http_only {
        parts.push("HttpOnly".to_string());
    }
    parts.join("; ")
}

/// Builds the origin URL for `Jar::add_cookie_str`.
///
/// Uses `https://` for secure cookies and `http://` otherwise, and strips
/// the leading dot from the domain.
fn build_origin_url(cookie: &SessionCookie) -> String {
    let scheme = if cookie.secure { "https" } else { "http" };
    let domain = cookie.domain.strip_prefix('.').unwrap_or(&cookie.domain);
    format!("{scheme}://{domain}{}", cookie.path)
}
