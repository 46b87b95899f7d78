//! Session cookie handling.
//!
//! Cookies harvested from the browser session are copied into the streaming
//! HTTP client's jar so downloads ride on the same authenticated session.

mod cookies;

pub use cookies::{SessionCookie, add_cookies_to_jar, load_cookies_into_jar};
