//! Session source for the download client.

use async_trait::async_trait;

use crate::auth::SessionCookie;
use crate::browser::BrowserError;

/// Where the download client gets its session cookies from.
///
/// The browser-backed implementation copies cookies out of a verified browser
/// session; [`StaticSession`] serves a fixed set and never re-verifies.
#[async_trait]
pub trait DownloadSession: Send {
    /// Cookies to carry for the batch. Called at most once per batch, right
    /// before the first network fetch.
    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError>;

    /// Re-runs the age-verification sequence and returns the refreshed
    /// cookies. Called after every attempt that came back as markup.
    async fn reverify(&mut self) -> Result<Vec<SessionCookie>, BrowserError>;
}

/// Fixed cookie set with no browser behind it.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    cookies: Vec<SessionCookie>,
    reverifications: usize,
}

impl StaticSession {
    #[must_use]
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        Self {
            cookies,
            reverifications: 0,
        }
    }

    /// How many times a re-verification was requested.
    #[must_use]
    pub fn reverifications(&self) -> usize {
        self.reverifications
    }
}

#[async_trait]
impl DownloadSession for StaticSession {
    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        Ok(self.cookies.clone())
    }

    async fn reverify(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        self.reverifications += 1;
        Ok(self.cookies.clone())
    }
}
