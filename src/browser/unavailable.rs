//! Stand-in backend for builds without the `browser` feature.

use async_trait::async_trait;

use super::{BrowserDriver, BrowserError, BrowserLauncher, ControlDescriptor};
use crate::auth::SessionCookie;
use crate::config::HarvestConfig;

/// Launcher that always reports [`BrowserError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Uninhabited: no session can ever be launched.
#[derive(Debug)]
pub enum ChromiumDriver {}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Driver = ChromiumDriver;

    async fn launch(&self, _config: &HarvestConfig) -> Result<ChromiumDriver, BrowserError> {
        Err(BrowserError::Unavailable)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    type Control = ();

    async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
        match *self {}
    }

    async fn wait_until_settled(&mut self) -> Result<(), BrowserError> {
        match *self {}
    }

    async fn find_control(
        &mut self,
        _descriptor: &ControlDescriptor,
    ) -> Result<Option<()>, BrowserError> {
        match *self {}
    }

    async fn control_attribute(
        &mut self,
        _control: &(),
        _name: &str,
    ) -> Result<Option<String>, BrowserError> {
        match *self {}
    }

    async fn click(&mut self, _control: ()) -> Result<(), BrowserError> {
        match *self {}
    }

    async fn markup(&mut self) -> Result<String, BrowserError> {
        match *self {}
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        match *self {}
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        match *self {}
    }
}
