//! In-memory browser standing in for Chromium in unit tests.
//!
//! A [`ScriptedSite`] is a list of listing pages. The driver starts on page 0
//! after `navigate`, moves forward on "Next page" clicks, and shows the age
//! interstitial after every navigation while `gate_on_visit` is set, or after
//! the `gate_after_click`-th click.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::SessionCookie;
use crate::browser::{BrowserDriver, BrowserError, BrowserLauncher, ControlDescriptor};
use crate::config::{HarvestConfig, PageLabels};

pub(crate) const GATE_MARKUP: &str = "<html><body><h1>Are you 18 years of age or older?</h1>\
    <button>Yes</button><button>No</button></body></html>";

pub(crate) const BLOCKED_MARKUP: &str = "<html><body><h1>Access Denied</h1>\
    <p>You don't have permission to access this server.</p><p>Reference #18.abc</p></body></html>";

/// Listing page markup referencing `names` under the collection path.
pub(crate) fn listing_page(names: &[&str]) -> String {
    let anchors: String = names
        .iter()
        .map(|name| format!(r#"<li><a href="/epstein/files/{name}">{name}</a></li>"#))
        .collect();
    format!("<html><body><ul>{anchors}</ul></body></html>")
}

/// One listing page.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedPage {
    pub markup: String,
    /// Markup reads that come back empty before the real content appears.
    pub empty_reads: u32,
}

impl ScriptedPage {
    pub(crate) fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            empty_reads: 0,
        }
    }

    pub(crate) fn late(markup: impl Into<String>, empty_reads: u32) -> Self {
        Self {
            markup: markup.into(),
            empty_reads,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedSite {
    pub pages: Vec<ScriptedPage>,
    pub gate_on_visit: bool,
    /// Whether the pagination bar exposes a "Last page" control.
    pub last_page_control: bool,
    pub cookies: Vec<SessionCookie>,
    pub fail_launch: bool,
    /// Page index whose "Next page" click fails.
    pub failing_click_on: Option<usize>,
    /// The interstitial comes back after this many "Next page" clicks in a
    /// session.
    pub gate_after_click: Option<usize>,
}

impl ScriptedSite {
    pub(crate) fn new(pages: Vec<ScriptedPage>) -> Self {
        Self {
            pages,
            gate_on_visit: false,
            last_page_control: true,
            cookies: vec![SessionCookie::new("session", "abc", "127.0.0.1", "/")],
            fail_launch: false,
            failing_click_on: None,
            gate_after_click: None,
        }
    }

    pub(crate) fn from_markup(pages: Vec<String>) -> Self {
        Self::new(pages.into_iter().map(ScriptedPage::new).collect())
    }
}

/// What the scripted sessions did, shared across launches.
#[derive(Debug, Default)]
pub(crate) struct SiteLog {
    pub launches: usize,
    pub closes: usize,
    pub navigations: usize,
    pub gate_accepts: usize,
    pub next_clicks: usize,
    /// Every page index whose markup was read with real content.
    pub pages_read: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScriptedControl {
    Affirmative,
    Next,
    Last,
}

#[derive(Debug)]
pub(crate) struct ScriptedDriver {
    site: ScriptedSite,
    labels: PageLabels,
    log: Arc<Mutex<SiteLog>>,
    current: usize,
    gated: bool,
    next_clicks: usize,
    empty_reads_left: Vec<u32>,
}

impl ScriptedDriver {
    fn descriptor_label(descriptor: &ControlDescriptor) -> &str {
        match descriptor {
            ControlDescriptor::Role { name, .. } => name,
            ControlDescriptor::ButtonText(label)
            | ControlDescriptor::InputValue(label)
            | ControlDescriptor::AnchorText(label)
            | ControlDescriptor::AriaLabel(label) => label,
        }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    type Control = ScriptedControl;

    async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
        self.log.lock().unwrap().navigations += 1;
        self.current = 0;
        self.gated = self.site.gate_on_visit;
        Ok(())
    }

    async fn wait_until_settled(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn find_control(
        &mut self,
        descriptor: &ControlDescriptor,
    ) -> Result<Option<ScriptedControl>, BrowserError> {
        let label = Self::descriptor_label(descriptor);
        if self.gated {
            // Only the plain button exists on the interstitial.
            let found = label == self.labels.affirmative
                && matches!(descriptor, ControlDescriptor::ButtonText(_));
            return Ok(found.then_some(ScriptedControl::Affirmative));
        }
        if label == self.labels.next_page && self.current + 1 < self.site.pages.len() {
            return Ok(Some(ScriptedControl::Next));
        }
        if label == self.labels.last_page && self.site.last_page_control {
            return Ok(Some(ScriptedControl::Last));
        }
        Ok(None)
    }

    async fn control_attribute(
        &mut self,
        control: &ScriptedControl,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let last = self.site.pages.len().saturating_sub(1);
        Ok((*control == ScriptedControl::Last && name == "href")
            .then(|| format!("/epstein/doj-disclosures/data-set-9-files?page={last}")))
    }

    async fn click(&mut self, control: ScriptedControl) -> Result<(), BrowserError> {
        match control {
            ScriptedControl::Affirmative => {
                self.gated = false;
                self.log.lock().unwrap().gate_accepts += 1;
            }
            ScriptedControl::Next => {
                if self.site.failing_click_on == Some(self.current) {
                    return Err(BrowserError::interaction("element detached"));
                }
                self.current += 1;
                self.next_clicks += 1;
                self.log.lock().unwrap().next_clicks += 1;
                if self.site.gate_after_click == Some(self.next_clicks) {
                    self.gated = true;
                }
            }
            ScriptedControl::Last => {}
        }
        Ok(())
    }

    async fn markup(&mut self) -> Result<String, BrowserError> {
        if self.gated {
            return Ok(GATE_MARKUP.to_string());
        }
        let Some(page) = self.site.pages.get(self.current) else {
            return Ok(String::new());
        };
        if let Some(left) = self.empty_reads_left.get_mut(self.current)
            && *left > 0
        {
            *left -= 1;
            return Ok("<html><body><p>Loading…</p></body></html>".to_string());
        }
        self.log.lock().unwrap().pages_read.push(self.current);
        Ok(page.markup.clone())
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        Ok(self.site.cookies.clone())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedLauncher {
    site: ScriptedSite,
    pub log: Arc<Mutex<SiteLog>>,
}

impl ScriptedLauncher {
    pub(crate) fn new(site: ScriptedSite) -> Self {
        Self {
            site,
            log: Arc::new(Mutex::new(SiteLog::default())),
        }
    }

    pub(crate) fn launches(&self) -> usize {
        self.log.lock().unwrap().launches
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    type Driver = ScriptedDriver;

    async fn launch(&self, config: &HarvestConfig) -> Result<ScriptedDriver, BrowserError> {
        self.log.lock().unwrap().launches += 1;
        if self.site.fail_launch {
            return Err(BrowserError::launch("chrome exited with status 1"));
        }
        Ok(ScriptedDriver {
            empty_reads_left: self.site.pages.iter().map(|p| p.empty_reads).collect(),
            site: self.site.clone(),
            labels: config.labels.clone(),
            log: Arc::clone(&self.log),
            current: 0,
            gated: false,
            next_clicks: 0,
        })
    }
}
