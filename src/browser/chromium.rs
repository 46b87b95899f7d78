//! Chromium backend over the DevTools protocol.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{BrowserDriver, BrowserError, BrowserLauncher, ControlDescriptor, ControlFacts};
use crate::auth::SessionCookie;
use crate::config::{BrowserSettings, HarvestConfig};

/// Common Chrome executable paths, checked in order.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
];

const READY_STATE_SCRIPT: &str = r"
    new Promise((resolve) => {
        if (document.readyState === 'complete') {
            resolve(document.readyState);
        } else {
            window.addEventListener('load', () => resolve(document.readyState));
            setTimeout(() => resolve(document.readyState), 10000);
        }
    })
";

const SETTLE_PAUSE: Duration = Duration::from_millis(250);

/// Launches Chromium with the configured browser profile.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn locate_executable(settings: &BrowserSettings) -> Result<PathBuf, BrowserError> {
        if let Some(path) = &settings.executable {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(BrowserError::ExecutableNotFound {
                hint: format!("configured path {} does not exist", path.display()),
            });
        }

        if let Some(found) = CHROME_PATHS.iter().map(Path::new).find(|p| p.exists()) {
            info!(path = %found.display(), "found Chrome");
            return Ok(found.to_path_buf());
        }

        for cmd in CHROME_COMMANDS {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!(path = %path, "found Chrome in PATH");
                    return Ok(PathBuf::from(path));
                }
            }
        }

        Err(BrowserError::ExecutableNotFound {
            hint: "install Chrome or Chromium, or set browser.executable in config.toml"
                .to_string(),
        })
    }

    fn browser_config(settings: &BrowserSettings) -> Result<BrowserConfig, BrowserError> {
        let executable = Self::locate_executable(settings)?;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .request_timeout(settings.page_timeout)
            .window_size(1366, 900)
            .arg(format!("--lang={}", settings.locale));

        // with_head means NOT headless
        if !settings.headless {
            builder = builder.with_head();
        }
        for arg in STEALTH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &settings.extra_args {
            builder = builder.arg(arg.as_str());
        }

        builder.build().map_err(BrowserError::launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Driver = ChromiumDriver;

    #[instrument(skip_all, fields(headless = config.browser.headless))]
    async fn launch(&self, config: &HarvestConfig) -> Result<ChromiumDriver, BrowserError> {
        let settings = &config.browser;
        let browser_config = Self::browser_config(settings)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(BrowserError::launch)?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(error) => {
                handler_task.abort();
                return Err(BrowserError::launch(error));
            }
        };

        let mut driver = ChromiumDriver {
            browser,
            page,
            handler_task,
            settings: settings.clone(),
            closed: false,
        };
        if let Err(error) = driver.apply_profile().await {
            let _ = driver.close().await;
            return Err(error);
        }
        if let Err(error) = driver.seed_cookies(&config.age_credential.cookies()).await {
            let _ = driver.close().await;
            return Err(error);
        }

        info!("browser session ready");
        Ok(driver)
    }
}

/// A single Chromium page driven over CDP.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    settings: BrowserSettings,
    closed: bool,
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ChromiumDriver {
    async fn apply_profile(&self) -> Result<(), BrowserError> {
        self.page
            .execute(SetUserAgentOverrideParams::new(self.settings.user_agent.clone()))
            .await
            .map_err(BrowserError::launch)?;

        if let Err(error) = self
            .page
            .execute(SetTimezoneOverrideParams::new(self.settings.timezone.clone()))
            .await
        {
            warn!(error = %error, "timezone override rejected");
        }

        if !self.settings.extra_headers.is_empty() {
            let headers: serde_json::Map<String, serde_json::Value> = self
                .settings
                .extra_headers
                .iter()
                .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
                .collect();
            self.page
                .execute(SetExtraHttpHeadersParams::new(Headers::new(
                    serde_json::Value::Object(headers),
                )))
                .await
                .map_err(BrowserError::launch)?;
        }
        Ok(())
    }

    async fn seed_cookies(&self, cookies: &[SessionCookie]) -> Result<(), BrowserError> {
        for cookie in cookies {
            let param = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value())
                .domain(cookie.domain.clone())
                .path(cookie.path.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .build()
                .map_err(BrowserError::cookie)?;
            self.page
                .set_cookie(param)
                .await
                .map_err(BrowserError::cookie)?;
            debug!(name = %cookie.name, domain = %cookie.domain, "seeded cookie");
        }
        Ok(())
    }

    async fn pace(&self) {
        if !self.settings.slow_mo.is_zero() {
            tokio::time::sleep(self.settings.slow_mo).await;
        }
    }

    async fn facts_of(element: &Element) -> ControlFacts {
        ControlFacts {
            text: element.inner_text().await.ok().flatten(),
            value: element.attribute("value").await.ok().flatten(),
            aria_label: element.attribute("aria-label").await.ok().flatten(),
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    type Control = Element;

    #[instrument(skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let timeout = self.settings.page_timeout;
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserError::timeout(url, timeout))?
            .map_err(|error| BrowserError::navigation(url, error))?;
        Ok(())
    }

    async fn wait_until_settled(&mut self) -> Result<(), BrowserError> {
        let timeout = self.settings.page_timeout;
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => debug!(error = %error, "no navigation to wait for"),
            Err(_) => {
                let url = self.page.url().await.ok().flatten().unwrap_or_default();
                return Err(BrowserError::timeout(url, timeout));
            }
        }
        match tokio::time::timeout(timeout, self.page.evaluate(READY_STATE_SCRIPT.to_string())).await {
            Ok(Ok(result)) => {
                let state: String = result.into_value().unwrap_or_default();
                debug!(ready_state = %state, "page settled");
            }
            Ok(Err(error)) => debug!(error = %error, "could not read ready state"),
            Err(_) => warn!("timed out waiting for ready state"),
        }
        tokio::time::sleep(SETTLE_PAUSE).await;
        Ok(())
    }

    async fn find_control(
        &mut self,
        descriptor: &ControlDescriptor,
    ) -> Result<Option<Element>, BrowserError> {
        let candidates = match self.page.find_elements(descriptor.css_selector()).await {
            Ok(candidates) => candidates,
            Err(error) => {
                debug!(?descriptor, error = %error, "no candidate elements");
                return Ok(None);
            }
        };
        for element in candidates {
            if descriptor.accepts(&Self::facts_of(&element).await) {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    async fn control_attribute(
        &mut self,
        control: &Element,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        control
            .attribute(name)
            .await
            .map_err(BrowserError::interaction)
    }

    async fn click(&mut self, control: Element) -> Result<(), BrowserError> {
        self.pace().await;
        control
            .click()
            .await
            .map_err(BrowserError::interaction)?;
        Ok(())
    }

    async fn markup(&mut self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(BrowserError::interaction)
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(BrowserError::cookie)?;
        Ok(cookies
            .into_iter()
            .map(|c| {
                SessionCookie::new(&c.name, &c.value, &c.domain, &c.path)
                    .with_flags(c.secure, c.http_only)
            })
            .collect())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        result.map(|_| ()).map_err(BrowserError::launch)
    }
}
