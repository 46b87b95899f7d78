//! Browser-driven pagination.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{RoundReport, StopReason};
use crate::auth::SessionCookie;
use crate::browser::{BrowserDriver, BrowserError, ControlDescriptor};
use crate::config::{BatchSize, HarvestConfig};
use crate::download::DownloadSession;
use crate::parser::{GateState, LinkPattern, classify_gate_with, identity_of};
use crate::state::{FileRecord, HarvestState, StateError};

/// Result of the explicit interstitial step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateResolution {
    /// The current page is not the age prompt.
    NotPresent,
    /// The prompt was shown and the affirmative control was clicked.
    Accepted,
    /// The prompt was shown but no affirmative control could be found.
    NoControl,
}

/// Failure inside one page step. Persistence failures propagate; browser
/// failures end the round.
#[derive(Debug)]
enum StepError {
    State(StateError),
    Browser(BrowserError),
}

impl From<StateError> for StepError {
    fn from(error: StateError) -> Self {
        Self::State(error)
    }
}

impl From<BrowserError> for StepError {
    fn from(error: BrowserError) -> Self {
        Self::Browser(error)
    }
}

#[derive(Debug, Default)]
struct RoundProgress {
    pages_visited: u64,
    new_identities: Vec<String>,
}

/// Drives one browser session over the listing.
#[derive(Debug)]
pub struct Navigator<D: BrowserDriver> {
    driver: D,
    config: Arc<HarvestConfig>,
    pattern: LinkPattern,
    current_page: u64,
    closed: bool,
}

impl<D: BrowserDriver> Navigator<D> {
    #[must_use]
    pub fn new(driver: D, config: Arc<HarvestConfig>, pattern: LinkPattern) -> Self {
        Self {
            driver,
            config,
            pattern,
            current_page: 0,
            closed: false,
        }
    }

    /// Listing page the session is currently showing.
    #[must_use]
    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    /// Opens page 0 and clears the interstitial if it is still shown.
    ///
    /// Best-effort: failures are logged and swallowed, since the pre-seeded
    /// credential usually makes verification unnecessary.
    #[instrument(skip(self))]
    pub async fn bootstrap(&mut self) {
        match self.open_listing().await {
            Ok(resolution) => debug!(?resolution, "listing opened"),
            Err(error) => warn!(error = %error, "bootstrap failed, continuing"),
        }
    }

    async fn open_listing(&mut self) -> Result<GateResolution, BrowserError> {
        self.current_page = 0;
        self.driver.navigate(self.config.listing_url.as_str()).await?;
        self.driver.wait_until_settled().await?;
        self.resolve_interstitial().await
    }

    /// Clicks through the age prompt when the current page shows it.
    ///
    /// Affirmative controls are tried in priority order: role button, button
    /// text, input value, anchor text.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] if the page cannot be read or the click fails.
    pub async fn resolve_interstitial(&mut self) -> Result<GateResolution, BrowserError> {
        let markup = self.driver.markup().await?;
        if classify_gate_with(&markup, &self.config.labels.gate_prompt) != GateState::AgeGated {
            return Ok(GateResolution::NotPresent);
        }
        let candidates = ControlDescriptor::affirmative(&self.config.labels.affirmative);
        let Some(control) = self.find_first(&candidates).await? else {
            warn!("age prompt shown but no affirmative control found");
            return Ok(GateResolution::NoControl);
        };
        self.driver.click(control).await?;
        self.driver.wait_until_settled().await?;
        info!("age verification accepted");
        Ok(GateResolution::Accepted)
    }

    /// Reads the "Last page" control and records its page number as the
    /// estimated `max_page`. Only a page without a "Next page" control
    /// confirms the end.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the cursor cannot be persisted.
    pub async fn estimate_last_page(
        &mut self,
        state: &mut HarvestState,
    ) -> Result<Option<u64>, StateError> {
        let href = match self.last_page_href().await {
            Ok(href) => href,
            Err(error) => {
                debug!(error = %error, "last page control unreadable");
                return Ok(None);
            }
        };
        let Some(max_page) = href
            .as_deref()
            .and_then(|href| page_parameter(&self.config.listing_url, href))
        else {
            return Ok(None);
        };
        info!(max_page, "listing size estimated");
        state.record_max_page(max_page)?;
        Ok(Some(max_page))
    }

    async fn last_page_href(&mut self) -> Result<Option<String>, BrowserError> {
        let candidates = ControlDescriptor::last_page(&self.config.labels.last_page);
        let Some(control) = self.find_first(&candidates).await? else {
            return Ok(None);
        };
        self.driver.control_attribute(&control, "href").await
    }

    /// Pages forward with the "Next page" control until `target` is shown.
    ///
    /// Returns `false` when the control disappears first.
    async fn resume_to(&mut self, target: u64) -> Result<bool, BrowserError> {
        if self.current_page < target {
            info!(from = self.current_page, target, "resuming to cursor");
        }
        while self.current_page < target {
            let Some(next) = self.next_control().await? else {
                return Ok(false);
            };
            self.follow_next(next).await?;
            self.resolve_interstitial().await?;
            debug!(page = self.current_page, target, "resume step");
        }
        Ok(true)
    }

    /// Runs one crawl round from the persisted cursor.
    ///
    /// New records are appended page by page, and the cursor is advanced and
    /// persisted after each harvested page. `limit` is checked between pages.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the index, cursor or a snapshot cannot be
    /// written. Browser failures end the round with [`StopReason::Aborted`].
    #[instrument(skip_all, fields(limit = %limit, start = state.cursor().next_page))]
    pub async fn crawl_round(
        &mut self,
        state: &mut HarvestState,
        limit: BatchSize,
    ) -> Result<RoundReport, StateError> {
        let mut progress = RoundProgress::default();

        let target = state.cursor().next_page;
        let stop = match self.resume_to(target).await {
            Ok(true) => loop {
                match self.harvest_page(state, limit, &mut progress).await {
                    Ok(Some(stop)) => break stop,
                    Ok(None) => {}
                    Err(StepError::State(error)) => return Err(error),
                    Err(StepError::Browser(error)) => {
                        break StopReason::Aborted {
                            page: self.current_page,
                            reason: error.to_string(),
                        };
                    }
                }
            },
            Ok(false) => StopReason::CursorUnreachable {
                reached: self.current_page,
                target,
            },
            Err(error) => StopReason::Aborted {
                page: self.current_page,
                reason: error.to_string(),
            },
        };

        info!(
            pages = progress.pages_visited,
            new_files = progress.new_identities.len(),
            stop = %stop,
            "crawl round finished"
        );
        Ok(RoundReport {
            pages_visited: progress.pages_visited,
            new_identities: progress.new_identities,
            stop,
        })
    }

    /// Harvests the current page and moves to the next one.
    ///
    /// Returns `Some` when the round must stop.
    async fn harvest_page(
        &mut self,
        state: &mut HarvestState,
        limit: BatchSize,
        progress: &mut RoundProgress,
    ) -> Result<Option<StopReason>, StepError> {
        let page = self.current_page;
        let mut markup = self.driver.markup().await?;

        if classify_gate_with(&markup, &self.config.labels.gate_prompt) == GateState::AgeGated
            && self.resolve_interstitial().await? == GateResolution::Accepted
        {
            markup = self.driver.markup().await?;
        }
        if classify_gate_with(&markup, &self.config.labels.gate_prompt).is_blocked() {
            warn!(page, "access denied, stopping for resume");
            state.write_snapshot(&self.config.snapshot_path(page), &markup)?;
            return Ok(Some(StopReason::Blocked { page }));
        }

        let mut references = self.pattern.extract(&markup);
        let mut recheck = 0;
        while references.is_empty() && recheck < self.config.crawl.empty_page_rechecks {
            recheck += 1;
            debug!(page, recheck, "no links yet, waiting for the page to settle");
            sleep_if_nonzero(self.config.crawl.recheck_delay).await;
            self.driver.wait_until_settled().await?;
            markup = self.driver.markup().await?;
            references = self.pattern.extract(&markup);
        }
        if references.is_empty() {
            warn!(page, "no file links found, treating as end of listing");
            state.write_snapshot(&self.config.snapshot_path(page), &markup)?;
            return Ok(Some(StopReason::NoLinks { page }));
        }

        let records = references.iter().filter_map(|reference| {
            let identity = identity_of(reference)?;
            let locator = self.config.resolve_locator(reference)?;
            Some(FileRecord::new(identity, locator))
        });
        let added = state.record_discovered(records)?;
        state.advance_cursor(page + 1)?;
        progress.pages_visited += 1;
        info!(
            page,
            found = references.len(),
            new = added.len(),
            "page harvested"
        );
        progress.new_identities.extend(added);

        let Some(next) = self.next_control().await? else {
            info!(page, "no next page control, end of listing");
            state.confirm_end(page)?;
            return Ok(Some(StopReason::NoNextPage { page }));
        };
        if state.cursor().max_page.is_some_and(|max| max <= page) {
            debug!(page, "listing continues past the estimated last page");
            state.record_max_page(page + 1)?;
        }
        if limit.is_filled(progress.new_identities.len()) {
            return Ok(Some(StopReason::BatchFilled));
        }
        self.follow_next(next).await?;
        Ok(None)
    }

    async fn next_control(&mut self) -> Result<Option<D::Control>, BrowserError> {
        let candidates = ControlDescriptor::next_page(&self.config.labels.next_page);
        self.find_first(&candidates).await
    }

    /// Waits the jittered inter-page delay, then clicks "Next page".
    async fn follow_next(&mut self, control: D::Control) -> Result<(), BrowserError> {
        sleep_if_nonzero(self.page_delay()).await;
        self.driver.click(control).await?;
        self.driver.wait_until_settled().await?;
        self.current_page += 1;
        Ok(())
    }

    fn page_delay(&self) -> Duration {
        let crawl = &self.config.crawl;
        let jitter_ms = u64::try_from(crawl.page_delay_jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        crawl.page_delay_base + Duration::from_millis(extra)
    }

    async fn find_first(
        &mut self,
        candidates: &[ControlDescriptor],
    ) -> Result<Option<D::Control>, BrowserError> {
        for descriptor in candidates {
            if let Some(control) = self.driver.find_control(descriptor).await? {
                debug!(?descriptor, "control found");
                return Ok(Some(control));
            }
        }
        Ok(None)
    }

    /// Re-runs age verification from the listing and returns fresh cookies.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] if the listing cannot be opened or the
    /// cookies cannot be read.
    #[instrument(skip(self))]
    pub async fn reverify(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        let resolution = self.open_listing().await?;
        debug!(?resolution, "session re-verified");
        self.driver.cookies().await
    }

    /// Cookies currently held by the browser session.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] if the session cannot report its cookies.
    pub async fn session_cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        self.driver.cookies().await
    }

    /// Ends the browser session. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(error) = self.driver.close().await {
            warn!(error = %error, "browser did not close cleanly");
        }
    }
}

#[async_trait]
impl<D: BrowserDriver> DownloadSession for Navigator<D> {
    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        self.session_cookies().await
    }

    async fn reverify(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        Navigator::reverify(self).await
    }
}

/// Extracts the `page` query parameter of a pagination reference.
fn page_parameter(base: &Url, href: &str) -> Option<u64> {
    let resolved = base.join(href).ok()?;
    resolved
        .query_pairs()
        .find(|(name, _)| name == "page")
        .and_then(|(_, value)| value.parse().ok())
}

async fn sleep_if_nonzero(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
