//! Top-level drain/crawl state machine.
//!
//! Each pass of [`Orchestrator::run_auto`] first drains pending index
//! records. Only when nothing is pending does it open a browser session for
//! one crawl round, immediately download what that round discovered, and loop.
//! A round that discovers nothing is the only clean finish; a hard block,
//! a failed download or an aborted round stops the run for a later resume.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::auth::SessionCookie;
use crate::browser::{BrowserError, BrowserLauncher};
use crate::config::{BatchSize, HarvestConfig};
use crate::crawl::{Navigator, RoundReport, StopReason};
use crate::download::{BatchStats, DownloadSession, Downloader};
use crate::error::HarvestError;
use crate::parser::LinkPattern;
use crate::state::HarvestState;

/// How a run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing left to discover or download.
    #[default]
    Completed,
    /// The gateway denied access; state is saved for a later resume.
    Blocked { page: u64 },
    /// Files in the last batch exhausted their retries.
    DownloadFailures { failed: usize },
    /// A crawl round could not run to a natural stop.
    RoundAborted { reason: String },
}

impl RunOutcome {
    /// True when the run finished rather than stopped for resume.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        *self == Self::Completed
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Blocked { page } => write!(f, "blocked on page {page}, stopped for resume"),
            Self::DownloadFailures { failed } => {
                write!(f, "{failed} download(s) failed, stopped for resume")
            }
            Self::RoundAborted { reason } => write!(f, "crawl round aborted: {reason}"),
        }
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Crawl rounds that were started.
    pub rounds: usize,
    pub pages_visited: u64,
    pub new_files: usize,
    pub downloads: BatchStats,
}

impl RunSummary {
    fn finish(mut self, outcome: RunOutcome) -> Self {
        info!(
            outcome = %outcome,
            rounds = self.rounds,
            pages = self.pages_visited,
            new_files = self.new_files,
            downloaded = self.downloads.downloaded,
            skipped = self.downloads.skipped,
            failed = self.downloads.failed,
            "run finished"
        );
        self.outcome = outcome;
        self
    }

    fn absorb_round(&mut self, report: &RoundReport, stats: BatchStats) {
        self.rounds += 1;
        self.pages_visited += report.pages_visited;
        self.new_files += report.new_identities.len();
        self.downloads.absorb(stats);
    }
}

/// Owns the launcher and downloader for a run.
pub struct Orchestrator<L: BrowserLauncher> {
    launcher: L,
    config: Arc<HarvestConfig>,
    pattern: LinkPattern,
    downloader: Downloader,
}

impl<L: BrowserLauncher> Orchestrator<L> {
    /// Builds the link pattern and download client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Pattern`] for an unusable collection marker or
    /// extension, and [`HarvestError::Download`] if the HTTP client cannot be
    /// built.
    pub fn new(launcher: L, config: Arc<HarvestConfig>) -> Result<Self, HarvestError> {
        let pattern = LinkPattern::from_config(&config)?;
        let downloader = Downloader::new(Arc::clone(&config))?;
        Ok(Self {
            launcher,
            config,
            pattern,
            downloader,
        })
    }

    #[must_use]
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    async fn open_navigator(&self) -> Result<Navigator<L::Driver>, BrowserError> {
        let driver = self.launcher.launch(&self.config).await?;
        let mut navigator =
            Navigator::new(driver, Arc::clone(&self.config), self.pattern.clone());
        navigator.bootstrap().await;
        Ok(navigator)
    }

    /// Alternates draining and crawling until the listing is exhausted or
    /// the run must stop for resume.
    ///
    /// # Errors
    ///
    /// Only persistence failures are returned; everything else ends the run
    /// with a [`RunOutcome`].
    #[instrument(skip_all, fields(batch = %batch))]
    pub async fn run_auto(
        &self,
        state: &mut HarvestState,
        batch: BatchSize,
    ) -> Result<RunSummary, HarvestError> {
        let mut summary = RunSummary::default();
        loop {
            let pending = state.index().pending(batch);
            if !pending.is_empty() {
                info!(
                    pending = pending.len(),
                    total_pending = state.index().pending_count(),
                    "draining pending downloads"
                );
                let stats = self.download_with_lazy_session(&pending, state).await?;
                summary.downloads.absorb(stats);
                if stats.has_failures() {
                    return Ok(summary.finish(RunOutcome::DownloadFailures {
                        failed: stats.failed,
                    }));
                }
                continue;
            }

            if state.cursor().is_exhausted() {
                info!(
                    next_page = state.cursor().next_page,
                    max_page = ?state.cursor().max_page,
                    "listing already crawled to its last page"
                );
                return Ok(summary.finish(RunOutcome::Completed));
            }

            let mut navigator = match self.open_navigator().await {
                Ok(navigator) => navigator,
                Err(error) => {
                    warn!(error = %error, "could not open a browser session");
                    return Ok(summary.finish(RunOutcome::RoundAborted {
                        reason: error.to_string(),
                    }));
                }
            };
            let round = self.crawl_and_download(&mut navigator, state, batch).await;
            navigator.close().await;
            let (report, stats) = round?;
            summary.absorb_round(&report, stats);

            if stats.has_failures() {
                return Ok(summary.finish(RunOutcome::DownloadFailures {
                    failed: stats.failed,
                }));
            }
            match &report.stop {
                StopReason::Blocked { page } => {
                    return Ok(summary.finish(RunOutcome::Blocked { page: *page }));
                }
                stop @ (StopReason::Aborted { .. } | StopReason::CursorUnreachable { .. }) => {
                    return Ok(summary.finish(RunOutcome::RoundAborted {
                        reason: stop.to_string(),
                    }));
                }
                _ => {}
            }
            if report.found_nothing() {
                info!(stop = %report.stop, "no new files, stopping");
                return Ok(summary.finish(RunOutcome::Completed));
            }
        }
    }

    async fn crawl_and_download(
        &self,
        navigator: &mut Navigator<L::Driver>,
        state: &mut HarvestState,
        batch: BatchSize,
    ) -> Result<(RoundReport, BatchStats), HarvestError> {
        if state.cursor().max_page.is_none() {
            navigator.estimate_last_page(state).await?;
        }
        let report = navigator.crawl_round(state, batch).await?;
        let stats = if report.found_nothing() {
            BatchStats::default()
        } else {
            self.downloader
                .download_batch(&report.new_identities, state, navigator)
                .await?
        };
        Ok((report, stats))
    }

    /// Downloads `index[start..]`, capped by `batch`, without crawling.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::State`] if the index cannot be persisted.
    #[instrument(skip_all, fields(start = start, batch = %batch))]
    pub async fn run_download(
        &self,
        state: &mut HarvestState,
        start: usize,
        batch: BatchSize,
    ) -> Result<RunSummary, HarvestError> {
        let identities = state.index().slice_from(start, batch);
        if identities.is_empty() {
            info!(start, known = state.index().len(), "nothing at or after this position");
            return Ok(RunSummary::default().finish(RunOutcome::Completed));
        }
        info!(start, count = identities.len(), "downloading from index position");

        let stats = self.download_with_lazy_session(&identities, state).await?;
        let summary = RunSummary {
            downloads: stats,
            ..RunSummary::default()
        };
        let outcome = if stats.has_failures() {
            RunOutcome::DownloadFailures {
                failed: stats.failed,
            }
        } else {
            RunOutcome::Completed
        };
        Ok(summary.finish(outcome))
    }

    async fn download_with_lazy_session(
        &self,
        identities: &[String],
        state: &mut HarvestState,
    ) -> Result<BatchStats, HarvestError> {
        let mut session = LazySession::new(self);
        let result = self
            .downloader
            .download_batch(identities, state, &mut session)
            .await;
        session.close().await;
        Ok(result?)
    }
}

/// Browser session opened on first use, for batches that run outside a
/// crawl round.
struct LazySession<'a, L: BrowserLauncher> {
    orchestrator: &'a Orchestrator<L>,
    navigator: Option<Navigator<L::Driver>>,
    launch_failed: bool,
}

impl<'a, L: BrowserLauncher> LazySession<'a, L> {
    fn new(orchestrator: &'a Orchestrator<L>) -> Self {
        Self {
            orchestrator,
            navigator: None,
            launch_failed: false,
        }
    }

    async fn navigator(&mut self) -> Result<&mut Navigator<L::Driver>, BrowserError> {
        if self.navigator.is_none() {
            if self.launch_failed {
                return Err(BrowserError::launch("browser session failed to start earlier"));
            }
            match self.orchestrator.open_navigator().await {
                Ok(navigator) => self.navigator = Some(navigator),
                Err(error) => {
                    self.launch_failed = true;
                    return Err(error);
                }
            }
        }
        self.navigator.as_mut().ok_or(BrowserError::Unavailable)
    }

    async fn close(&mut self) {
        if let Some(mut navigator) = self.navigator.take() {
            navigator.close().await;
        }
    }
}

#[async_trait]
impl<L: BrowserLauncher> DownloadSession for LazySession<'_, L> {
    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        self.navigator().await?.session_cookies().await
    }

    async fn reverify(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        self.navigator().await?.reverify().await
    }
}
