//! Sequential batch downloader.
//!
//! [`Downloader::download_batch`] walks a batch of index identities in order,
//! one file at a time. Each record is either skipped (already downloaded, or
//! its destination already exists on disk), fetched with bounded retries, or
//! given up on for this batch. The index is persisted after every record.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::config::HarvestConfig;
//! use harvester_core::download::{Downloader, StaticSession};
//! use harvester_core::state::HarvestState;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(HarvestConfig::new("./downloads")?);
//! let mut state = HarvestState::load(&config.index_path, &config.cursor_path)?;
//! let downloader = Downloader::new(Arc::clone(&config))?;
//! let batch = state.index().pending(config.batch_size);
//! let mut session = StaticSession::new(config.age_credential.cookies());
//! let stats = downloader.download_batch(&batch, &mut state, &mut session).await?;
//! println!("downloaded {}, failed {}", stats.downloaded, stats.failed);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::session::DownloadSession;
use super::{DownloadError, HttpClient};
use crate::config::HarvestConfig;
use crate::state::{FileRecord, HarvestState, StateError};

/// Counters from one [`Downloader::download_batch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub downloaded: usize,
    /// Already downloaded, or present on disk.
    pub skipped: usize,
    /// Gave up after exhausting retries.
    pub failed: usize,
    /// Extra attempts made after a failure.
    pub retried: usize,
    /// Session re-verifications triggered by markup responses.
    pub refreshed: usize,
}

impl BatchStats {
    /// Records handled, whatever the outcome.
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Adds another batch's counters to these.
    pub fn absorb(&mut self, other: Self) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.retried += other.retried;
        self.refreshed += other.refreshed;
    }
}

/// Streams index records to local storage.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: HttpClient,
    config: Arc<HarvestConfig>,
    policy: RetryPolicy,
}

impl Downloader {
    /// Creates a downloader with a fresh client seeded with the age credential.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the HTTP client cannot be built.
    pub fn new(config: Arc<HarvestConfig>) -> Result<Self, DownloadError> {
        let client = HttpClient::from_config(&config)?;
        Ok(Self::with_client(config, client))
    }

    /// Creates a downloader around an existing client.
    #[must_use]
    pub fn with_client(config: Arc<HarvestConfig>, client: HttpClient) -> Self {
        let policy = RetryPolicy::from_settings(&config.download);
        Self {
            client,
            config,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Downloads every identity of `batch`, strictly in order.
    ///
    /// Per-file failures are counted, never propagated: a file that exhausts
    /// its retries stays pending and the batch moves on. Session cookies are
    /// requested from `session` once, before the first network fetch.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the index cannot be persisted, which ends
    /// the batch immediately.
    #[instrument(skip_all, fields(batch = batch.len()))]
    pub async fn download_batch<S>(
        &self,
        batch: &[String],
        state: &mut HarvestState,
        session: &mut S,
    ) -> Result<BatchStats, StateError>
    where
        S: DownloadSession + ?Sized,
    {
        let mut stats = BatchStats::default();
        let mut session_primed = false;
        let total = batch.len();

        for (position, identity) in batch.iter().enumerate() {
            let Some(record) = state.index().get(identity).cloned() else {
                warn!(identity = %identity, "identity not in index, skipping");
                continue;
            };
            if record.downloaded {
                stats.skipped += 1;
                continue;
            }

            let destination = self.config.destination_for(&record.identity);
            if destination_exists(&destination).await {
                debug!(identity = %identity, "already on disk");
                state.mark_downloaded(identity)?;
                stats.skipped += 1;
                continue;
            }

            if !session_primed {
                session_primed = true;
                match session.cookies().await {
                    Ok(cookies) => {
                        self.client.add_session_cookies(&cookies);
                    }
                    Err(error) => {
                        warn!(error = %error, "no session cookies, continuing with the age credential");
                    }
                }
            }

            info!(identity = %identity, position = position + 1, total, "downloading");
            if self
                .fetch_with_retries(&record, &destination, session, &mut stats)
                .await
            {
                state.mark_downloaded(identity)?;
                stats.downloaded += 1;
            } else {
                state.flush_index()?;
                stats.failed += 1;
            }

            if !self.config.download.pacing.is_zero() {
                tokio::time::sleep(self.config.download.pacing).await;
            }
        }

        info!(
            downloaded = stats.downloaded,
            skipped = stats.skipped,
            failed = stats.failed,
            retried = stats.retried,
            refreshed = stats.refreshed,
            "batch finished"
        );
        Ok(stats)
    }

    async fn fetch_with_retries<S>(
        &self,
        record: &FileRecord,
        destination: &Path,
        session: &mut S,
        stats: &mut BatchStats,
    ) -> bool
    where
        S: DownloadSession + ?Sized,
    {
        let mut attempt = 1;
        loop {
            let error = match self.client.fetch_to_file(&record.locator, destination).await {
                Ok(bytes) => {
                    info!(identity = %record.identity, bytes, "saved");
                    return true;
                }
                Err(error) => error,
            };

            let failure = classify_error(&error);
            warn!(
                identity = %record.identity,
                attempt,
                max_attempts = self.policy.max_attempts(),
                error = %error,
                "download attempt failed"
            );

            if failure == FailureType::SessionExpired {
                stats.refreshed += 1;
                match session.reverify().await {
                    Ok(cookies) => {
                        self.client.add_session_cookies(&cookies);
                    }
                    Err(error) => warn!(error = %error, "session re-verification failed"),
                }
            }

            match self.policy.should_retry(failure, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    stats.retried += 1;
                    tokio::time::sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(identity = %record.identity, reason = %reason, "giving up for this batch");
                    return false;
                }
            }
        }
    }
}

async fn destination_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::download::StaticSession;
    use crate::test_support::fast_config;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn setup(server_uri: &str, dir: &TempDir, names: &[&str]) -> (Downloader, HarvestState) {
        let config = Arc::new(fast_config(&format!("{server_uri}/listing"), dir.path()));
        let mut state = HarvestState::load(&config.index_path, &config.cursor_path).unwrap();
        state
            .record_discovered(
                names
                    .iter()
                    .map(|name| FileRecord::new(*name, format!("{server_uri}/epstein/files/{name}"))),
            )
            .unwrap();
        (Downloader::new(config).unwrap(), state)
    }

    fn pdf(body: &'static [u8]) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_bytes(body)
            .insert_header("content-type", "application/pdf")
    }

    #[tokio::test]
    async fn test_batch_downloads_and_marks_records() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/epstein/files/a.pdf"))
            .respond_with(pdf(b"%PDF-a"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/epstein/files/b.pdf"))
            .respond_with(pdf(b"%PDF-b"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let (downloader, mut state) = setup(&mock_server.uri(), &dir, &["a.pdf", "b.pdf"]);
        let batch = state.index().pending(crate::config::BatchSize::Unbounded);
        let mut session = StaticSession::default();

        let stats = downloader
            .download_batch(&batch, &mut state, &mut session)
            .await
            .unwrap();

        assert_eq!(stats.downloaded, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(std::fs::read(dir.path().join("b.pdf")).unwrap(), b"%PDF-b");
        assert_eq!(state.index().pending_count(), 0);

        let config = &downloader.config;
        let reloaded = HarvestState::load(&config.index_path, &config.cursor_path).unwrap();
        assert_eq!(reloaded.index().downloaded_count(), 2);
    }

    #[tokio::test]
    async fn test_existing_destination_short_circuits_without_request() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(pdf(b"%PDF"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let (downloader, mut state) = setup(&mock_server.uri(), &dir, &["present.pdf"]);
        std::fs::write(dir.path().join("present.pdf"), b"%PDF-earlier").unwrap();
        let mut session = StaticSession::default();

        let stats = downloader
            .download_batch(&["present.pdf".to_string()], &mut state, &mut session)
            .await
            .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.downloaded, 0);
        assert!(state.index().get("present.pdf").unwrap().downloaded);
    }

    #[tokio::test]
    async fn test_html_payload_exhausts_retries_and_refreshes_each_attempt() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/epstein/files/gated.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes("<html>Are you 18 years of age or older?</html>")
                    .insert_header("content-type", "text/html; charset=utf-8"),
            )
            .expect(5)
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let (downloader, mut state) = setup(&mock_server.uri(), &dir, &["gated.pdf"]);
        let mut session = StaticSession::default();

        let stats = downloader
            .download_batch(&["gated.pdf".to_string()], &mut state, &mut session)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retried, 4);
        assert_eq!(stats.refreshed, 5);
        assert_eq!(session.reverifications(), 5);
        assert!(!state.index().get("gated.pdf").unwrap().downloaded);
        assert!(!dir.path().join("gated.pdf").exists());
    }

    #[tokio::test]
    async fn test_local_write_failure_uses_full_retry_budget() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/epstein/files/x.pdf"))
            .respond_with(pdf(b"%PDF"))
            .expect(5)
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = Arc::new(fast_config(
            &format!("{}/listing", mock_server.uri()),
            dir.path(),
        ));
        let mut state = HarvestState::load(&config.index_path, &config.cursor_path).unwrap();
        state
            .record_discovered(vec![FileRecord::new(
                "locked/x.pdf",
                format!("{}/epstein/files/x.pdf", mock_server.uri()),
            )])
            .unwrap();
        // a plain file where the destination directory should be
        std::fs::write(dir.path().join("locked"), b"not a directory").unwrap();
        let downloader = Downloader::new(config).unwrap();
        let mut session = StaticSession::default();

        let stats = downloader
            .download_batch(&["locked/x.pdf".to_string()], &mut state, &mut session)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retried, 4);
        assert_eq!(stats.refreshed, 0);
        assert!(!state.index().get("locked/x.pdf").unwrap().downloaded);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_on_retry() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/epstein/files/flaky.pdf"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/epstein/files/flaky.pdf"))
            .respond_with(pdf(b"%PDF-flaky"))
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let (downloader, mut state) = setup(&mock_server.uri(), &dir, &["flaky.pdf"]);
        let mut session = StaticSession::default();

        let stats = downloader
            .download_batch(&["flaky.pdf".to_string()], &mut state, &mut session)
            .await
            .unwrap();

        assert_eq!(stats.downloaded, 1);
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.refreshed, 0);
        assert_eq!(session.reverifications(), 0);
    }

    #[tokio::test]
    async fn test_failed_file_does_not_abort_batch() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/epstein/files/missing.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/epstein/files/ok.pdf"))
            .respond_with(pdf(b"%PDF-ok"))
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let (downloader, mut state) =
            setup(&mock_server.uri(), &dir, &["missing.pdf", "ok.pdf"]);
        let batch = vec!["missing.pdf".to_string(), "ok.pdf".to_string()];
        let mut session = StaticSession::default();

        let stats = downloader
            .download_batch(&batch, &mut state, &mut session)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.downloaded, 1);
        assert!(stats.has_failures());
        assert_eq!(
            state.index().pending(crate::config::BatchSize::Unbounded),
            ["missing.pdf"]
        );
    }

    #[tokio::test]
    async fn test_downloaded_and_unknown_records_are_not_fetched() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(pdf(b"%PDF"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let (downloader, mut state) = setup(&mock_server.uri(), &dir, &["done.pdf"]);
        state.mark_downloaded("done.pdf").unwrap();
        let mut session = StaticSession::default();

        let stats = downloader
            .download_batch(
                &["done.pdf".to_string(), "ghost.pdf".to_string()],
                &mut state,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(
            stats,
            BatchStats {
                skipped: 1,
                ..BatchStats::default()
            }
        );
    }

    #[test]
    fn test_policy_follows_download_settings() {
        let dir = TempDir::new().unwrap();
        let mut config = fast_config("https://example.org/listing", dir.path());
        config.download.max_attempts = 3;
        config.download.backoff_base = Duration::from_secs(1);
        let downloader = Downloader::new(Arc::new(config)).unwrap();
        assert_eq!(downloader.policy().max_attempts(), 3);
        assert_eq!(downloader.policy().delay_after(2), Duration::from_secs(2));
    }

    #[test]
    fn test_batch_stats_absorb_and_total() {
        let mut total = BatchStats {
            downloaded: 2,
            skipped: 1,
            ..BatchStats::default()
        };
        total.absorb(BatchStats {
            downloaded: 1,
            failed: 1,
            retried: 4,
            ..BatchStats::default()
        });
        assert_eq!(total.total(), 5);
        assert_eq!(total.retried, 4);
    }
}
