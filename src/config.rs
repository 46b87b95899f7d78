//! Immutable run configuration.
//!
//! A single [`HarvestConfig`] is built at startup and shared (behind an `Arc`)
//! with the navigator, the downloader and the orchestrator. Nothing reads
//! paths, timeouts or labels from globals.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::auth::SessionCookie;
use crate::user_agent;

/// Listing that enumerates the document set, page 0.
pub const DEFAULT_LISTING_URL: &str =
    "https://www.justice.gov/epstein/doj-disclosures/data-set-9-files";

/// Path segment every file reference contains.
pub const DEFAULT_COLLECTION_MARKER: &str = "/epstein/files/";

/// Extension every file reference ends with (matched case-insensitively).
pub const DEFAULT_FILE_EXTENSION: &str = ".pdf";

/// Default number of new files per round.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Index document file name inside the output directory.
pub const INDEX_FILE_NAME: &str = "harvest_index.json";

/// Cursor document file name inside the output directory.
pub const CURSOR_FILE_NAME: &str = "harvest_state.json";

const AGE_COOKIE_NAME: &str = "justiceGovAgeVerified";
const AGE_COOKIE_VALUE: &str = "true";
const AGE_COOKIE_DOMAINS: &[&str] = &["www.justice.gov", ".justice.gov"];

const GATE_PROMPT: &str = "Are you 18 years of age or older?";
const AFFIRMATIVE_LABEL: &str = "Yes";
const NEXT_PAGE_LABEL: &str = "Next page";
const LAST_PAGE_LABEL: &str = "Last page";

/// Upper bound on files discovered per crawl round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSize {
    /// Stop the round once at least this many new files were discovered.
    Limited(usize),
    /// Drain everything the round can reach.
    Unbounded,
}

impl BatchSize {
    /// Returns the cap, or `None` when unbounded.
    #[must_use]
    pub fn cap(self) -> Option<usize> {
        match self {
            Self::Limited(n) => Some(n),
            Self::Unbounded => None,
        }
    }

    /// Returns true once `count` reaches the cap.
    #[must_use]
    pub fn is_filled(self, count: usize) -> bool {
        self.cap().is_some_and(|cap| count >= cap)
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self::Limited(DEFAULT_BATCH_SIZE)
    }
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("all"),
        }
    }
}

impl FromStr for BatchSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::Unbounded);
        }
        match trimmed.parse::<usize>() {
            Ok(0) => Err("batch size must be at least 1 (or 'all')".to_string()),
            Ok(n) => Ok(Self::Limited(n)),
            Err(_) => Err(format!("invalid batch size '{trimmed}': expected a number or 'all'")),
        }
    }
}

/// The age-verification credential pre-seeded into every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeCredential {
    pub name: String,
    pub value: String,
    /// Each domain gets its own copy of the cookie.
    pub domains: Vec<String>,
}

impl AgeCredential {
    /// Expands the credential into one cookie per domain.
    #[must_use]
    pub fn cookies(&self) -> Vec<SessionCookie> {
        self.domains
            .iter()
            .map(|domain| SessionCookie::new(&self.name, &self.value, domain, "/"))
            .collect()
    }
}

impl Default for AgeCredential {
    fn default() -> Self {
        Self {
            name: AGE_COOKIE_NAME.to_string(),
            value: AGE_COOKIE_VALUE.to_string(),
            domains: AGE_COOKIE_DOMAINS.iter().map(|d| (*d).to_string()).collect(),
        }
    }
}

/// Visible labels the navigator looks for on listing pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLabels {
    /// Prompt text of the age-verification interstitial.
    pub gate_prompt: String,
    /// Label of the control that accepts the interstitial.
    pub affirmative: String,
    pub next_page: String,
    pub last_page: String,
}

impl Default for PageLabels {
    fn default() -> Self {
        Self {
            gate_prompt: GATE_PROMPT.to_string(),
            affirmative: AFFIRMATIVE_LABEL.to_string(),
            next_page: NEXT_PAGE_LABEL.to_string(),
            last_page: LAST_PAGE_LABEL.to_string(),
        }
    }
}

/// Browser session profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    pub headless: bool,
    pub user_agent: String,
    pub locale: String,
    pub timezone: String,
    /// Headers attached to every browser and download request.
    pub extra_headers: Vec<(String, String)>,
    /// Upper bound on a single navigation or settle wait.
    pub page_timeout: Duration,
    /// Pause inserted before every interaction.
    pub slow_mo: Duration,
    pub executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            user_agent: user_agent::BROWSER_USER_AGENT.to_string(),
            locale: "en-US".to_string(),
            timezone: "America/New_York".to_string(),
            extra_headers: user_agent::default_extra_headers(),
            page_timeout: Duration::from_secs(60),
            slow_mo: Duration::from_millis(50),
            executable: None,
            extra_args: Vec::new(),
        }
    }
}

/// Streaming download behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub connect_timeout: Duration,
    /// Whole-request timeout, body included.
    pub timeout: Duration,
    /// Attempts per file, including the first.
    pub max_attempts: u32,
    /// Linear backoff unit: the wait after attempt `n` is `n * backoff_base`.
    pub backoff_base: Duration,
    /// Pause after every file, successful or not.
    pub pacing: Duration,
    /// Write buffer size used while streaming to disk.
    pub write_buffer_bytes: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(120),
            max_attempts: 5,
            backoff_base: Duration::from_secs(2),
            pacing: Duration::from_millis(300),
            write_buffer_bytes: 64 * 1024,
        }
    }
}

/// Pagination pacing and end-of-listing handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    pub page_delay_base: Duration,
    /// Upper bound of the uniform random delay added to `page_delay_base`.
    pub page_delay_jitter: Duration,
    /// Extra settle-and-extract passes before an empty page ends the round.
    pub empty_page_rechecks: u32,
    pub recheck_delay: Duration,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            page_delay_base: Duration::from_millis(800),
            page_delay_jitter: Duration::from_millis(800),
            empty_page_rechecks: 2,
            recheck_delay: Duration::from_millis(1500),
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub listing_url: Url,
    pub collection_marker: String,
    pub file_extension: String,
    pub output_dir: PathBuf,
    pub index_path: PathBuf,
    pub cursor_path: PathBuf,
    /// Where markup snapshots of blocked or empty pages are written.
    pub snapshot_dir: PathBuf,
    pub batch_size: BatchSize,
    pub age_credential: AgeCredential,
    pub labels: PageLabels,
    pub browser: BrowserSettings,
    pub download: DownloadSettings,
    pub crawl: CrawlSettings,
}

impl HarvestConfig {
    /// Creates a configuration with the stock listing and all state stored
    /// under `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in listing URL fails to parse, which
    /// cannot happen for the shipped constant.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, url::ParseError> {
        let listing_url = Url::parse(DEFAULT_LISTING_URL)?;
        Ok(Self::with_listing(listing_url, output_dir))
    }

    /// Creates a configuration for an arbitrary listing URL.
    #[must_use]
    pub fn with_listing(listing_url: Url, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            listing_url,
            collection_marker: DEFAULT_COLLECTION_MARKER.to_string(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            index_path: output_dir.join(INDEX_FILE_NAME),
            cursor_path: output_dir.join(CURSOR_FILE_NAME),
            snapshot_dir: output_dir.clone(),
            output_dir,
            batch_size: BatchSize::default(),
            age_credential: AgeCredential::default(),
            labels: PageLabels::default(),
            browser: BrowserSettings::default(),
            download: DownloadSettings::default(),
            crawl: CrawlSettings::default(),
        }
    }

    /// Resolves a reference found on a listing page into an absolute locator.
    #[must_use]
    pub fn resolve_locator(&self, reference: &str) -> Option<String> {
        self.listing_url.join(reference).ok().map(String::from)
    }

    /// Local destination for a file identity.
    #[must_use]
    pub fn destination_for(&self, identity: &str) -> PathBuf {
        self.output_dir.join(identity)
    }

    /// Path of the markup snapshot for a listing page.
    #[must_use]
    pub fn snapshot_path(&self, page: u64) -> PathBuf {
        self.snapshot_dir.join(format!("debug_page_{page}.html"))
    }

    /// Directory holding downloaded files.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
