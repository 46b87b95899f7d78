//! Optional TOML configuration file.
//!
//! Every key is optional; anything absent keeps the built-in default, and
//! command-line flags win over the file.
//!
//! ```toml
//! output_dir = "/data/harvest"
//! batch_size = "all"
//!
//! [browser]
//! headless = true
//! slow_mo_ms = 50
//!
//! [download]
//! max_attempts = 5
//! backoff_base_ms = 2000
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use harvester_core::{BatchSize, HarvestConfig};
use serde::Deserialize;
use url::Url;

const CONFIG_DIR_NAME: &str = "harvester";
const CONFIG_FILE_NAME: &str = "config.toml";

/// `batch_size` accepts a number or the keyword `"all"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum BatchSetting {
    Count(u64),
    Keyword(String),
}

impl BatchSetting {
    fn to_batch_size(&self) -> Result<BatchSize> {
        let raw = match self {
            Self::Count(count) => count.to_string(),
            Self::Keyword(keyword) => keyword.clone(),
        };
        raw.parse::<BatchSize>()
            .map_err(|message| anyhow::anyhow!("Invalid config value for `batch_size`: {message}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub listing_url: Option<String>,
    pub collection_marker: Option<String>,
    pub file_extension: Option<String>,
    pub batch_size: Option<BatchSetting>,
    #[serde(default)]
    pub browser: BrowserSection,
    #[serde(default)]
    pub download: DownloadSection,
    #[serde(default)]
    pub crawl: CrawlSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BrowserSection {
    pub headless: Option<bool>,
    pub user_agent: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub executable: Option<PathBuf>,
    pub page_timeout_secs: Option<u64>,
    pub slow_mo_ms: Option<u64>,
    pub extra_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DownloadSection {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub pacing_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CrawlSection {
    pub page_delay_base_ms: Option<u64>,
    pub page_delay_jitter_ms: Option<u64>,
    pub empty_page_rechecks: Option<u32>,
    pub recheck_delay_ms: Option<u64>,
}

impl FileConfig {
    /// Validates values against the ranges the engine accepts.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(listing_url) = &self.listing_url {
            Url::parse(listing_url)
                .with_context(|| format!("Invalid config value for `listing_url`: {listing_url}"))?;
        }
        if let Some(batch) = &self.batch_size {
            batch.to_batch_size()?;
        }
        if self.collection_marker.as_deref().is_some_and(str::is_empty) {
            bail!("Invalid config value for `collection_marker`: must not be empty");
        }
        if self.file_extension.as_deref().is_some_and(str::is_empty) {
            bail!("Invalid config value for `file_extension`: must not be empty");
        }

        validate_range("browser.page_timeout_secs", self.browser.page_timeout_secs, 1..=600)?;
        validate_range("browser.slow_mo_ms", self.browser.slow_mo_ms, 0..=10_000)?;
        validate_range(
            "download.connect_timeout_secs",
            self.download.connect_timeout_secs,
            1..=3600,
        )?;
        validate_range("download.timeout_secs", self.download.timeout_secs, 1..=3600)?;
        validate_range(
            "download.max_attempts",
            self.download.max_attempts.map(u64::from),
            1..=20,
        )?;
        validate_range("download.backoff_base_ms", self.download.backoff_base_ms, 0..=60_000)?;
        validate_range("download.pacing_ms", self.download.pacing_ms, 0..=60_000)?;
        validate_range(
            "crawl.page_delay_base_ms",
            self.crawl.page_delay_base_ms,
            0..=60_000,
        )?;
        validate_range(
            "crawl.page_delay_jitter_ms",
            self.crawl.page_delay_jitter_ms,
            0..=60_000,
        )?;
        validate_range(
            "crawl.empty_page_rechecks",
            self.crawl.empty_page_rechecks.map(u64::from),
            0..=10,
        )?;
        validate_range("crawl.recheck_delay_ms", self.crawl.recheck_delay_ms, 0..=60_000)?;
        Ok(())
    }

    /// Copies every value present in the file onto `config`.
    pub(crate) fn apply_to(&self, config: &mut HarvestConfig) -> Result<()> {
        if let Some(listing_url) = &self.listing_url {
            config.listing_url = Url::parse(listing_url)
                .with_context(|| format!("Invalid config value for `listing_url`: {listing_url}"))?;
        }
        if let Some(marker) = &self.collection_marker {
            config.collection_marker.clone_from(marker);
        }
        if let Some(extension) = &self.file_extension {
            config.file_extension.clone_from(extension);
        }
        if let Some(batch) = &self.batch_size {
            config.batch_size = batch.to_batch_size()?;
        }

        let browser = &mut config.browser;
        set_if(&mut browser.headless, self.browser.headless);
        set_if(&mut browser.user_agent, self.browser.user_agent.clone());
        set_if(&mut browser.locale, self.browser.locale.clone());
        set_if(&mut browser.timezone, self.browser.timezone.clone());
        if let Some(executable) = &self.browser.executable {
            browser.executable = Some(executable.clone());
        }
        set_if(&mut browser.page_timeout, self.browser.page_timeout_secs.map(Duration::from_secs));
        set_if(&mut browser.slow_mo, self.browser.slow_mo_ms.map(Duration::from_millis));
        set_if(&mut browser.extra_args, self.browser.extra_args.clone());

        let download = &mut config.download;
        set_if(
            &mut download.connect_timeout,
            self.download.connect_timeout_secs.map(Duration::from_secs),
        );
        set_if(&mut download.timeout, self.download.timeout_secs.map(Duration::from_secs));
        set_if(&mut download.max_attempts, self.download.max_attempts);
        set_if(
            &mut download.backoff_base,
            self.download.backoff_base_ms.map(Duration::from_millis),
        );
        set_if(&mut download.pacing, self.download.pacing_ms.map(Duration::from_millis));

        let crawl = &mut config.crawl;
        set_if(
            &mut crawl.page_delay_base,
            self.crawl.page_delay_base_ms.map(Duration::from_millis),
        );
        set_if(
            &mut crawl.page_delay_jitter,
            self.crawl.page_delay_jitter_ms.map(Duration::from_millis),
        );
        set_if(&mut crawl.empty_page_rechecks, self.crawl.empty_page_rechecks);
        set_if(
            &mut crawl.recheck_delay,
            self.crawl.recheck_delay_ms.map(Duration::from_millis),
        );
        Ok(())
    }
}

fn set_if<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn validate_range(
    field: &str,
    value: Option<u64>,
    range: std::ops::RangeInclusive<u64>,
) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !range.contains(&value) {
        bail!(
            "Invalid config value for `{field}`: {value}. Expected range: {}..={}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/harvester/config.toml`
/// 2. `$HOME/.config/harvester/config.toml`
#[must_use]
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default location is optional.
pub(crate) fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match resolve_default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        },
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config = parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(Some(config))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
