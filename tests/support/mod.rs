//! Helpers shared by integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::path::Path;
use std::time::Duration;

use harvester_core::HarvestConfig;
use url::Url;

/// Configuration pointed at `listing` with every pause shrunk to nothing.
#[allow(clippy::unwrap_used)]
pub fn fast_config(listing: &str, output_dir: &Path) -> HarvestConfig {
    let mut config = HarvestConfig::with_listing(Url::parse(listing).unwrap(), output_dir);
    config.download.backoff_base = Duration::from_millis(1);
    config.download.pacing = Duration::ZERO;
    config.download.timeout = Duration::from_secs(5);
    config.crawl.page_delay_base = Duration::ZERO;
    config.crawl.page_delay_jitter = Duration::ZERO;
    config.crawl.recheck_delay = Duration::ZERO;
    config.browser.slow_mo = Duration::ZERO;
    config
}
