//! Helpers shared by unit tests.

pub(crate) mod scripted_browser;
pub(crate) mod socket_guard;

use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::config::HarvestConfig;

/// Configuration pointed at `listing` with every pause shrunk to nothing.
#[allow(clippy::expect_used)]
pub(crate) fn fast_config(listing: &str, output_dir: &Path) -> HarvestConfig {
    let listing = Url::parse(listing).expect("test listing URL is valid");
    let mut config = HarvestConfig::with_listing(listing, output_dir);
    config.download.backoff_base = Duration::from_millis(1);
    config.download.pacing = Duration::ZERO;
    config.download.timeout = Duration::from_secs(5);
    config.crawl.page_delay_base = Duration::ZERO;
    config.crawl.page_delay_jitter = Duration::ZERO;
    config.crawl.recheck_delay = Duration::ZERO;
    config.browser.slow_mo = Duration::ZERO;
    config
}
