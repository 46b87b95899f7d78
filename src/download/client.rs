//! HTTP client wrapper for streaming files to disk.
//!
//! [`HttpClient`] carries the browser profile (User-Agent and extra headers)
//! and a cookie jar shared with the browser session, so the gateway sees one
//! consistent client across page views and downloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::DownloadError;
use crate::auth::{SessionCookie, add_cookies_to_jar, load_cookies_into_jar};
use crate::config::{BrowserSettings, DownloadSettings, HarvestConfig};

const PART_SUFFIX: &str = ".part";

/// HTTP client for downloading files with streaming support.
///
/// Created once per run and reused for every file, taking advantage of
/// connection pooling. Cookies added later (after a session re-verification)
/// apply to every subsequent request.
///
/// # Example
///
/// ```no_run
/// use harvester_core::config::HarvestConfig;
/// use harvester_core::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = HarvestConfig::new("./downloads")?;
/// let client = HttpClient::from_config(&config)?;
/// let bytes = client
///     .fetch_to_file("https://example.com/file.pdf", Path::new("./downloads/file.pdf"))
///     .await?;
/// println!("wrote {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    jar: Arc<Jar>,
    write_buffer_bytes: usize,
}

impl HttpClient {
    /// Creates a client with the given profile and initial cookies.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the underlying client cannot be
    /// built.
    #[instrument(level = "debug", skip_all, fields(cookies = cookies.len()))]
    pub fn new(
        download: &DownloadSettings,
        browser: &BrowserSettings,
        cookies: &[SessionCookie],
    ) -> Result<Self, DownloadError> {
        let jar = load_cookies_into_jar(cookies);
        let client = Client::builder()
            .connect_timeout(download.connect_timeout)
            .timeout(download.timeout)
            .gzip(true)
            .user_agent(browser.user_agent.as_str())
            .default_headers(header_map(&browser.extra_headers))
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|source| DownloadError::Client { source })?;
        Ok(Self {
            client,
            jar,
            write_buffer_bytes: download.write_buffer_bytes.max(1024),
        })
    }

    /// Creates the client for a run, pre-seeded with the age credential.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the underlying client cannot be
    /// built.
    pub fn from_config(config: &HarvestConfig) -> Result<Self, DownloadError> {
        Self::new(
            &config.download,
            &config.browser,
            &config.age_credential.cookies(),
        )
    }

    /// Copies session cookies into the client's jar, replacing same-named ones.
    pub fn add_session_cookies(&self, cookies: &[SessionCookie]) -> usize {
        let added = add_cookies_to_jar(&self.jar, cookies);
        debug!(added, "refreshed download cookies");
        added
    }

    /// Streams `url` into `destination`.
    ///
    /// The body is written to `<destination>.part` and renamed into place only
    /// after a complete, non-empty body was received, so an existing
    /// destination is always a finished file. Returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::HttpStatus`] for any status other than 200
    /// - [`DownloadError::HtmlPayload`] when the response is markup
    /// - [`DownloadError::EmptyBody`] when nothing was received
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] on transport failure
    /// - [`DownloadError::Io`] on local write failure
    #[instrument(skip(self), fields(destination = %destination.display()))]
    pub async fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::from_transport(url, e))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(DownloadError::http_status(url, status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if is_html_media_type(&content_type) {
            return Err(DownloadError::html_payload(url, content_type));
        }

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let part_path = part_path(destination);
        let file = File::create(&part_path)
            .await
            .map_err(|e| DownloadError::io(part_path.clone(), e))?;

        // Stream response body to the part file, with cleanup on error
        let stream_result =
            stream_to_file(file, response, url, &part_path, self.write_buffer_bytes).await;
        let bytes_written = match stream_result {
            Ok(0) => {
                discard_part(&part_path).await;
                return Err(DownloadError::empty_body(url));
            }
            Ok(bytes) => bytes,
            Err(error) => {
                discard_part(&part_path).await;
                return Err(error);
            }
        };

        if let Err(error) = tokio::fs::rename(&part_path, destination).await {
            discard_part(&part_path).await;
            return Err(DownloadError::io(destination, error));
        }

        info!(bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    buffer_bytes: usize,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(buffer_bytes, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_transport(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}

async fn discard_part(part_path: &Path) {
    debug!(path = %part_path.display(), "cleaning up partial file after error");
    let _ = tokio::fs::remove_file(part_path).await;
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(PART_SUFFIX);
    destination.with_file_name(name)
}

fn is_html_media_type(content_type: &str) -> bool {
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid extra header"),
        }
    }
    map
}
