//! File reference extraction from listing markup.
//!
//! Two strategies run in order:
//! 1. structural: parse the markup and read `href` from every anchor;
//! 2. textual: when the structural pass finds nothing, scan the raw markup
//!    for `href="…"` attributes with a regex.
//!
//! A reference qualifies when it contains the collection marker and ends with
//! the file extension, both compared case-insensitively.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use scraper::{Html, Selector};
use tracing::{debug, trace};

use crate::config::{DEFAULT_COLLECTION_MARKER, DEFAULT_FILE_EXTENSION, HarvestConfig};

#[allow(clippy::expect_used)]
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid")); // Static pattern, safe to panic

#[allow(clippy::expect_used)]
static DEFAULT_PATTERN: LazyLock<LinkPattern> = LazyLock::new(|| {
    LinkPattern::new(DEFAULT_COLLECTION_MARKER, DEFAULT_FILE_EXTENSION)
        .expect("default link pattern is valid") // Escaped literals, safe to panic
});

/// Marker/extension pair describing a file reference.
#[derive(Debug, Clone)]
pub struct LinkPattern {
    marker: String,
    extension: String,
    raw_href: Regex,
}

impl LinkPattern {
    /// Builds a pattern for references containing `marker` and ending with
    /// `extension`.
    ///
    /// # Errors
    ///
    /// Returns an error if the fallback regex cannot be compiled.
    pub fn new(marker: &str, extension: &str) -> Result<Self, regex::Error> {
        let raw_href = RegexBuilder::new(&format!(
            r#"href\s*=\s*["']([^"']*{}[^"']*{})["']"#,
            regex::escape(marker),
            regex::escape(extension)
        ))
        .case_insensitive(true)
        .build()?;
        Ok(Self {
            marker: marker.to_lowercase(),
            extension: extension.to_lowercase(),
            raw_href,
        })
    }

    /// Builds the pattern configured for a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the fallback regex cannot be compiled.
    pub fn from_config(config: &HarvestConfig) -> Result<Self, regex::Error> {
        Self::new(&config.collection_marker, &config.file_extension)
    }

    /// True when `reference` is a file reference of this pattern.
    #[must_use]
    pub fn matches(&self, reference: &str) -> bool {
        let lowered = reference.to_lowercase();
        if !lowered.ends_with(&self.extension) {
            return false;
        }
        let stem_end = lowered.len() - self.extension.len();
        lowered
            .find(&self.marker)
            .is_some_and(|at| at + self.marker.len() < stem_end)
    }

    /// Extracts qualifying references from `markup`, first occurrence wins.
    #[must_use]
    pub fn extract(&self, markup: &str) -> Vec<String> {
        if markup.trim().is_empty() {
            return Vec::new();
        }

        let structural = self.extract_structural(markup);
        if !structural.is_empty() {
            trace!(count = structural.len(), "structural extraction");
            return structural;
        }

        let textual = self.extract_textual(markup);
        if !textual.is_empty() {
            debug!(count = textual.len(), "structural extraction empty, used raw markup scan");
        }
        textual
    }

    fn extract_structural(&self, markup: &str) -> Vec<String> {
        let document = Html::parse_document(markup);
        dedup(
            document
                .select(&ANCHOR_SELECTOR)
                .filter_map(|anchor| anchor.value().attr("href"))
                .map(str::trim)
                .filter(|href| self.matches(href))
                .map(str::to_string),
        )
    }

    fn extract_textual(&self, markup: &str) -> Vec<String> {
        dedup(
            self.raw_href
                .captures_iter(markup)
                .filter_map(|captures| captures.get(1))
                .map(|m| m.as_str().trim())
                .filter(|href| self.matches(href))
                .map(str::to_string),
        )
    }
}

/// Extracts file references using the stock collection marker and extension.
#[must_use]
pub fn extract_links(markup: &str) -> Vec<String> {
    DEFAULT_PATTERN.extract(markup)
}

/// Canonical file name of a reference: its last path segment.
#[must_use]
pub fn identity_of(reference: &str) -> Option<&str> {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    path.rsplit('/').next().filter(|segment| !segment.is_empty())
}

fn dedup(references: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    references
        .filter(|reference| seen.insert(reference.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_anchors_yield_single_reference() {
        let html = r#"<ul>
            <li><a href="/epstein/files/abc.pdf">abc</a></li>
            <li><a href="/epstein/files/abc.pdf">abc (again)</a></li>
        </ul>"#;
        assert_eq!(extract_links(html), ["/epstein/files/abc.pdf"]);
    }

    #[test]
    fn test_preserves_discovery_order() {
        let html = r#"
            <a href="/epstein/files/c.pdf">c</a>
            <a href="/epstein/files/a.pdf">a</a>
            <a href="/epstein/files/c.pdf">c</a>
            <a href="/epstein/files/b.pdf">b</a>"#;
        assert_eq!(
            extract_links(html),
            ["/epstein/files/c.pdf", "/epstein/files/a.pdf", "/epstein/files/b.pdf"]
        );
    }

    #[test]
    fn test_structural_handles_reordered_and_single_quoted_attributes() {
        let html = r#"<a class="file" data-x='1' href='/epstein/files/Q1.PDF' title="x">Q1</a>"#;
        assert_eq!(extract_links(html), ["/epstein/files/Q1.PDF"]);
    }

    #[test]
    fn test_ignores_non_matching_links() {
        let html = r#"
            <a href="/epstein/doj-disclosures?page=2">Next page</a>
            <a href="/epstein/files/readme.txt">txt</a>
            <a href="/other/files/abc.pdf">other</a>
            <a href="/epstein/files/">dir</a>
            <a href="/epstein/files/.pdf">no name</a>"#;
        assert!(extract_links(html).is_empty());
    }

    #[test]
    fn test_absolute_references_are_kept_verbatim() {
        let html = r#"<a href="https://www.justice.gov/epstein/files/EFTA00039025.pdf">x</a>"#;
        assert_eq!(
            extract_links(html),
            ["https://www.justice.gov/epstein/files/EFTA00039025.pdf"]
        );
    }

    #[test]
    fn test_falls_back_to_raw_scan_when_no_anchor_matches() {
        // References only present inside a script block, not as anchors.
        let html = r#"<html><body><script>
            var rows = '<a href="/epstein/files/late.pdf">late</a>';
        </script></body></html>"#;
        assert_eq!(extract_links(html), ["/epstein/files/late.pdf"]);
    }

    #[test]
    fn test_raw_scan_is_case_insensitive() {
        let pattern = LinkPattern::new("/epstein/files/", ".pdf").unwrap();
        let raw = r#"<!-- HREF="/Epstein/Files/X.Pdf" -->"#;
        assert_eq!(pattern.extract(raw), ["/Epstein/Files/X.Pdf"]);
    }

    #[test]
    fn test_empty_and_malformed_input_yield_nothing() {
        assert!(extract_links("").is_empty());
        assert!(extract_links("   \n").is_empty());
        assert!(extract_links("<a href=\"/epstein/files/").is_empty());
        assert!(extract_links("<<<>>>\u{0}garbage").is_empty());
    }

    #[test]
    fn test_repeated_calls_are_deterministic() {
        let html = r#"<a href="/epstein/files/b.pdf"></a><a href="/epstein/files/a.pdf"></a>"#;
        let first = extract_links(html);
        for _ in 0..5 {
            assert_eq!(extract_links(html), first);
        }
        let raw = r#"<script>x = "href='/epstein/files/z.pdf'"; href="/epstein/files/y.pdf"</script>"#;
        let first = extract_links(raw);
        assert_eq!(first, ["/epstein/files/z.pdf", "/epstein/files/y.pdf"]);
        assert_eq!(extract_links(raw), first);
    }

    #[test]
    fn test_custom_pattern() {
        let pattern = LinkPattern::new("/records/", ".zip").unwrap();
        let html = r#"<a href="/records/r1.zip">1</a><a href="/epstein/files/a.pdf">2</a>"#;
        assert_eq!(pattern.extract(html), ["/records/r1.zip"]);
    }

    #[test]
    fn test_identity_is_last_path_segment() {
        assert_eq!(identity_of("/epstein/files/abc.pdf"), Some("abc.pdf"));
        assert_eq!(
            identity_of("https://www.justice.gov/epstein/files/DataSet%209/EFTA1.pdf"),
            Some("EFTA1.pdf")
        );
        assert_eq!(identity_of("/epstein/files/a.pdf?download=1"), Some("a.pdf"));
        assert_eq!(identity_of("/epstein/files/"), None);
    }
}
