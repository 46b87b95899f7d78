//! Browser session seam.
//!
//! The navigator only ever talks to a [`BrowserDriver`]: navigate, wait for
//! the page to settle, locate controls by [`ControlDescriptor`], click them,
//! read markup and cookies. The production backend drives Chromium over the
//! DevTools protocol (feature `browser`); tests use a scripted driver.

#[cfg(feature = "browser")]
mod chromium;
mod error;
#[cfg(not(feature = "browser"))]
mod unavailable;

use async_trait::async_trait;

use crate::auth::SessionCookie;
use crate::config::HarvestConfig;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumDriver, ChromiumLauncher};
pub use error::BrowserError;
#[cfg(not(feature = "browser"))]
pub use unavailable::{ChromiumDriver, ChromiumLauncher};

/// Interactive role of a control, as exposed to assistive technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRole {
    Button,
    Link,
}

/// How to recognise a control on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlDescriptor {
    /// Element with `role` whose accessible name contains `name`.
    Role { role: ControlRole, name: String },
    /// `<button>` whose visible text contains the label.
    ButtonText(String),
    /// `<input>` whose `value` equals the label.
    InputValue(String),
    /// `<a>` whose visible text contains the label.
    AnchorText(String),
    /// `<a>` whose `aria-label` equals the label.
    AriaLabel(String),
}

/// What a driver could read from a candidate element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFacts {
    pub text: Option<String>,
    pub value: Option<String>,
    pub aria_label: Option<String>,
}

impl ControlDescriptor {
    /// Candidates for the interstitial's affirmative control, in priority order.
    #[must_use]
    pub fn affirmative(label: &str) -> Vec<Self> {
        vec![
            Self::Role {
                role: ControlRole::Button,
                name: label.to_string(),
            },
            Self::ButtonText(label.to_string()),
            Self::InputValue(label.to_string()),
            Self::AnchorText(label.to_string()),
        ]
    }

    /// Candidates for the "next page" pagination link.
    #[must_use]
    pub fn next_page(label: &str) -> Vec<Self> {
        vec![
            Self::Role {
                role: ControlRole::Link,
                name: label.to_string(),
            },
            Self::AriaLabel(label.to_string()),
        ]
    }

    /// Candidates for the "last page" pagination link.
    #[must_use]
    pub fn last_page(label: &str) -> Vec<Self> {
        vec![
            Self::AriaLabel(label.to_string()),
            Self::Role {
                role: ControlRole::Link,
                name: label.to_string(),
            },
        ]
    }

    /// CSS selector enumerating the elements this descriptor could match.
    #[must_use]
    pub fn css_selector(&self) -> &'static str {
        match self {
            Self::Role {
                role: ControlRole::Button,
                ..
            } => r#"button, [role="button"], input[type="button"], input[type="submit"]"#,
            Self::Role {
                role: ControlRole::Link,
                ..
            } => r#"a[href], [role="link"]"#,
            Self::ButtonText(_) => "button",
            Self::InputValue(_) => "input",
            Self::AnchorText(_) => "a",
            Self::AriaLabel(_) => "a[aria-label]",
        }
    }

    /// True when an element with `facts` satisfies this descriptor.
    #[must_use]
    pub fn accepts(&self, facts: &ControlFacts) -> bool {
        match self {
            Self::Role { name, .. } => accessible_name(facts)
                .is_some_and(|accessible| contains_ignore_case(&accessible, name)),
            Self::ButtonText(label) | Self::AnchorText(label) => facts
                .text
                .as_deref()
                .is_some_and(|text| contains_ignore_case(text, label)),
            Self::InputValue(label) => facts.value.as_deref().map(str::trim) == Some(label.as_str()),
            Self::AriaLabel(label) => {
                facts.aria_label.as_deref().map(str::trim) == Some(label.as_str())
            }
        }
    }
}

fn accessible_name(facts: &ControlFacts) -> Option<String> {
    [&facts.aria_label, &facts.text, &facts.value]
        .into_iter()
        .flatten()
        .map(|candidate| normalize_whitespace(candidate))
        .find(|candidate| !candidate.is_empty())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let needle = normalize_whitespace(needle).to_lowercase();
    !needle.is_empty() && normalize_whitespace(haystack).to_lowercase().contains(&needle)
}

/// One live browser page.
///
/// Every method may fail with [`BrowserError`]; absence of a control is not an
/// error and is reported as `Ok(None)`.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Handle to a located control.
    type Control: Send + Sync;

    /// Navigates to `url` and waits for the response.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Waits for pending navigation and document readiness after an interaction.
    async fn wait_until_settled(&mut self) -> Result<(), BrowserError>;

    /// Locates the first element satisfying `descriptor`.
    async fn find_control(
        &mut self,
        descriptor: &ControlDescriptor,
    ) -> Result<Option<Self::Control>, BrowserError>;

    /// Reads an attribute from a located control.
    async fn control_attribute(
        &mut self,
        control: &Self::Control,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Clicks a located control.
    async fn click(&mut self, control: Self::Control) -> Result<(), BrowserError>;

    /// Full markup of the current document.
    async fn markup(&mut self) -> Result<String, BrowserError>;

    /// Cookies currently held by the session.
    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError>;

    /// Ends the session. Called exactly once per launched driver.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Starts browser sessions.
///
/// A launched session already carries the configured profile (User-Agent,
/// locale, timezone, extra headers) and the pre-seeded age credential.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Driver: BrowserDriver;

    async fn launch(&self, config: &HarvestConfig) -> Result<Self::Driver, BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(text: Option<&str>, value: Option<&str>, aria: Option<&str>) -> ControlFacts {
        ControlFacts {
            text: text.map(str::to_string),
            value: value.map(str::to_string),
            aria_label: aria.map(str::to_string),
        }
    }

    #[test]
    fn test_affirmative_priority_order() {
        let candidates = ControlDescriptor::affirmative("Yes");
        assert!(matches!(
            candidates[0],
            ControlDescriptor::Role {
                role: ControlRole::Button,
                ..
            }
        ));
        assert_eq!(candidates[1], ControlDescriptor::ButtonText("Yes".into()));
        assert_eq!(candidates[2], ControlDescriptor::InputValue("Yes".into()));
        assert_eq!(candidates[3], ControlDescriptor::AnchorText("Yes".into()));
    }

    #[test]
    fn test_role_uses_accessible_name_precedence() {
        let yes = ControlDescriptor::Role {
            role: ControlRole::Button,
            name: "Yes".into(),
        };
        assert!(yes.accepts(&facts(Some("  yes  "), None, None)));
        assert!(yes.accepts(&facts(None, Some("Yes"), None)));
        // aria-label wins over visible text
        assert!(!yes.accepts(&facts(Some("Yes"), None, Some("Close dialog"))));
        assert!(!yes.accepts(&facts(Some(""), None, None)));
    }

    #[test]
    fn test_text_descriptors_match_substrings_case_insensitively() {
        let button = ControlDescriptor::ButtonText("Yes".into());
        assert!(button.accepts(&facts(Some("YES, I am 18"), None, None)));
        assert!(!button.accepts(&facts(Some("No"), None, None)));
        assert!(!button.accepts(&facts(None, Some("Yes"), None)));
    }

    #[test]
    fn test_attribute_descriptors_match_exactly() {
        let input = ControlDescriptor::InputValue("Yes".into());
        assert!(input.accepts(&facts(None, Some("Yes"), None)));
        assert!(!input.accepts(&facts(None, Some("Yes please"), None)));

        let next = ControlDescriptor::AriaLabel("Next page".into());
        assert!(next.accepts(&facts(None, None, Some("Next page"))));
        assert!(!next.accepts(&facts(Some("Next page"), None, None)));
    }

    #[test]
    fn test_pagination_candidates() {
        assert_eq!(
            ControlDescriptor::last_page("Last page")[0],
            ControlDescriptor::AriaLabel("Last page".into())
        );
        assert_eq!(
            ControlDescriptor::next_page("Next page")[1].css_selector(),
            "a[aria-label]"
        );
    }
}
