//! Access-gate classification of listing markup.

use std::fmt;

const DEFAULT_GATE_PROMPT: &str = "Are you 18 years of age or older?";

const PERMISSION_DENIED: &str = "you don't have permission to access";
const PERMISSION_DENIED_TYPOGRAPHIC: &str = "you don\u{2019}t have permission to access";
const EDGE_ERROR_HOST: &str = "errors.edgesuite.net";
const REFERENCE_MARKER: &str = "reference #";
const ACCESS_DENIED: &str = "access denied";

/// What stands between the session and the listing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// The gateway refused the session. Nothing on the page is usable.
    Blocked,
    /// The age-verification interstitial is showing.
    AgeGated,
    /// Listing content is reachable.
    Open,
}

impl GateState {
    #[must_use]
    pub fn is_blocked(self) -> bool {
        self == Self::Blocked
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Blocked => "blocked",
            Self::AgeGated => "age-gated",
            Self::Open => "open",
        };
        f.write_str(label)
    }
}

/// Classifies markup using the stock interstitial prompt.
#[must_use]
pub fn classify_gate(markup: &str) -> GateState {
    classify_gate_with(markup, DEFAULT_GATE_PROMPT)
}

/// Classifies markup, recognising the interstitial by `gate_prompt`.
///
/// A page is only `Blocked` on high-confidence denial signatures. Age-gated
/// listings embed a hidden error fragment that says "access denied" on its
/// own, so that phrase alone never blocks.
#[must_use]
pub fn classify_gate_with(markup: &str, gate_prompt: &str) -> GateState {
    let lowered = markup.to_lowercase();

    let denied = lowered.contains(PERMISSION_DENIED)
        || lowered.contains(PERMISSION_DENIED_TYPOGRAPHIC)
        || lowered.contains(EDGE_ERROR_HOST)
        || (lowered.contains(REFERENCE_MARKER) && lowered.contains(ACCESS_DENIED));
    if denied {
        return GateState::Blocked;
    }

    let prompt = gate_prompt.trim().to_lowercase();
    if !prompt.is_empty() && lowered.contains(&prompt) {
        return GateState::AgeGated;
    }

    GateState::Open
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDGE_DENIAL: &str = r#"<HTML><HEAD><TITLE>Access Denied</TITLE></HEAD><BODY>
        <H1>Access Denied</H1>
        You don't have permission to access "http&#58;&#47;&#47;www&#46;justice&#46;gov&#47;epstein&#47;" on this server.<P>
        Reference&#32;&#35;18&#46;1f2e3d4c&#46;1700000000&#46;abcdef
        <P>https&#58;&#47;&#47;errors&#46;edgesuite&#46;net&#47;18&#46;1f2e3d4c
        </BODY></HTML>"#;

    #[test]
    fn test_gateway_denial_is_blocked() {
        assert_eq!(classify_gate(EDGE_DENIAL), GateState::Blocked);
        assert!(classify_gate(EDGE_DENIAL).is_blocked());
    }

    #[test]
    fn test_each_signature_blocks_on_its_own() {
        assert_eq!(
            classify_gate("<p>You don't have permission to access this resource</p>"),
            GateState::Blocked
        );
        assert_eq!(
            classify_gate("<p>You don\u{2019}t have permission to access this</p>"),
            GateState::Blocked
        );
        assert_eq!(
            classify_gate(r#"<a href="https://errors.edgesuite.net/x">details</a>"#),
            GateState::Blocked
        );
        assert_eq!(
            classify_gate("<h1>Access Denied</h1><p>Reference #18.abc</p>"),
            GateState::Blocked
        );
    }

    #[test]
    fn test_access_denied_alone_is_not_blocked() {
        let html = r#"<div class="age-gate">
            <p>Are you 18 years of age or older?</p>
            <button>Yes</button><button>No</button>
            <div class="hidden error">Access denied. You must be 18 to view this content.</div>
        </div>"#;
        assert_eq!(classify_gate(html), GateState::AgeGated);
    }

    #[test]
    fn test_prompt_match_is_case_insensitive() {
        assert_eq!(
            classify_gate("<h2>ARE YOU 18 YEARS OF AGE OR OLDER?</h2>"),
            GateState::AgeGated
        );
    }

    #[test]
    fn test_plain_listing_is_open() {
        let html = r#"<ul><li><a href="/epstein/files/a.pdf">a</a></li></ul>"#;
        assert_eq!(classify_gate(html), GateState::Open);
        assert_eq!(classify_gate(""), GateState::Open);
    }

    #[test]
    fn test_custom_prompt() {
        let html = "<p>Please confirm you are an adult</p>";
        assert_eq!(classify_gate(html), GateState::Open);
        assert_eq!(
            classify_gate_with(html, "confirm you are an adult"),
            GateState::AgeGated
        );
        assert_eq!(classify_gate_with(html, "  "), GateState::Open);
    }

    #[test]
    fn test_display() {
        assert_eq!(GateState::AgeGated.to_string(), "age-gated");
    }
}
