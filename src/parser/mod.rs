//! Markup analysis for listing pages.
//!
//! Both functions here are pure: they take page markup (possibly empty or
//! malformed) and never fail.
//!
//! - [`extract_links`] / [`LinkPattern`] - ordered, deduplicated file references
//! - [`classify_gate`] - blocked / age-gated / open classification
//!
//! # Example
//!
//! ```
//! use harvester_core::parser::{GateState, classify_gate, extract_links};
//!
//! let html = r#"<a href="/epstein/files/abc.pdf">abc</a><a href="/epstein/files/abc.pdf">again</a>"#;
//! assert_eq!(extract_links(html), vec!["/epstein/files/abc.pdf".to_string()]);
//! assert_eq!(classify_gate(html), GateState::Open);
//! ```

mod gate;
mod links;

pub use gate::{GateState, classify_gate, classify_gate_with};
pub use links::{LinkPattern, extract_links, identity_of};
