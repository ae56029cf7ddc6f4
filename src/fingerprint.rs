// src/fingerprint.rs
//! Whitespace/case-insensitive content fingerprint used for change detection only.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Canonical form: every whitespace char removed, remainder lowercased.
pub fn canonicalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// SHA-256 hex digest of the canonical text. Absent or empty input yields `""`,
/// which doubles as the fingerprint of a source that was never fetched.
pub fn fingerprint(text: Option<&str>) -> String {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return String::new();
    };
    let digest = Sha256::digest(canonicalize(text).as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Short anonymized id for log lines; never log raw page text.
pub(crate) fn short_id(text: &str) -> String {
    fingerprint(Some(text)).chars().take(12).collect()
}
