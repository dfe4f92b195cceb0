//! Source-key validation.
//!
//! Submissions name an object key inside the bucket. Before a key reaches the
//! store it must pass a character whitelist, a traversal check, a length cap,
//! and an extension check against the supported container formats.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Longest accepted object key.
pub const MAX_KEY_LEN: usize = 1024;

/// Container extensions the encoder accepts, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "3gp", "ts", "mts", "m2ts", "mpg",
    "mpeg", "vob", "ogv", "mxf", "f4v", "asf", "divx",
];

/// Whitelist of characters an object key may contain.
fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_\-\./@ ]+$").unwrap())
}

/// Validate a source object key for submission.
pub fn validate_source_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::Validation("source key must not be empty".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::Validation(format!(
            "source key exceeds {MAX_KEY_LEN} characters"
        )));
    }
    if key.contains("..") {
        return Err(Error::Validation(
            "source key must not contain '..'".into(),
        ));
    }
    if !key_pattern().is_match(key) {
        return Err(Error::Validation(
            "source key contains unsupported characters".into(),
        ));
    }

    let ext = key
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .filter(|e| !e.contains('/'));
    match ext {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        Some(ext) => Err(Error::Validation(format!(
            "unsupported file extension: .{ext}"
        ))),
        None => Err(Error::Validation(
            "source key has no file extension".into(),
        )),
    }
}
