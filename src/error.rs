//! Unified error type for streamforge.
//!
//! Every pipeline stage sets its own tagged variant at the point where the
//! failure is detected, so task status messages are derived from the variant
//! rather than re-inferred from message text. API handlers map variants to
//! HTTP status codes via [`Error::http_status`].

use std::fmt;

/// Maximum length of the operator-facing message stored on a failed task.
/// Full detail goes to the log; the task record carries a truncated summary.
const TASK_MESSAGE_LIMIT: usize = 300;

/// Unified error type covering all failure modes in streamforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data failed validation and never entered the queue.
    #[error("validation error: {0}")]
    Validation(String),

    /// Fetching the source blob from the object store failed.
    #[error("download failed: {0}")]
    Download(String),

    /// The source could not be probed, or its dimensions are unobtainable.
    #[error("probe failed: {0}")]
    Probe(String),

    /// An encode subprocess failed for one rendition.
    #[error("encode failed [{profile}]: {message}")]
    Encode {
        /// Name of the rendition profile that was being encoded.
        profile: String,
        /// Exit status and captured subprocess output.
        message: String,
    },

    /// Publishing the HLS package back to the object store failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "task").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The caller is not authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The submission buffer is full; the caller should retry later.
    #[error("queue is full")]
    QueueFull,

    /// An I/O operation failed.
    #[error("io error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::NotFound { .. } => 404,
            Error::Probe(_) => 422,
            Error::Download(_) | Error::Upload(_) => 502,
            Error::QueueFull => 503,
            Error::Encode { .. } | Error::Io { .. } | Error::Internal(_) => 500,
        }
    }

    /// The pipeline stage this error is tagged with.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Download(_) => "download",
            Error::Probe(_) => "invalid input",
            Error::Encode { .. } => "conversion",
            Error::Upload(_) => "upload",
            _ => "internal",
        }
    }

    /// Operator-facing message stored on a failed task: stage-tagged and
    /// truncated, never a raw backtrace.
    pub fn task_message(&self) -> String {
        let summary = match self {
            Error::Download(m) => format!("Download failed: {m}"),
            Error::Probe(m) => format!("Invalid file: {m}"),
            Error::Encode { profile, message } => {
                format!("Video conversion failed ({profile}): {message}")
            }
            Error::Upload(m) => format!("Upload failed: {m}"),
            other => format!("Processing failed: {other}"),
        };
        truncate(&summary, TASK_MESSAGE_LIMIT)
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Encode`].
    pub fn encode(profile: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Encode {
            profile: profile.into(),
            message: message.into(),
        }
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tags() {
        assert_eq!(Error::Download("timeout".into()).stage(), "download");
        assert_eq!(Error::Probe("no dimensions".into()).stage(), "invalid input");
        assert_eq!(Error::encode("720p", "exit code 1").stage(), "conversion");
        assert_eq!(Error::Upload("socket closed".into()).stage(), "upload");
        assert_eq!(Error::Validation("bad key".into()).stage(), "validation");
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(Error::Validation("x".into()).http_status(), 400);
        assert_eq!(Error::Unauthorized("x".into()).http_status(), 401);
        assert_eq!(Error::not_found("task", "abc").http_status(), 404);
        assert_eq!(Error::Probe("x".into()).http_status(), 422);
        assert_eq!(Error::Download("x".into()).http_status(), 502);
        assert_eq!(Error::QueueFull.http_status(), 503);
        assert_eq!(Error::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn task_message_is_stage_tagged() {
        let msg = Error::Download("object missing".into()).task_message();
        assert_eq!(msg, "Download failed: object missing");

        let msg = Error::encode("480p", "exit code 1").task_message();
        assert!(msg.starts_with("Video conversion failed (480p)"));
    }

    #[test]
    fn task_message_truncated() {
        let long = "x".repeat(1000);
        let msg = Error::Upload(long).task_message();
        assert!(msg.len() <= TASK_MESSAGE_LIMIT + '…'.len_utf8());
        assert!(msg.ends_with('…'));
    }

    #[test]
    fn not_found_display() {
        let err = Error::not_found("task", "abc-123");
        assert_eq!(err.to_string(), "task not found: abc-123");
    }
}
