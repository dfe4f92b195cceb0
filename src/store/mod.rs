//! Object storage abstraction.
//!
//! The pipeline only needs three operations against the bucket: fetch a
//! source object to disk, push a directory of HLS artifacts under a key
//! prefix, and delete an object. [`ObjectStore`] is the seam; [`s3::S3Store`]
//! is the production implementation.

pub mod s3;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

pub use s3::S3Store;

/// Minimal bucket operations the pipeline depends on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch `key` into the local file at `dest`.
    async fn download(&self, key: &str, dest: &Path) -> Result<()>;

    /// Upload every regular file under `local_dir` to `<key_prefix>/<relative
    /// path>`. Returns the number of objects uploaded.
    async fn upload_dir(&self, local_dir: &Path, key_prefix: &str) -> Result<usize>;

    /// Delete `key`. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Content type for an uploaded artifact, keyed on extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mp4") | Some("m4s") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Derive the HLS output prefix for a source key: the source path with its
/// final extension dropped and `_hls` appended.
///
/// `videos/raw/movie.mp4` becomes `videos/raw/movie_hls`.
pub fn hls_prefix_for(source_key: &str) -> String {
    match source_key.rsplit_once('.') {
        // Only strip the extension when it belongs to the last path segment.
        Some((stem, ext)) if !ext.contains('/') => format!("{stem}_hls"),
        _ => format!("{source_key}_hls"),
    }
}
