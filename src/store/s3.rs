//! S3-compatible [`ObjectStore`] backed by the AWS SDK.
//!
//! Works against AWS S3, Cloudflare R2, and MinIO. Path-style addressing is
//! forced since the self-hosted stores require it.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use walkdir::WalkDir;

use super::{content_type_for, ObjectStore};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(cfg: &StoreConfig) -> Self {
        let credentials =
            Credentials::new(&cfg.access_key, &cfg.secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .endpoint_url(&cfg.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: cfg.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn download(&self, key: &str, dest: &Path) -> Result<()> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(se) if se.err().is_no_such_key() => {
                    Error::Download(format!("object not found: {key}"))
                }
                _ => Error::Download(format!("get {key}: {e}")),
            })?;

        let mut body = resp.body.into_async_read();
        let mut file = tokio::fs::File::create(dest).await?;
        tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| Error::Download(format!("read {key}: {e}")))?;

        Ok(())
    }

    async fn upload_dir(&self, local_dir: &Path, key_prefix: &str) -> Result<usize> {
        let mut uploaded = 0usize;

        for entry in WalkDir::new(local_dir) {
            let entry =
                entry.map_err(|e| Error::Upload(format!("walk {local_dir:?}: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|e| Error::Upload(format!("path outside upload root: {e}")))?;
            let key = format!(
                "{}/{}",
                key_prefix.trim_end_matches('/'),
                rel.to_string_lossy().replace('\\', "/")
            );

            let body = ByteStream::from_path(entry.path())
                .await
                .map_err(|e| Error::Upload(format!("read {:?}: {e}", entry.path())))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type(content_type_for(entry.path()))
                .body(body)
                .send()
                .await
                .map_err(|e| Error::Upload(format!("put {key}: {e}")))?;

            tracing::debug!(key, "uploaded artifact");
            uploaded += 1;
        }

        Ok(uploaded)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::Upload(format!("delete {key}: {e}")))?;
        Ok(())
    }
}
