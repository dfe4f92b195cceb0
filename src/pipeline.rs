//! The conversion pipeline: download, probe, encode, package, upload.
//!
//! [`Pipeline::run`] drives one task from source object to published HLS
//! package and records the outcome on the task. All scratch space lives in a
//! per-task temp directory that is removed when the run ends, success or not.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::config::Config;
use crate::encode::{self, EncodeOptions, Encoder};
use crate::error::{Error, Result};
use crate::ladder::{self, QualityProfile};
use crate::notify::Notifier;
use crate::probe::Prober;
use crate::queue::registry::{Task, TaskRegistry, TaskState};
use crate::store::{self, ObjectStore};

pub struct Pipeline {
    registry: Arc<TaskRegistry>,
    store: Arc<dyn ObjectStore>,
    prober: Arc<dyn Prober>,
    encoder: Arc<dyn Encoder>,
    notifier: Arc<Notifier>,
    ladder: Vec<&'static QualityProfile>,
    opts: EncodeOptions,
    short_source_secs: f64,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        registry: Arc<TaskRegistry>,
        store: Arc<dyn ObjectStore>,
        prober: Arc<dyn Prober>,
        encoder: Arc<dyn Encoder>,
        notifier: Arc<Notifier>,
    ) -> Result<Self> {
        Ok(Self {
            registry,
            store,
            prober,
            encoder,
            notifier,
            ladder: ladder::resolve_ladder(&config.encoding)?,
            opts: EncodeOptions::from(&config.encoding),
            short_source_secs: config.encoding.short_source_secs,
        })
    }

    /// Run one task to a terminal state and report the outcome.
    pub async fn run(&self, task_id: Uuid) {
        let Some(task) = self.registry.get(task_id) else {
            tracing::warn!(%task_id, "task vanished before processing");
            return;
        };

        let started = Instant::now();
        match self.execute(&task).await {
            Ok(result_key) => {
                let elapsed = started.elapsed().as_secs();
                tracing::info!(
                    source_key = task.source_key,
                    result_key,
                    elapsed_secs = elapsed,
                    "conversion completed"
                );
                self.registry.update(task_id, |t| {
                    t.state = TaskState::Completed;
                    t.message = "Video conversion completed".into();
                    t.result_key = Some(result_key);
                });

                // The source object is redundant once the package is live.
                // Deleting it is best-effort.
                if let Err(e) = self.store.delete(&task.source_key).await {
                    tracing::warn!(
                        source_key = task.source_key,
                        "failed to delete source object: {}",
                        e
                    );
                }

                self.notifier
                    .notify_conversion(&record_id(&task.source_key), true, elapsed)
                    .await;
            }
            Err(e) => {
                tracing::error!(source_key = task.source_key, stage = e.stage(), "{}", e);
                self.registry.update(task_id, |t| {
                    t.state = TaskState::Failed;
                    t.message = e.task_message();
                });

                self.notifier
                    .notify_conversion(&record_id(&task.source_key), false, 0)
                    .await;
            }
        }
    }

    async fn execute(&self, task: &Task) -> Result<String> {
        let workspace = tempfile::tempdir()?;

        let input = workspace.path().join(source_filename(&task.source_key));
        self.set_message(task.id, "Downloading source");
        self.store.download(&task.source_key, &input).await?;

        self.set_message(task.id, "Probing source");
        let media = self.prober.probe(&input).await?;
        tracing::debug!(
            width = media.width,
            height = media.height,
            duration_secs = media.duration_secs,
            "probed source"
        );

        let renditions =
            ladder::select_renditions(&self.ladder, &media, self.short_source_secs);

        let out_dir = workspace.path().join("hls");
        tokio::fs::create_dir_all(&out_dir).await?;

        for profile in &renditions {
            self.set_message(task.id, &format!("Encoding {}", profile.name));
            self.encoder
                .encode_rendition(&input, &out_dir, profile, &media, &self.opts)
                .await?;
        }

        encode::write_master_manifest(&out_dir, &renditions).await?;

        let prefix = store::hls_prefix_for(&task.source_key);
        self.set_message(task.id, "Uploading package");
        let uploaded = self.store.upload_dir(&out_dir, &prefix).await?;
        if uploaded == 0 {
            return Err(Error::Upload("no artifacts were produced".into()));
        }

        Ok(format!("{prefix}/master.m3u8"))
    }

    fn set_message(&self, task_id: Uuid, message: &str) {
        self.registry.update(task_id, |t| t.message = message.into());
    }
}

/// Local filename for the downloaded source, preserving the extension so
/// ffmpeg's container detection has something to go on.
fn source_filename(source_key: &str) -> String {
    match Path::new(source_key).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("source.{ext}"),
        None => "source".to_string(),
    }
}

/// External record id for notifications: the source key's basename without
/// its extension.
fn record_id(source_key: &str) -> String {
    Path::new(source_key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_key)
        .to_string()
}
