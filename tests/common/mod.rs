//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wires a full [`AppContext`] against an
//! in-memory object store and stub prober/encoder, so pipeline and API tests
//! run without ffmpeg or a real bucket. The [`with_server`] constructor
//! starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use streamforge::config::Config;
use streamforge::encode::{EncodeOptions, Encoder};
use streamforge::error::{Error, Result};
use streamforge::ladder::QualityProfile;
use streamforge::notify::Notifier;
use streamforge::pipeline::Pipeline;
use streamforge::probe::{MediaInfo, Prober};
use streamforge::queue::{AdmissionController, Task, TaskRegistry, WorkerPool};
use streamforge::server::{create_router, AppContext};
use streamforge::store::ObjectStore;

/// In-memory object store.
#[derive(Default)]
pub struct MemStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: AtomicBool,
}

impl MemStore {
    pub fn put(&self, key: &str, data: &[u8]) {
        self.objects.lock().insert(key.to_string(), data.to_vec());
    }

    /// Make every subsequent `upload_dir` call fail.
    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemStore {
    async fn download(&self, key: &str, dest: &Path) -> Result<()> {
        let data = self
            .objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Download(format!("object not found: {key}")))?;
        tokio::fs::write(dest, data).await?;
        Ok(())
    }

    async fn upload_dir(&self, local_dir: &Path, key_prefix: &str) -> Result<usize> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Error::Upload("simulated store outage".into()));
        }
        let mut uploaded = 0;
        for entry in walkdir::WalkDir::new(local_dir) {
            let entry = entry.map_err(|e| Error::Upload(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|e| Error::Upload(e.to_string()))?;
            let key = format!("{}/{}", key_prefix.trim_end_matches('/'), rel.display());
            let data = tokio::fs::read(entry.path()).await?;
            self.objects.lock().insert(key, data);
            uploaded += 1;
        }
        Ok(uploaded)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().remove(key);
        Ok(())
    }
}

/// Prober returning a canned [`MediaInfo`].
pub struct StubProber {
    pub media: MediaInfo,
    pub fail: bool,
}

impl StubProber {
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            media: MediaInfo {
                width,
                height,
                duration_secs: 600.0,
                frame_rate: 30.0,
                video_codec: Some("h264".into()),
                has_audio: true,
            },
            fail: false,
        }
    }

    pub fn failing() -> Self {
        let mut stub = Self::with_dimensions(0, 0);
        stub.fail = true;
        stub
    }
}

#[async_trait]
impl Prober for StubProber {
    async fn probe(&self, _path: &Path) -> Result<MediaInfo> {
        if self.fail {
            return Err(Error::Probe("no video stream found".into()));
        }
        Ok(self.media.clone())
    }
}

/// Encoder that writes placeholder playlist and segment files.
///
/// When a gate semaphore is set, each encode waits for one permit first, so
/// tests can hold tasks in flight and observe queue behavior.
#[derive(Default)]
pub struct StubEncoder {
    pub fail: bool,
    pub gate: Option<Arc<Semaphore>>,
}

impl StubEncoder {
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            fail: false,
            gate: Some(gate),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            gate: None,
        }
    }
}

#[async_trait]
impl Encoder for StubEncoder {
    async fn encode_rendition(
        &self,
        _input: &Path,
        output_dir: &Path,
        profile: &QualityProfile,
        _media: &MediaInfo,
        _opts: &EncodeOptions,
    ) -> Result<()> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| Error::encode(profile.name, "gate closed"))?;
            permit.forget();
        }
        if self.fail {
            return Err(Error::encode(profile.name, "exit status: 1"));
        }

        tokio::fs::write(
            output_dir.join(format!("{}.m3u8", profile.name)),
            "#EXTM3U\n",
        )
        .await?;
        tokio::fs::write(
            output_dir.join(format!("{}_000.ts", profile.name)),
            b"segment",
        )
        .await?;
        Ok(())
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] backed by an
/// in-memory object store.
pub struct TestHarness {
    pub ctx: AppContext,
    pub store: Arc<MemStore>,
    pub registry: Arc<TaskRegistry>,
}

pub struct HarnessOptions {
    pub config: Config,
    pub prober: StubProber,
    pub encoder: StubEncoder,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        let mut config = Config::default();
        config.queue.max_concurrent_tasks = 1;
        Self {
            config,
            prober: StubProber::with_dimensions(1920, 1080),
            encoder: StubEncoder::default(),
        }
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(opts: HarnessOptions) -> Self {
        let config = opts.config;
        let slots = config.queue.slots();

        let store = Arc::new(MemStore::default());
        let registry = Arc::new(TaskRegistry::new());
        let admission = Arc::new(AdmissionController::new(slots, Arc::clone(&registry)));
        let notifier = Arc::new(Notifier::new(&config.notify));

        let pipeline = Arc::new(
            Pipeline::new(
                &config,
                Arc::clone(&registry),
                Arc::clone(&store) as Arc<dyn ObjectStore>,
                Arc::new(opts.prober),
                Arc::new(opts.encoder),
                notifier,
            )
            .expect("pipeline construction failed"),
        );

        let workers = Arc::new(WorkerPool::spawn(
            slots,
            slots * config.queue.queue_depth_per_slot,
            pipeline,
            Arc::clone(&admission),
            Arc::clone(&registry),
        ));

        let ctx = AppContext {
            config: Arc::new(config),
            registry: Arc::clone(&registry),
            admission,
            workers,
        };

        Self {
            ctx,
            store,
            registry,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_options(HarnessOptions::default()).await
    }

    pub async fn with_server_options(opts: HarnessOptions) -> (Self, SocketAddr) {
        let harness = Self::with_options(opts);
        let app = create_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }
}

/// Poll the registry until the task reaches a terminal state.
pub async fn wait_for_terminal(registry: &TaskRegistry, id: uuid::Uuid) -> Task {
    for _ in 0..500 {
        if let Some(task) = registry.get(id) {
            if task.state.is_terminal() {
                return task;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("task {id} never reached a terminal state");
}
