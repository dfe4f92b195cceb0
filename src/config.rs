//! Application configuration.
//!
//! The top-level [`Config`] is deserialized from TOML and carries sub-configs
//! for the server, auth, object store, external tools, encoding defaults, the
//! work queue, and the notification sink. Every section defaults sensibly so
//! an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub store: StoreConfig,
    pub tools: ToolsConfig,
    pub encoding: EncodingConfig,
    pub queue: QueueConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }
        if self.auth.enabled && self.auth.api_key.is_none() {
            warnings.push("auth is enabled but no api_key is set; all requests will be rejected".into());
        }
        if self.store.bucket.is_empty() {
            warnings.push("store.bucket is empty; the serve command will refuse to start".into());
        }
        if !(2..=10).contains(&self.encoding.segment_secs) {
            warnings.push(format!(
                "encoding.segment_secs = {} is outside the usual 2-10s range",
                self.encoding.segment_secs
            ));
        }
        warnings
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Authentication and rate-limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub rate_limit_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            rate_limit_per_minute: 300,
        }
    }
}

/// Object store (S3/R2-compatible) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Endpoint URL, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint: String,
    /// Region; R2 accepts "auto".
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: "auto".into(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
        }
    }
}

/// Paths to external tools. `None` means look them up on PATH.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Rate-control strategy applied to every rendition of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateControl {
    /// Average-bitrate target with a max-rate ceiling.
    Bitrate,
    /// CRF-based quality target constrained by the same ceiling.
    ConstrainedQuality,
}

/// Encoding defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Target HLS segment duration in seconds.
    pub segment_secs: u32,
    /// x264 preset.
    pub preset: String,
    pub rate_control: RateControl,
    /// CRF used in constrained-quality mode when a profile has none.
    pub default_crf: u8,
    /// Rendition names selected from the built-in profile table, ordered
    /// highest to lowest. The last entry is the fallback tier.
    pub ladder: Vec<String>,
    /// Sources shorter than this are trimmed to a reduced ladder.
    pub short_source_secs: f64,
    /// Upper bound on a single ffprobe invocation.
    pub probe_timeout_secs: u64,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            segment_secs: 6,
            preset: "veryfast".into(),
            rate_control: RateControl::Bitrate,
            default_crf: 23,
            ladder: ["1440p", "1080p", "720p", "480p", "360p", "240p"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            short_source_secs: 15.0,
            probe_timeout_secs: 30,
        }
    }
}

/// Work queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Concurrent encode slots; 0 means auto-detect from CPU cores.
    pub max_concurrent_tasks: usize,
    /// Pending submissions buffered per slot before submissions are refused.
    pub queue_depth_per_slot: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 0,
            queue_depth_per_slot: 10,
        }
    }
}

impl QueueConfig {
    /// Resolve the configured slot count, auto-detecting when 0.
    pub fn slots(&self) -> usize {
        if self.max_concurrent_tasks > 0 {
            self.max_concurrent_tasks
        } else {
            num_cpus::get()
        }
    }
}

/// Completion notification sink. Disabled when no base URL is configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub base_url: Option<String>,
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Load config from default locations or return the default config.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./streamforge.toml",
        "~/.config/streamforge/config.toml",
        "/etc/streamforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}
