//! HLS rendition encoding with ffmpeg.
//!
//! Each rendition is one ffmpeg invocation producing a media playlist
//! (`<name>.m3u8`) plus numbered MPEG-TS segments. The [`Encoder`] trait is
//! the seam tests use to substitute a stub. [`write_master_manifest`] emits
//! the top-level playlist referencing every produced rendition.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::{EncodingConfig, RateControl};
use crate::error::{Error, Result};
use crate::ladder::QualityProfile;
use crate::probe::MediaInfo;

/// Per-run encode settings derived from [`EncodingConfig`].
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub segment_secs: u32,
    pub preset: String,
    pub rate_control: RateControl,
    pub crf: u8,
}

impl From<&EncodingConfig> for EncodeOptions {
    fn from(cfg: &EncodingConfig) -> Self {
        Self {
            segment_secs: cfg.segment_secs,
            preset: cfg.preset.clone(),
            rate_control: cfg.rate_control,
            crf: cfg.default_crf,
        }
    }
}

/// Produces one HLS rendition from a source file.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode_rendition(
        &self,
        input: &Path,
        output_dir: &Path,
        profile: &QualityProfile,
        media: &MediaInfo,
        opts: &EncodeOptions,
    ) -> Result<()>;
}

/// An encoder backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode_rendition(
        &self,
        input: &Path,
        output_dir: &Path,
        profile: &QualityProfile,
        media: &MediaInfo,
        opts: &EncodeOptions,
    ) -> Result<()> {
        let args = build_rendition_args(input, output_dir, profile, media, opts);

        tracing::debug!(
            rendition = profile.name,
            "running ffmpeg {}",
            args.join(" ")
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::encode(profile.name, format!("failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(Error::encode(
                profile.name,
                format!("ffmpeg exited with {}: {tail}", output.status),
            ));
        }

        Ok(())
    }
}

/// Assemble the full ffmpeg argument list for one rendition.
///
/// Scaling never upscales and pads to the exact profile dimensions so the
/// advertised RESOLUTION is always truthful. Keyframes are pinned to segment
/// boundaries (`-g`/`-keyint_min` = segment length in frames, scene-cut
/// detection off) so every segment starts with an IDR frame.
pub fn build_rendition_args(
    input: &Path,
    output_dir: &Path,
    profile: &QualityProfile,
    media: &MediaInfo,
    opts: &EncodeOptions,
) -> Vec<String> {
    let (w, h) = (profile.width, profile.height);
    let vf = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2"
    );
    let gop = (f64::from(opts.segment_secs) * media.frame_rate).round().max(1.0) as u32;

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-vf".into(),
        vf,
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        opts.preset.clone(),
    ];

    match opts.rate_control {
        RateControl::Bitrate => {
            args.push("-b:v".into());
            args.push(format!("{}k", profile.video_kbps));
        }
        RateControl::ConstrainedQuality => {
            args.push("-crf".into());
            args.push(opts.crf.to_string());
        }
    }
    args.push("-maxrate".into());
    args.push(format!("{}k", profile.maxrate_kbps()));
    args.push("-bufsize".into());
    args.push(format!("{}k", profile.bufsize_kbps()));

    args.push("-g".into());
    args.push(gop.to_string());
    args.push("-keyint_min".into());
    args.push(gop.to_string());
    args.push("-sc_threshold".into());
    args.push("0".into());

    if media.has_audio {
        args.push("-c:a".into());
        args.push("aac".into());
        args.push("-b:a".into());
        args.push(format!("{}k", profile.audio_kbps));
    } else {
        args.push("-an".into());
    }

    // Explicit mapping keeps ambiguous containers (multiple video or audio
    // streams) from derailing the output; the `?` tolerates missing audio.
    args.push("-map".into());
    args.push("0:v:0".into());
    if media.has_audio {
        args.push("-map".into());
        args.push("0:a:0?".into());
    }

    let segment_pattern = output_dir.join(format!("{}_%03d.ts", profile.name));
    let playlist = output_dir.join(format!("{}.m3u8", profile.name));

    args.push("-f".into());
    args.push("hls".into());
    args.push("-hls_time".into());
    args.push(opts.segment_secs.to_string());
    args.push("-hls_list_size".into());
    args.push("0".into());
    args.push("-hls_segment_filename".into());
    args.push(segment_pattern.to_string_lossy().into_owned());
    args.push(playlist.to_string_lossy().into_owned());

    args
}

/// Render the master playlist for the given renditions.
pub fn master_manifest(renditions: &[&QualityProfile]) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for p in renditions {
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n{}.m3u8\n",
            p.bandwidth_bps(),
            p.width,
            p.height,
            p.name
        ));
    }
    out
}

/// Write `master.m3u8` into the output directory.
pub async fn write_master_manifest(
    output_dir: &Path,
    renditions: &[&QualityProfile],
) -> Result<PathBuf> {
    let path = output_dir.join("master.m3u8");
    let mut file = tokio::fs::File::create(&path).await?;
    file.write_all(master_manifest(renditions).as_bytes())
        .await?;
    file.flush().await?;
    Ok(path)
}
