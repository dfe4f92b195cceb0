//! Bitrate-ladder policy.
//!
//! A fixed table of quality profiles maps rendition names to output
//! dimensions and bitrates. [`select_renditions`] picks the subset of a
//! configured ladder that a given source can feed without upscaling.

use serde::{Deserialize, Serialize};

use crate::config::EncodingConfig;
use crate::error::{Error, Result};
use crate::probe::MediaInfo;

/// A single rung of the bitrate ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    /// Target video bitrate in kbit/s.
    pub video_kbps: u32,
    /// Audio bitrate in kbit/s.
    pub audio_kbps: u32,
}

impl QualityProfile {
    /// Max-rate ceiling: 110% of the video bitrate target.
    pub fn maxrate_kbps(&self) -> u32 {
        self.video_kbps + self.video_kbps / 10
    }

    /// VBV buffer size: twice the video bitrate target.
    pub fn bufsize_kbps(&self) -> u32 {
        self.video_kbps * 2
    }

    /// Peak bandwidth advertised in the master manifest, in bit/s.
    pub fn bandwidth_bps(&self) -> u64 {
        u64::from(self.video_kbps + self.audio_kbps) * 1000
    }
}

/// All profiles this service knows how to produce, highest first.
pub const PROFILES: &[QualityProfile] = &[
    QualityProfile { name: "1440p", width: 2560, height: 1440, video_kbps: 9000, audio_kbps: 192 },
    QualityProfile { name: "1080p", width: 1920, height: 1080, video_kbps: 6000, audio_kbps: 192 },
    QualityProfile { name: "720p", width: 1280, height: 720, video_kbps: 3500, audio_kbps: 192 },
    QualityProfile { name: "480p", width: 854, height: 480, video_kbps: 1800, audio_kbps: 128 },
    QualityProfile { name: "360p", width: 640, height: 360, video_kbps: 800, audio_kbps: 96 },
    QualityProfile { name: "240p", width: 426, height: 240, video_kbps: 500, audio_kbps: 64 },
    QualityProfile { name: "144p", width: 256, height: 144, video_kbps: 300, audio_kbps: 48 },
];

/// Look up a profile by name.
pub fn profile(name: &str) -> Option<&'static QualityProfile> {
    PROFILES.iter().find(|p| p.name == name)
}

/// Resolve the configured ladder names to profiles, preserving order.
///
/// Unknown names are an error so that a config typo fails loudly at startup
/// rather than silently shrinking every output.
pub fn resolve_ladder(encoding: &EncodingConfig) -> Result<Vec<&'static QualityProfile>> {
    let mut ladder = Vec::with_capacity(encoding.ladder.len());
    for name in &encoding.ladder {
        let p = profile(name)
            .ok_or_else(|| Error::Internal(format!("unknown ladder entry: {name:?}")))?;
        ladder.push(p);
    }
    if ladder.is_empty() {
        return Err(Error::Internal("encoding.ladder is empty".into()));
    }
    Ok(ladder)
}

/// Pick the renditions to produce for a probed source.
///
/// Every ladder entry whose height does not exceed the source height is
/// included, so the output never upscales. A source below the lowest rung
/// still gets that lowest rung as a fallback. Very short sources are trimmed
/// to at most two renditions (best qualifying plus the fallback) since a full
/// ladder buys nothing for clips.
pub fn select_renditions<'a>(
    ladder: &[&'a QualityProfile],
    media: &MediaInfo,
    short_source_secs: f64,
) -> Vec<&'a QualityProfile> {
    let mut selected: Vec<&QualityProfile> = ladder
        .iter()
        .copied()
        .filter(|p| p.height <= media.height)
        .collect();

    // `ladder` is non-empty by construction (resolve_ladder rejects empty).
    let fallback = ladder[ladder.len() - 1];
    if selected.is_empty() {
        selected.push(fallback);
    }

    // A 0.0 duration means the probe could not determine one; only trim
    // when the source is known to be short.
    let known_short = media.duration_secs > 0.0 && media.duration_secs < short_source_secs;
    if known_short && selected.len() > 2 {
        let best = selected[0];
        selected = if best.name == fallback.name {
            vec![best]
        } else {
            vec![best, fallback]
        };
    }

    selected
}
