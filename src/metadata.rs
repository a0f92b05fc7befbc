//! Media metadata types.
//!
//! This module defines the structures returned by
//! [`MediaProbe::probe`](crate::MediaProbe::probe). Metadata is read once per
//! input with `ffprobe` and then drives sampling.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    time::Duration,
};

/// Where a video's frame count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCountSource {
    /// The container header (`nb_frames`). Cheap, usually exact.
    Container,
    /// Every frame was decoded and counted (`-count_frames`). Exact but slow.
    Decoded,
    /// Derived from duration and frame rate. May be off by a few frames.
    Estimated,
}

impl Display for FrameCountSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            FrameCountSource::Container => "container",
            FrameCountSource::Decoded => "decoded",
            FrameCountSource::Estimated => "estimated",
        })
    }
}

/// Complete metadata for one input.
///
/// # Example
///
/// ```no_run
/// use stillframe::{FfmpegTools, MediaProbe};
///
/// let metadata = MediaProbe::new(FfmpegTools::locate()).probe("input.mp4")?;
/// println!("Duration: {:?}", metadata.duration);
/// println!("Frames: {}", metadata.frame_count());
/// # Ok::<(), stillframe::StillframeError>(())
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct MediaMetadata {
    /// Path that was probed.
    pub path: PathBuf,
    /// Container format name as reported by ffprobe (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
    /// Total duration of the input.
    pub duration: Duration,
    /// Metadata for the first video stream.
    pub video: Option<VideoMetadata>,
}

impl MediaMetadata {
    /// Number of frames in the first video stream, or 0 without one.
    pub fn frame_count(&self) -> u64 {
        self.video.as_ref().map_or(0, |video| video.frame_count)
    }
}

/// Metadata for a video stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Total number of frames.
    pub frame_count: u64,
    /// How `frame_count` was obtained.
    pub frame_count_source: FrameCountSource,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`).
    pub codec: String,
}
