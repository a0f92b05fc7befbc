//! Media probing with `ffprobe`.
//!
//! [`MediaProbe`] runs `ffprobe -print_format json` on an input and turns the
//! result into [`MediaMetadata`]. The frame count is the number that matters
//! for sampling, so it gets special care: the container's `nb_frames` is
//! preferred, then `duration × fps`, and [`FrameCountMode::Exact`] decodes the
//! whole stream to count frames when the header cannot be trusted.

use std::{
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde_json::Value;

use crate::{
    error::StillframeError,
    ffmpeg::{FfmpegTools, run_to_completion},
    metadata::{FrameCountSource, MediaMetadata, VideoMetadata},
};

/// Frame rate assumed when a stream does not report one.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// How frame counts are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameCountMode {
    /// Use the container header, falling back to `duration × fps`.
    #[default]
    Fast,
    /// Decode the stream and count frames. Accurate, but takes roughly as long
    /// as decoding the video.
    Exact,
}

/// `ffprobe`-backed metadata reader.
///
/// # Example
///
/// ```no_run
/// use stillframe::{FfmpegTools, MediaProbe};
///
/// let probe = MediaProbe::new(FfmpegTools::locate());
/// let results = probe.probe_many(&["a.mp4", "b.mkv"]);
/// for result in &results {
///     match result {
///         Ok(meta) => println!("{}: {} frames", meta.path.display(), meta.frame_count()),
///         Err(err) => eprintln!("Error: {err}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MediaProbe {
    tools: FfmpegTools,
    mode: FrameCountMode,
}

impl MediaProbe {
    /// Create a probe using [`FrameCountMode::Fast`].
    pub fn new(tools: FfmpegTools) -> Self {
        Self {
            tools,
            mode: FrameCountMode::Fast,
        }
    }

    /// Choose how frame counts are obtained.
    #[must_use]
    pub fn with_frame_counting(mut self, mode: FrameCountMode) -> Self {
        self.mode = mode;
        self
    }

    /// Probe one input.
    ///
    /// # Errors
    ///
    /// - [`StillframeError::FileOpen`] if the path does not exist.
    /// - [`StillframeError::ToolFailed`] if ffprobe rejects the file.
    /// - [`StillframeError::ProbeParse`] if the output is not the expected JSON.
    /// - [`StillframeError::NoVideoStream`] if there is no video stream.
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> Result<MediaMetadata, StillframeError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StillframeError::FileOpen {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let mut command = Command::new(&self.tools.ffprobe);
        command.args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        if self.mode == FrameCountMode::Exact {
            command.arg("-count_frames");
        }
        command.arg(path);

        let output = run_to_completion("ffprobe", &mut command)?;
        let json: Value =
            serde_json::from_slice(&output.stdout).map_err(|error| StillframeError::ProbeParse {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;

        let metadata = parse_probe_output(path, &json)?;
        if metadata.video.is_none() {
            return Err(StillframeError::NoVideoStream(path.to_path_buf()));
        }

        log::debug!(
            "Probed {}: {} frames",
            path.display(),
            metadata.frame_count()
        );
        Ok(metadata)
    }

    /// Probe several inputs in parallel on the current rayon pool.
    ///
    /// Inputs that fail produce an `Err` entry instead of aborting the batch.
    /// Results keep the order of `paths`.
    pub fn probe_many<P: AsRef<Path> + Sync>(
        &self,
        paths: &[P],
    ) -> Vec<Result<MediaMetadata, StillframeError>> {
        paths.par_iter().map(|path| self.probe(path)).collect()
    }

    /// Sum of the frame counts of every input that probes successfully.
    ///
    /// This is the largest number of distinct images the inputs can yield.
    /// Inputs that fail to probe contribute nothing. The sum saturates at
    /// `u64::MAX` when a corrupt header reports an absurd count.
    pub fn total_frame_count<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> u64 {
        self.probe_many(paths)
            .iter()
            .filter_map(|result| result.as_ref().ok())
            .map(MediaMetadata::frame_count)
            .fold(0_u64, |total, count| total.saturating_add(count))
    }
}

/// Parse an ffprobe rational such as `"30000/1001"` or `"25"`.
///
/// Returns 0 for malformed input or a zero denominator.
pub fn parse_frame_rate(value: &str) -> f64 {
    match value.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator: f64 = numerator.trim().parse().unwrap_or(0.0);
            let denominator: f64 = denominator.trim().parse().unwrap_or(0.0);
            if denominator == 0.0 {
                0.0
            } else {
                numerator / denominator
            }
        }
        None => value.trim().parse().unwrap_or(0.0),
    }
}

/// ffprobe prints most numbers as strings; accept either.
fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => text.trim().parse().ok(),
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

pub(crate) fn parse_probe_output(
    path: &Path,
    json: &Value,
) -> Result<MediaMetadata, StillframeError> {
    let format = json.get("format").ok_or_else(|| StillframeError::ProbeParse {
        path: path.to_path_buf(),
        reason: "missing \"format\" section".to_string(),
    })?;

    let format_name = format["format_name"].as_str().unwrap_or("unknown").to_string();
    let format_duration = positive(number_field(&format["duration"]));

    let stream = json["streams"]
        .as_array()
        .and_then(|streams| {
            streams
                .iter()
                .find(|stream| stream["codec_type"].as_str() == Some("video"))
        });

    let video = stream.map(|stream| {
        let frames_per_second = [&stream["avg_frame_rate"], &stream["r_frame_rate"]]
            .into_iter()
            .filter_map(Value::as_str)
            .map(parse_frame_rate)
            .find(|rate| rate.is_finite() && *rate > 0.0)
            .unwrap_or(0.0);

        let stream_duration = positive(number_field(&stream["duration"]));
        let decoded = positive(number_field(&stream["nb_read_frames"]));
        let container = positive(number_field(&stream["nb_frames"]));

        let (frame_count, frame_count_source) = if let Some(count) = decoded {
            (count as u64, FrameCountSource::Decoded)
        } else if let Some(count) = container {
            (count as u64, FrameCountSource::Container)
        } else {
            let seconds = stream_duration.or(format_duration).unwrap_or(0.0);
            let rate = if frames_per_second > 0.0 {
                frames_per_second
            } else {
                DEFAULT_FRAME_RATE
            };
            ((seconds * rate) as u64, FrameCountSource::Estimated)
        };

        VideoMetadata {
            width: stream["width"].as_u64().unwrap_or(0) as u32,
            height: stream["height"].as_u64().unwrap_or(0) as u32,
            frames_per_second,
            frame_count,
            frame_count_source,
            codec: stream["codec_name"].as_str().unwrap_or("unknown").to_string(),
        }
    });

    let duration_seconds = format_duration
        .or_else(|| stream.and_then(|stream| positive(number_field(&stream["duration"]))))
        .unwrap_or(0.0);

    Ok(MediaMetadata {
        path: PathBuf::from(path),
        format: format_name,
        duration: Duration::try_from_secs_f64(duration_seconds).unwrap_or(Duration::MAX),
        video,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn frame_rate_rationals() {
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate("garbage"), 0.0);
    }

    #[test]
    fn container_count_is_preferred() {
        let json = json!({
            "streams": [{
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1920,
                "height": 1080,
                "avg_frame_rate": "30/1",
                "r_frame_rate": "30/1",
                "nb_frames": "301",
                "duration": "10.033333"
            }],
            "format": { "format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "10.040000" }
        });

        let metadata = parse_probe_output(Path::new("a.mp4"), &json).unwrap();
        let video = metadata.video.unwrap();
        assert_eq!(video.frame_count, 301);
        assert_eq!(video.frame_count_source, FrameCountSource::Container);
        assert_eq!((video.width, video.height), (1920, 1080));
        assert_eq!(video.codec, "h264");
        assert_eq!(metadata.duration, Duration::from_secs_f64(10.04));
    }

    #[test]
    fn decoded_count_wins_over_header() {
        let json = json!({
            "streams": [{
                "codec_type": "video",
                "avg_frame_rate": "25/1",
                "nb_frames": "250",
                "nb_read_frames": "248"
            }],
            "format": { "format_name": "matroska,webm", "duration": "10.0" }
        });

        let video = parse_probe_output(Path::new("a.mkv"), &json)
            .unwrap()
            .video
            .unwrap();
        assert_eq!(video.frame_count, 248);
        assert_eq!(video.frame_count_source, FrameCountSource::Decoded);
    }

    #[test]
    fn estimate_from_duration_and_rate() {
        // Matroska usually has no nb_frames.
        let json = json!({
            "streams": [{ "codec_type": "video", "avg_frame_rate": "24/1", "r_frame_rate": "24/1" }],
            "format": { "format_name": "matroska,webm", "duration": "2.5" }
        });

        let video = parse_probe_output(Path::new("a.mkv"), &json)
            .unwrap()
            .video
            .unwrap();
        assert_eq!(video.frame_count, 60);
        assert_eq!(video.frame_count_source, FrameCountSource::Estimated);
    }

    #[test]
    fn unknown_rate_assumes_thirty_fps() {
        let json = json!({
            "streams": [{ "codec_type": "video", "avg_frame_rate": "0/0", "r_frame_rate": "0/0" }],
            "format": { "format_name": "avi", "duration": "2" }
        });

        let video = parse_probe_output(Path::new("a.avi"), &json)
            .unwrap()
            .video
            .unwrap();
        assert_eq!(video.frame_count, 60);
        assert_eq!(video.frames_per_second, 0.0);
    }

    #[test]
    fn corrupt_header_counts_saturate() {
        // Float-to-integer casts saturate, and an overlong duration is capped.
        let json = json!({
            "streams": [{ "codec_type": "video", "avg_frame_rate": "30/1" }],
            "format": { "format_name": "matroska,webm", "duration": "1e300" }
        });

        let metadata = parse_probe_output(Path::new("a.mkv"), &json).unwrap();
        assert_eq!(metadata.frame_count(), u64::MAX);
        assert_eq!(metadata.duration, Duration::MAX);

        let json = json!({
            "streams": [{ "codec_type": "video", "nb_frames": "99999999999999999999999" }],
            "format": { "format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "1.0" }
        });
        let metadata = parse_probe_output(Path::new("b.mp4"), &json).unwrap();
        assert_eq!(metadata.frame_count(), u64::MAX);
    }

    #[test]
    fn audio_only_has_no_video() {
        let json = json!({
            "streams": [],
            "format": { "format_name": "mp3", "duration": "3.0" }
        });

        let metadata = parse_probe_output(Path::new("a.mp3"), &json).unwrap();
        assert!(metadata.video.is_none());
        assert_eq!(metadata.frame_count(), 0);
    }

    #[test]
    fn missing_format_is_a_parse_error() {
        let error = parse_probe_output(Path::new("a.mp4"), &json!({})).unwrap_err();
        assert!(matches!(error, StillframeError::ProbeParse { .. }));
    }

    #[test]
    fn missing_file_is_file_open() {
        let probe = MediaProbe::new(FfmpegTools::new("ffmpeg", "ffprobe"));
        let error = probe.probe("no/such/video.mp4").unwrap_err();
        assert!(error.to_string().contains("Failed to open media file"));
    }
}
