//! Input validation.
//!
//! Provides [`validate_input`] which probes a video and returns a
//! [`ValidationReport`] describing its structure and anything that may make
//! sampling unreliable.
//!
//! # Example
//!
//! ```no_run
//! use stillframe::{FfmpegTools, MediaProbe, validation::validate_input};
//!
//! let probe = MediaProbe::new(FfmpegTools::locate());
//! let report = validate_input(&probe, "input.mp4");
//! if report.is_valid() {
//!     println!("File is valid");
//! } else {
//!     for error in &report.errors {
//!         println!("Error: {error}");
//!     }
//! }
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    time::Duration,
};

use crate::{
    metadata::{FrameCountSource, MediaMetadata},
    probe::MediaProbe,
};

/// Above this rate a frame rate is treated as suspicious.
const MAX_PLAUSIBLE_FPS: f64 = 240.0;

/// Summary of input validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Non-fatal issues that may affect which frames are picked.
    pub warnings: Vec<String>,
    /// Fatal issues that will prevent extraction.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns `true` if no errors were found. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of entries (info + warnings + errors).
    pub fn issue_count(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for item in &self.errors {
            writeln!(f, "[ERROR] {item}")?;
        }
        if self.issue_count() == 0 {
            writeln!(f, "No issues found.")?;
        }
        Ok(())
    }
}

/// Probe `path` and validate the result.
///
/// A probe failure becomes an error entry rather than an `Err`, so a batch of
/// inputs can be validated in one pass.
pub fn validate_input<P: AsRef<Path>>(probe: &MediaProbe, path: P) -> ValidationReport {
    match probe.probe(path.as_ref()) {
        Ok(metadata) => validate_metadata(&metadata),
        Err(error) => ValidationReport {
            errors: vec![error.to_string()],
            ..ValidationReport::default()
        },
    }
}

/// Run validation checks on probed metadata.
pub fn validate_metadata(metadata: &MediaMetadata) -> ValidationReport {
    let mut report = ValidationReport::default();

    report.info.push(format!("Container: {}", metadata.format));

    if metadata.duration == Duration::ZERO {
        report
            .warnings
            .push("Media duration is zero; frame counts cannot be estimated".to_string());
    }

    let Some(video) = &metadata.video else {
        report.errors.push("No video stream found".to_string());
        return report;
    };

    if video.width == 0 || video.height == 0 {
        report.errors.push(format!(
            "Invalid video dimensions: {}×{}",
            video.width, video.height,
        ));
    }

    if video.frame_count == 0 {
        report
            .errors
            .push("Video has no frames to sample".to_string());
    }

    if video.frames_per_second <= 0.0 {
        report.warnings.push(
            "Video frame rate is unknown; the frame count assumes 30 fps".to_string(),
        );
    } else if video.frames_per_second > MAX_PLAUSIBLE_FPS {
        report.warnings.push(format!(
            "Unusually high frame rate ({:.1} fps)",
            video.frames_per_second,
        ));
    }

    if video.frame_count_source == FrameCountSource::Estimated && video.frame_count > 0 {
        report.warnings.push(
            "Frame count is estimated from the duration; the last planned frames may not exist \
             (use exact counting to be sure)"
                .to_string(),
        );
    }

    report.info.push(format!(
        "Video: {} {}×{} @ {:.2} fps, {} frames ({})",
        video.codec,
        video.width,
        video.height,
        video.frames_per_second,
        video.frame_count,
        video.frame_count_source,
    ));

    report
}
