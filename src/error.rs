//! Error types for the `stillframe` crate.
//!
//! This module defines [`StillframeError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry enough context to
//! diagnose a failed run: input paths, the external tool that was invoked, its
//! exit status, and whatever it printed on stderr.

use std::{io::Error as IoError, path::PathBuf, process::ExitStatus};

use image::ImageError;
use serde_json::Error as JsonError;
use thiserror::Error;

/// The unified error type for all `stillframe` operations.
///
/// Every public method that can fail returns `Result<T, StillframeError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StillframeError {
    /// An input file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path of the input.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// An external tool (`ffmpeg`, `ffprobe`, `nvidia-smi`) could not be spawned.
    #[error("Could not run {tool} at {path}: {reason}")]
    ToolNotFound {
        /// Tool name, e.g. `"ffprobe"`.
        tool: &'static str,
        /// Path or program name that was used.
        path: PathBuf,
        /// Reason reported by the operating system.
        reason: String,
    },

    /// An external tool ran but exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        /// Tool name, e.g. `"ffmpeg"`.
        tool: &'static str,
        /// Exit status of the process.
        status: ExitStatus,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// `ffprobe` produced output that could not be understood.
    #[error("Unexpected ffprobe output for {path}: {reason}")]
    ProbeParse {
        /// Path of the probed input.
        path: PathBuf,
        /// What was missing or malformed.
        reason: String,
    },

    /// The input does not contain a video stream.
    #[error("No video stream found in {0}")]
    NoVideoStream(PathBuf),

    /// A total image count of zero was requested.
    #[error("Image count must be greater than zero")]
    InvalidImageCount,

    /// A worker count of zero was requested.
    #[error("Worker count must be greater than zero")]
    InvalidWorkerCount,

    /// The requested image format is not one ffmpeg can write for us.
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    /// An output image already exists and overwriting is disabled.
    #[error("Output already exists: {0} (enable overwrite to replace it)")]
    OutputExists(PathBuf),

    /// None of the inputs could be probed.
    #[error("No usable video inputs")]
    NoUsableInputs,

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// JSON could not be parsed.
    #[error("JSON error: {0}")]
    JsonError(#[from] JsonError),

    /// A written image could not be decoded during verification.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<rayon::ThreadPoolBuildError> for StillframeError {
    fn from(error: rayon::ThreadPoolBuildError) -> Self {
        StillframeError::ThreadPool(error.to_string())
    }
}
