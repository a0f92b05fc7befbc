//! # stillframe
//!
//! Sample a fixed number of still frames from a set of videos.
//!
//! `stillframe` splits an image budget across one or more video files in
//! proportion to their frame counts, picks uniformly spaced frames from each,
//! and has FFmpeg write them as numbered images into a folder. Decoding and
//! encoding are done by the external `ffmpeg` and `ffprobe` programs, so any
//! FFmpeg build on the machine works, including ones with GPU decoders.
//!
//! ## Quick Start
//!
//! ### Extract 500 Images from Two Videos
//!
//! ```no_run
//! use stillframe::{ExtractOptions, FfmpegTools, FrameExtractor};
//!
//! let extractor = FrameExtractor::new(FfmpegTools::locate(), ExtractOptions::new());
//! let report = extractor.extract(&["a.mp4", "b.mkv"], "frames", 500).unwrap();
//! println!("{} images written", report.written());
//! ```
//!
//! ### Preview the Plan
//!
//! ```no_run
//! use stillframe::{ExtractOptions, FfmpegTools, FrameExtractor};
//!
//! let extractor = FrameExtractor::new(FfmpegTools::locate(), ExtractOptions::new());
//! let (plan, skipped) = extractor.plan(&["a.mp4", "missing.mp4"], 100).unwrap();
//! for input in &plan.inputs {
//!     println!("{}: {} of {} frames", input.path.display(), input.image_count(), input.frame_count);
//! }
//! for input in &skipped {
//!     println!("skipped {}: {}", input.path.display(), input.reason);
//! }
//! ```
//!
//! ### GPU Decoding
//!
//! ```no_run
//! use stillframe::{
//!     ExtractOptions, FfmpegTools, FrameExtractor, HardwareAccelerationMode, HardwareDeviceType,
//!     ImageFormat,
//! };
//!
//! let options = ExtractOptions::new()
//!     .with_hardware_acceleration(HardwareAccelerationMode::Specific(HardwareDeviceType::Cuda))
//!     .with_hardware_device("0")
//!     .with_image_format(ImageFormat::Jpeg)
//!     .with_quality(90);
//! let extractor = FrameExtractor::new(FfmpegTools::locate(), options);
//! extractor.extract(&["talk.mp4"], "frames", 200).unwrap();
//! ```
//!
//! ## Features
//!
//! - **Proportional budgets**: images are shared out by frame count with the
//!   largest-remainder method, never exceeding the requested total
//! - **Deterministic sampling**: the same inputs and budget always select the
//!   same frames
//! - **One decode per input**: a `select` filter keeps the planned frames in a
//!   single ffmpeg pass
//! - **Parallel inputs**: a bounded worker pool runs one ffmpeg per input
//! - **Hardware decoding**: CUDA, QSV, VAAPI, VideoToolbox, D3D11VA, DXVA2,
//!   with a software retry on failure
//! - **Progress & cancellation**: callbacks and `CancellationToken`; running
//!   ffmpeg processes are killed on cancel
//! - **Validation**: inspect inputs before extraction
//!
//! ## Requirements
//!
//! `ffmpeg` and `ffprobe` must be installed, placed under `./ffmpeg/bin/`, or
//! named through the `STILLFRAME_FFMPEG` and `STILLFRAME_FFPROBE` environment
//! variables.

pub mod command;
pub mod configuration;
pub mod error;
pub mod extractor;
pub mod ffmpeg;
pub mod hardware_acceleration;
pub mod metadata;
mod parallel;
pub mod probe;
pub mod progress;
pub mod sampling;
pub mod validation;

pub use command::ExtractionCommand;
pub use configuration::{ExtractOptions, ImageFormat, OutputNaming};
pub use error::StillframeError;
pub use extractor::{ExtractionReport, FrameExtractor, InputOutcome, SkippedInput};
pub use ffmpeg::{FfmpegLogLevel, FfmpegTools};
pub use hardware_acceleration::{
    GpuDevice, HardwareAcceleration, HardwareAccelerationMode, HardwareDeviceType,
};
pub use metadata::{FrameCountSource, MediaMetadata, VideoMetadata};
pub use probe::{FrameCountMode, MediaProbe};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use sampling::{PlannedInput, SamplingPlan};
pub use validation::ValidationReport;
