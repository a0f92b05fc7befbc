//! Extraction configuration.
//!
//! [`ExtractOptions`] is a builder that threads output settings, hardware
//! acceleration, worker count, progress callbacks, and cancellation through
//! [`FrameExtractor`](crate::FrameExtractor) without polluting every function
//! signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stillframe::{CancellationToken, ExtractOptions, ImageFormat, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_image_format(ImageFormat::Jpeg)
//!     .with_quality(90)
//!     .with_workers(4)
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone());
//! ```

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    str::FromStr,
    sync::Arc,
    thread,
};

use crate::{
    error::StillframeError,
    ffmpeg::FfmpegLogLevel,
    hardware_acceleration::{HardwareAcceleration, HardwareAccelerationMode},
    probe::FrameCountMode,
    progress::{CancellationToken, NoOpProgress, ProgressCallback},
};

/// Image file format written by ffmpeg.
///
/// ffmpeg picks the encoder from the output file extension, so the format
/// only decides the extension and the quality flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// Lossless PNG. This is the default.
    #[default]
    Png,
    /// JPEG, quality controlled by [`ExtractOptions::with_quality`].
    Jpeg,
    /// Uncompressed BMP.
    Bmp,
    /// TIFF.
    Tiff,
    /// WebP, quality controlled by [`ExtractOptions::with_quality`].
    WebP,
}

impl ImageFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::WebP => "webp",
        }
    }

    /// Resolve a format from a file extension such as `"jpeg"` or `".PNG"`.
    pub fn from_extension(extension: &str) -> Result<Self, StillframeError> {
        let clean = extension.trim().trim_start_matches('.');
        match image::ImageFormat::from_extension(clean) {
            Some(image::ImageFormat::Png) => Ok(ImageFormat::Png),
            Some(image::ImageFormat::Jpeg) => Ok(ImageFormat::Jpeg),
            Some(image::ImageFormat::Bmp) => Ok(ImageFormat::Bmp),
            Some(image::ImageFormat::Tiff) => Ok(ImageFormat::Tiff),
            Some(image::ImageFormat::WebP) => Ok(ImageFormat::WebP),
            _ => Err(StillframeError::UnsupportedImageFormat(clean.to_string())),
        }
    }

    /// Quality arguments for ffmpeg, given a 1-100 quality.
    ///
    /// JPEG uses ffmpeg's `-q:v` scale where 2 is best and 31 is worst.
    pub(crate) fn quality_args(self, quality: u8) -> Vec<String> {
        let quality = u32::from(quality.clamp(1, 100));
        match self {
            ImageFormat::Jpeg => {
                let scale = 31 - (quality - 1) * 29 / 99;
                vec!["-q:v".to_string(), scale.to_string()]
            }
            ImageFormat::WebP => vec!["-quality".to_string(), quality.to_string()],
            ImageFormat::Png | ImageFormat::Bmp | ImageFormat::Tiff => Vec::new(),
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = StillframeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ImageFormat::from_extension(value)
    }
}

/// How output images are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputNaming {
    /// `0000001.png`, `0000002.png`, … numbered across all inputs.
    #[default]
    Sequential,
    /// `<video stem>_0000001.png`, numbered per input.
    VideoStem,
}

impl FromStr for OutputNaming {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(OutputNaming::Sequential),
            "stem" | "video-stem" | "video" => Ok(OutputNaming::VideoStem),
            other => Err(format!("unsupported naming scheme: {other}")),
        }
    }
}

/// Default worker count: one per available CPU.
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |count| count.get())
}

/// Configuration for extraction runs.
///
/// All fields have sensible defaults; a default-constructed value writes PNG
/// files with sequential names using software decoding on every CPU.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) image_format: ImageFormat,
    pub(crate) quality: u8,
    pub(crate) naming: OutputNaming,
    pub(crate) hardware: HardwareAcceleration,
    pub(crate) log_level: FfmpegLogLevel,
    pub(crate) workers: usize,
    pub(crate) frame_counting: FrameCountMode,
    pub(crate) ensure_each_input: bool,
    pub(crate) overwrite: bool,
    pub(crate) verify_outputs: bool,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N images).
    pub(crate) batch_size: u64,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("image_format", &self.image_format)
            .field("quality", &self.quality)
            .field("naming", &self.naming)
            .field("hardware", &self.hardware)
            .field("log_level", &self.log_level)
            .field("workers", &self.workers)
            .field("frame_counting", &self.frame_counting)
            .field("ensure_each_input", &self.ensure_each_input)
            .field("overwrite", &self.overwrite)
            .field("verify_outputs", &self.verify_outputs)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            image_format: ImageFormat::Png,
            quality: 95,
            naming: OutputNaming::Sequential,
            hardware: HardwareAcceleration::software(),
            log_level: FfmpegLogLevel::Error,
            workers: default_workers(),
            frame_counting: FrameCountMode::Fast,
            ensure_each_input: true,
            overwrite: false,
            verify_outputs: false,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set the output image format.
    #[must_use]
    pub fn with_image_format(mut self, format: ImageFormat) -> Self {
        self.image_format = format;
        self
    }

    /// Set JPEG/WebP quality (1-100, clamped).
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Set the output naming scheme.
    #[must_use]
    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Set the hardware acceleration mode.
    #[must_use]
    pub fn with_hardware_acceleration(mut self, mode: HardwareAccelerationMode) -> Self {
        self.hardware.mode = mode;
        self
    }

    /// Select a hardware device (GPU index or render node).
    #[must_use]
    pub fn with_hardware_device<S: Into<String>>(mut self, device: S) -> Self {
        self.hardware.device = Some(device.into());
        self
    }

    /// Set ffmpeg's `-loglevel`.
    #[must_use]
    pub fn with_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set how many inputs are processed at once. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Choose how frame counts are obtained when probing.
    #[must_use]
    pub fn with_frame_counting(mut self, mode: FrameCountMode) -> Self {
        self.frame_counting = mode;
        self
    }

    /// Give every non-empty input at least one image when the budget allows.
    /// Defaults to `true`.
    #[must_use]
    pub fn with_ensure_each_input(mut self, ensure: bool) -> Self {
        self.ensure_each_input = ensure;
        self
    }

    /// Allow replacing existing images. Defaults to `false`.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Decode every written image with the `image` crate after extraction.
    #[must_use]
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify_outputs = verify;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, pending inputs are not started, running
    /// ffmpeg processes are killed, and the run returns
    /// [`StillframeError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Configured worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Configured image format.
    pub fn image_format(&self) -> ImageFormat {
        self.image_format
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_quality_maps_to_qscale() {
        assert_eq!(ImageFormat::Jpeg.quality_args(100), vec!["-q:v", "2"]);
        assert_eq!(ImageFormat::Jpeg.quality_args(1), vec!["-q:v", "31"]);
        assert_eq!(ImageFormat::Jpeg.quality_args(0), vec!["-q:v", "31"]);
        assert!(ImageFormat::Png.quality_args(50).is_empty());
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ImageFormat::from_extension("jpeg").unwrap(), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension(".PNG").unwrap(), ImageFormat::Png);
        assert_eq!("tif".parse::<ImageFormat>().unwrap(), ImageFormat::Tiff);
        assert!(matches!(
            ImageFormat::from_extension("gif"),
            Err(StillframeError::UnsupportedImageFormat(_))
        ));
    }

    #[test]
    fn naming_aliases() {
        assert_eq!("stem".parse::<OutputNaming>().unwrap(), OutputNaming::VideoStem);
        assert_eq!("SEQ".parse::<OutputNaming>().unwrap(), OutputNaming::Sequential);
        assert!("random".parse::<OutputNaming>().is_err());
    }
}
