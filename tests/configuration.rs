//! ExtractOptions, ImageFormat, and OutputNaming tests.

use std::{path::Path, sync::Arc};

use stillframe::{
    ExtractOptions, ExtractionCommand, FfmpegLogLevel, HardwareAccelerationMode, ImageFormat,
    OutputNaming, PlannedInput, ProgressCallback, ProgressInfo, StillframeError,
};

fn planned() -> PlannedInput {
    PlannedInput {
        path: "clip.mp4".into(),
        frame_count: 100,
        indices: vec![0, 50],
        first_number: 3,
        stem: "clip".to_string(),
    }
}

fn args(options: &ExtractOptions) -> Vec<String> {
    ExtractionCommand::new(&planned(), Path::new("out"), options)
        .args(None)
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

// ── ExtractOptions builder ───────────────────────────────────────

#[test]
fn options_defaults() {
    let options = ExtractOptions::new();
    let debug = format!("{options:?}");
    assert!(debug.contains("ExtractOptions"));
    assert!(debug.contains("has_cancellation: false"));
    assert!(debug.contains("batch_size: 1"));
    assert!(debug.contains("ensure_each_input: true"));
    assert!(debug.contains("overwrite: false"));
    assert_eq!(options.image_format(), ImageFormat::Png);
    assert!(options.workers() >= 1);
}

#[test]
fn options_with_batch_size_clamps_zero() {
    let options = ExtractOptions::new().with_batch_size(0);
    assert!(format!("{options:?}").contains("batch_size: 1"));
}

#[test]
fn options_with_workers_clamps_zero() {
    assert_eq!(ExtractOptions::new().with_workers(0).workers(), 1);
    assert_eq!(ExtractOptions::new().with_workers(3).workers(), 3);
}

#[test]
fn options_with_progress_is_accepted() {
    struct Noop;
    impl ProgressCallback for Noop {
        fn on_progress(&self, _info: &ProgressInfo) {}
    }

    let options = ExtractOptions::new().with_progress(Arc::new(Noop));
    let _ = format!("{options:?}");
}

#[test]
fn options_flow_into_the_command_line() {
    let options = ExtractOptions::new()
        .with_image_format(ImageFormat::WebP)
        .with_quality(80)
        .with_log_level(FfmpegLogLevel::Warning)
        .with_overwrite(true);
    let args = args(&options);

    let level = args.iter().position(|a| a == "-loglevel").unwrap();
    assert_eq!(args[level + 1], "warning");
    assert!(args.contains(&"-y".to_string()));

    let quality = args.iter().position(|a| a == "-quality").unwrap();
    assert_eq!(args[quality + 1], "80");
    assert!(args.last().unwrap().ends_with("%07d.webp"));
}

#[test]
fn software_mode_adds_no_hwaccel() {
    let options =
        ExtractOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Software);
    assert!(!args(&options).contains(&"-hwaccel".to_string()));
}

#[test]
fn auto_mode_adds_hwaccel_auto() {
    let args = args(&ExtractOptions::new().with_hardware_acceleration(HardwareAccelerationMode::Auto));
    let position = args.iter().position(|a| a == "-hwaccel").unwrap();
    assert_eq!(args[position + 1], "auto");
}

#[test]
fn quality_is_clamped() {
    let args = args(
        &ExtractOptions::new()
            .with_image_format(ImageFormat::Jpeg)
            .with_quality(250),
    );
    let position = args.iter().position(|a| a == "-q:v").unwrap();
    assert_eq!(args[position + 1], "2");
}

// ── ImageFormat ──────────────────────────────────────────────────

#[test]
fn image_format_extensions() {
    assert_eq!(ImageFormat::Png.extension(), "png");
    assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    assert_eq!(ImageFormat::Tiff.to_string(), "tiff");
}

#[test]
fn image_format_parsing() {
    assert_eq!("JPG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
    assert_eq!("webp".parse::<ImageFormat>().unwrap(), ImageFormat::WebP);

    let error = "mkv".parse::<ImageFormat>().unwrap_err();
    assert!(matches!(error, StillframeError::UnsupportedImageFormat(ref ext) if ext == "mkv"));
}

// ── OutputNaming ─────────────────────────────────────────────────

#[test]
fn stem_naming_uses_the_input_stem() {
    let options = ExtractOptions::new().with_naming(OutputNaming::VideoStem);
    let command = ExtractionCommand::new(&planned(), Path::new("out"), &options);
    assert_eq!(
        command.output_paths(),
        vec![
            Path::new("out").join("clip_0000001.png"),
            Path::new("out").join("clip_0000002.png"),
        ]
    );
}

#[test]
fn naming_default_is_sequential() {
    assert_eq!(OutputNaming::default(), OutputNaming::Sequential);
    let command = ExtractionCommand::new(&planned(), Path::new("out"), &ExtractOptions::new());
    assert_eq!(command.output_paths()[0], Path::new("out").join("0000003.png"));
}
