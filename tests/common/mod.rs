//! Shared fixtures for integration tests.
//!
//! Test videos are generated on the fly with ffmpeg's `lavfi` test source, so
//! tests that need real media are skipped when ffmpeg is not installed.

#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use stillframe::FfmpegTools;

/// Frame rate of every generated clip.
pub const FIXTURE_FPS: u32 = 25;

/// Resolve ffmpeg, or `None` (with a note on stderr) when it is unavailable.
pub fn tools_or_skip() -> Option<FfmpegTools> {
    let tools = FfmpegTools::locate();
    match tools.verify() {
        Ok(_) => Some(tools),
        Err(error) => {
            eprintln!("Skipping: {error}");
            None
        }
    }
}

/// Write a 160×120 MPEG-4 clip with exactly `frames` frames.
pub fn generate_video(tools: &FfmpegTools, directory: &Path, name: &str, frames: u32) -> PathBuf {
    let path = directory.join(name);
    let source = format!("testsrc=size=160x120:rate={FIXTURE_FPS}");
    let status = Command::new(&tools.ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg(&source)
        .args(["-frames:v", &frames.to_string(), "-c:v", "mpeg4", "-q:v", "5"])
        .arg(&path)
        .status()
        .expect("Failed to run ffmpeg");
    assert!(status.success(), "ffmpeg could not generate {name}");
    path
}

/// Sorted file names in `directory`.
pub fn file_names(directory: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(directory)
        .expect("Failed to read output directory")
        .map(|entry| {
            entry
                .expect("Failed to read directory entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
