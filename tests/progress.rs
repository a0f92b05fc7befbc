//! Progress and cancellation integration tests.
//!
//! Tests that need real media generate it with ffmpeg and are skipped when
//! ffmpeg is unavailable.

mod common;

use std::sync::{Arc, Mutex};

use stillframe::{
    CancellationToken, ExtractOptions, FrameExtractor, OperationType, ProgressCallback,
    ProgressInfo, StillframeError,
};

use common::{generate_video, tools_or_skip};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.events.lock().unwrap().push(info.clone());
    }
}

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

#[test]
fn cancelled_extraction_returns_error() {
    let Some(tools) = tools_or_skip() else {
        return;
    };
    let directory = tempfile::tempdir().unwrap();
    let video = generate_video(&tools, directory.path(), "clip.mp4", 25);

    let token = CancellationToken::new();
    token.cancel();

    let extractor = FrameExtractor::new(tools, ExtractOptions::new().with_cancellation(token));
    let result = extractor.extract(&[&video], directory.path().join("frames"), 5);

    assert!(matches!(result, Err(StillframeError::Cancelled)));
    assert!(!directory.path().join("frames").exists());
}

// ── ProgressCallback ───────────────────────────────────────────────

#[test]
fn progress_covers_every_stage() {
    let Some(tools) = tools_or_skip() else {
        return;
    };
    let directory = tempfile::tempdir().unwrap();
    let first = generate_video(&tools, directory.path(), "first.mp4", 25);
    let second = generate_video(&tools, directory.path(), "second.mp4", 50);

    let recorder = Arc::new(Recorder::default());
    let options = ExtractOptions::new()
        .with_progress(recorder.clone())
        .with_verification(true);
    let extractor = FrameExtractor::new(tools, options);
    let report = extractor
        .extract(&[&first, &second], directory.path().join("frames"), 6)
        .unwrap();
    assert_eq!(report.written(), 6);

    let events = recorder.events.lock().unwrap();
    let stages: Vec<OperationType> = events.iter().map(|info| info.operation).collect();
    assert!(stages.contains(&OperationType::Probing));
    assert!(stages.contains(&OperationType::FrameExtraction));
    assert!(stages.contains(&OperationType::Verification));

    let extraction: Vec<&ProgressInfo> = events
        .iter()
        .filter(|info| info.operation == OperationType::FrameExtraction)
        .collect();
    let last = extraction.last().unwrap();
    assert_eq!(last.total, Some(6));
    assert_eq!(last.current, 6);
    assert!((last.percentage.unwrap() - 100.0).abs() < 1e-3);
    assert!(extraction.windows(2).all(|pair| pair[0].current <= pair[1].current));
}
