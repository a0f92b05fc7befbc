//! Probing integration tests against generated clips.

mod common;

use stillframe::{FrameCountMode, FrameCountSource, MediaProbe, probe::parse_frame_rate};

use common::{FIXTURE_FPS, generate_video, tools_or_skip};

#[test]
fn frame_rate_rationals() {
    assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
    assert_eq!(parse_frame_rate("25"), 25.0);
    assert_eq!(parse_frame_rate("25/0"), 0.0);
    assert_eq!(parse_frame_rate("garbage"), 0.0);
}

#[test]
fn probe_reads_stream_metadata() {
    let Some(tools) = tools_or_skip() else {
        return;
    };
    let directory = tempfile::tempdir().unwrap();
    let video = generate_video(&tools, directory.path(), "clip.mp4", 50);

    let metadata = MediaProbe::new(tools).probe(&video).unwrap();
    let stream = metadata.video.as_ref().unwrap();

    assert_eq!(metadata.path, video);
    assert_eq!(stream.width, 160);
    assert_eq!(stream.height, 120);
    assert!((stream.frames_per_second - f64::from(FIXTURE_FPS)).abs() < 0.01);
    assert_eq!(stream.codec, "mpeg4");
    assert_eq!(metadata.frame_count(), 50);
    assert_eq!(stream.frame_count_source, FrameCountSource::Container);
    assert!((metadata.duration.as_secs_f64() - 2.0).abs() < 0.1);
}

#[test]
fn exact_counting_decodes() {
    let Some(tools) = tools_or_skip() else {
        return;
    };
    let directory = tempfile::tempdir().unwrap();
    let video = generate_video(&tools, directory.path(), "clip.mp4", 30);

    let metadata = MediaProbe::new(tools)
        .with_frame_counting(FrameCountMode::Exact)
        .probe(&video)
        .unwrap();

    assert_eq!(metadata.frame_count(), 30);
    assert_eq!(
        metadata.video.unwrap().frame_count_source,
        FrameCountSource::Decoded
    );
}

#[test]
fn probe_many_keeps_order_and_totals() {
    let Some(tools) = tools_or_skip() else {
        return;
    };
    let directory = tempfile::tempdir().unwrap();
    let short = generate_video(&tools, directory.path(), "short.mp4", 10);
    let long = generate_video(&tools, directory.path(), "long.mp4", 40);
    let missing = directory.path().join("missing.mp4");

    let probe = MediaProbe::new(tools);
    let paths = [short.clone(), missing, long.clone()];
    let results = probe.probe_many(&paths);

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().path, short);
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().path, long);
    assert_eq!(probe.total_frame_count(&paths), 50);
}
