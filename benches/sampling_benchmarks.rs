//! Benchmarks for frame allocation, index selection, and command building.
//!
//! Run with: cargo bench

use std::{hint::black_box, path::Path, path::PathBuf, time::Duration};

use criterion::Criterion;
use stillframe::{
    ExtractOptions, ExtractionCommand, FrameCountSource, MediaMetadata, SamplingPlan,
    VideoMetadata,
    sampling::{allocate, uniform_indices},
};

fn metadata(index: u64) -> MediaMetadata {
    let frame_count = 1_000 + index * 7_919 % 250_000;
    MediaMetadata {
        path: PathBuf::from(format!("clips/take_{index:04}.mp4")),
        format: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
        duration: Duration::from_secs(frame_count / 30),
        video: Some(VideoMetadata {
            width: 1920,
            height: 1080,
            frames_per_second: 30.0,
            frame_count,
            frame_count_source: FrameCountSource::Container,
            codec: "h264".to_string(),
        }),
    }
}

fn benchmark_allocate(criterion: &mut Criterion) {
    let counts: Vec<u64> = (0..1_000).map(|i| 1_000 + i * 7_919 % 250_000).collect();

    criterion.bench_function("allocate 50k images over 1000 inputs", |bencher| {
        bencher.iter(|| allocate(black_box(50_000), black_box(&counts), true));
    });
}

fn benchmark_uniform_indices(criterion: &mut Criterion) {
    criterion.bench_function("uniform indices 100k of 10M", |bencher| {
        bencher.iter(|| uniform_indices(black_box(10_000_000), black_box(100_000)));
    });
}

fn benchmark_plan(criterion: &mut Criterion) {
    let inputs: Vec<MediaMetadata> = (0..200).map(metadata).collect();

    criterion.bench_function("plan 20k images over 200 inputs", |bencher| {
        bencher.iter(|| SamplingPlan::build(black_box(&inputs), black_box(20_000), true));
    });
}

fn benchmark_command(criterion: &mut Criterion) {
    let plan = SamplingPlan::build(&[metadata(1)], 5_000, true);
    let options = ExtractOptions::new();

    criterion.bench_function("build command line for 5000 frames", |bencher| {
        bencher.iter(|| {
            let command = ExtractionCommand::new(&plan.inputs[0], Path::new("frames"), &options);
            black_box(command.filter());
            black_box(command.output_paths());
        });
    });
}

criterion::criterion_group!(
    benches,
    benchmark_allocate,
    benchmark_uniform_indices,
    benchmark_plan,
    benchmark_command,
);
criterion::criterion_main!(benches);
