use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use stillframe::{
    CancellationToken, ExtractOptions, ExtractionReport, FfmpegLogLevel, FfmpegTools,
    FrameCountMode, FrameExtractor, HardwareAccelerationMode, ImageFormat, MediaMetadata,
    MediaProbe, OperationType, OutputNaming, ProgressCallback, ProgressInfo, SamplingPlan,
    SkippedInput, StillframeError, hardware_acceleration, validation,
};

const CLI_AFTER_HELP: &str = "Examples:\n  stillframe-cli probe a.mp4 b.mkv --json\n  stillframe-cli plan clips/*.mp4 --count 500\n  stillframe-cli extract clips/*.mp4 --out frames --count 500 --progress\n  stillframe-cli extract talk.mp4 --out frames --count 200 --hardware cuda --device 0 --format jpg\n  stillframe-cli completions zsh > _stillframe-cli";

#[derive(Debug, Parser)]
#[command(
    name = "stillframe-cli",
    version,
    about = "Sample a fixed number of still frames from a set of videos",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging, including ffmpeg command lines.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing images.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<FfmpegLogLevel>,

    /// Number of inputs processed at once (default: one per CPU).
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Path to the ffmpeg executable.
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable.
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print metadata and frame counts.
    #[command(
        about = "Print video metadata and frame counts",
        after_help = "Examples:\n  stillframe-cli probe input.mp4\n  stillframe-cli probe a.mp4 b.mp4 --json --exact"
    )]
    Probe {
        /// Input videos.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
        /// Count frames by decoding (slow, exact).
        #[arg(long)]
        exact: bool,
    },

    /// Show how many frames would be taken from each input.
    #[command(
        about = "Preview the frame allocation",
        after_help = "Examples:\n  stillframe-cli plan a.mp4 b.mp4 --count 100"
    )]
    Plan {
        /// Input videos.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Total number of images.
        #[arg(long)]
        count: u64,
        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
        /// Count frames by decoding (slow, exact).
        #[arg(long)]
        exact: bool,
        /// Do not reserve one image for every input.
        #[arg(long)]
        no_ensure_each: bool,
    },

    /// Extract images.
    #[command(
        about = "Extract still frames into a folder",
        after_help = "Examples:\n  stillframe-cli extract a.mp4 b.mp4 --out frames --count 500\n  stillframe-cli extract a.mp4 --out frames --count 50 --format jpg --quality 85 --naming stem"
    )]
    Extract {
        /// Input videos.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory (created if missing).
        #[arg(long)]
        out: PathBuf,
        /// Total number of images.
        #[arg(long)]
        count: u64,
        /// Image format (png, jpg, bmp, tiff, webp).
        #[arg(long, default_value = "png")]
        format: ImageFormat,
        /// JPEG/WebP quality, 1-100.
        #[arg(long, default_value_t = 95)]
        quality: u8,
        /// File naming (sequential, stem).
        #[arg(long, default_value = "sequential")]
        naming: OutputNaming,
        /// Hardware decode mode (software, auto, cuda, qsv, vaapi, videotoolbox, d3d11va, dxva2).
        #[arg(long)]
        hardware: Option<HardwareAccelerationMode>,
        /// Hardware device (GPU index or render node).
        #[arg(long)]
        device: Option<String>,
        /// Count frames by decoding (slow, exact).
        #[arg(long)]
        exact: bool,
        /// Decode every written image to check it.
        #[arg(long)]
        verify: bool,
        /// Do not reserve one image for every input.
        #[arg(long)]
        no_ensure_each: bool,
    },

    /// Validate inputs and print a report.
    #[command(
        about = "Validate input videos",
        after_help = "Examples:\n  stillframe-cli validate input.mp4"
    )]
    Validate {
        /// Input videos.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// List hardware decoders and NVIDIA and Intel GPUs.
    #[command(about = "List hardware decoding options")]
    Devices {
        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Progress bar that follows whichever stage is running.
struct TerminalProgress {
    bar: ProgressBar,
    stage: Mutex<Option<OperationType>>,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg:12} {bar:40.cyan/blue} {pos}/{len} ({eta})",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self {
            bar,
            stage: Mutex::new(None),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn stage_label(operation: OperationType) -> &'static str {
    match operation {
        OperationType::Probing => "probing",
        OperationType::FrameExtraction => "extracting",
        OperationType::Verification => "verifying",
        _ => "working",
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Ok(mut stage) = self.stage.lock() {
            if *stage != Some(info.operation) {
                *stage = Some(info.operation);
                self.bar.reset();
                self.bar.set_message(stage_label(info.operation));
            }
        }
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
    }
}

fn warn(message: impl AsRef<str>) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.as_ref().yellow());
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn resolve_tools(global: &GlobalOptions) -> FfmpegTools {
    let located = FfmpegTools::locate();
    FfmpegTools::new(
        global.ffmpeg.clone().unwrap_or(located.ffmpeg),
        global.ffprobe.clone().unwrap_or(located.ffprobe),
    )
}

fn frame_counting(exact: bool) -> FrameCountMode {
    if exact {
        FrameCountMode::Exact
    } else {
        FrameCountMode::Fast
    }
}

fn base_extract_options(global: &GlobalOptions) -> Result<ExtractOptions, StillframeError> {
    let mut options = ExtractOptions::new().with_overwrite(global.overwrite);

    if let Some(threads) = global.threads {
        if threads == 0 {
            return Err(StillframeError::InvalidWorkerCount);
        }
        options = options.with_workers(threads);
    }

    if let Some(level) = global.log_level {
        options = options.with_log_level(level);
    }

    Ok(options)
}

/// Probe on a pool sized by `--threads`. A missing ffprobe aborts, and so does
/// a run where no input could be probed.
fn probe_command(
    tools: FfmpegTools,
    global: &GlobalOptions,
    inputs: &[PathBuf],
    exact: bool,
) -> Result<(Vec<MediaMetadata>, Vec<SkippedInput>), StillframeError> {
    let options = base_extract_options(global)?.with_frame_counting(frame_counting(exact));
    let (probed, skipped) = FrameExtractor::new(tools, options).probe_inputs(inputs)?;
    if probed.is_empty() {
        for input in &skipped {
            warn(format!("{}: {}", input.path.display(), input.reason));
        }
        return Err(StillframeError::NoUsableInputs);
    }
    Ok((probed, skipped))
}

fn metadata_json(metadata: &MediaMetadata) -> Value {
    json!({
        "path": metadata.path.display().to_string(),
        "format": metadata.format,
        "duration_seconds": metadata.duration.as_secs_f64(),
        "frame_count": metadata.frame_count(),
        "video": metadata.video.as_ref().map(|video| json!({
            "width": video.width,
            "height": video.height,
            "fps": video.frames_per_second,
            "frame_count": video.frame_count,
            "frame_count_source": video.frame_count_source.to_string(),
            "codec": video.codec,
        })),
    })
}

fn skipped_json(skipped: &[SkippedInput]) -> Value {
    skipped
        .iter()
        .map(|input| {
            json!({
                "path": input.path.display().to_string(),
                "reason": input.reason,
            })
        })
        .collect()
}

fn plan_json(plan: &SamplingPlan, skipped: &[SkippedInput]) -> Value {
    json!({
        "requested": plan.requested,
        "planned": plan.planned_total(),
        "total_frames": plan.total_frames,
        "inputs": plan.inputs.iter().map(|input| json!({
            "path": input.path.display().to_string(),
            "frame_count": input.frame_count,
            "images": input.image_count(),
            "first_number": input.first_number,
        })).collect::<Vec<_>>(),
        "skipped": skipped_json(skipped),
    })
}

fn print_plan(plan: &SamplingPlan, skipped: &[SkippedInput]) {
    for input in &plan.inputs {
        println!(
            "{}: {} of {} frame(s)",
            input.path.display(),
            input.image_count(),
            input.frame_count
        );
    }
    println!(
        "Total: {} of {} requested image(s) from {} frame(s)",
        plan.planned_total(),
        plan.requested,
        plan.total_frames
    );
    for input in skipped {
        warn(format!("skipped {}: {}", input.path.display(), input.reason));
    }
}

fn print_report(report: &ExtractionReport) {
    for input in &report.inputs {
        if input.hardware_fallback {
            warn(format!(
                "{} was decoded in software after a hardware failure",
                input.path.display()
            ));
        }
        if let Some(error) = &input.error {
            warn(format!("{} failed: {error}", input.path.display()));
        } else if (input.written.len() as u64) < input.planned {
            warn(format!(
                "{} produced {} of {} image(s)",
                input.path.display(),
                input.written.len(),
                input.planned
            ));
        }
        for path in &input.unreadable {
            warn(format!("unreadable image {}", path.display()));
        }
    }
    for input in &report.skipped {
        warn(format!("skipped {}: {}", input.path.display(), input.reason));
    }

    println!(
        "{} {}",
        "success:".green().bold(),
        format!(
            "Extracted {} image(s) to {} in {:.1?}",
            report.written(),
            report.output_dir.display(),
            report.elapsed
        )
        .green()
    );
}

fn install_ctrlc(token: &CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("{}", "cancelling...".yellow());
        token.cancel();
    })?;
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    let tools = resolve_tools(&cli.global);

    match cli.command {
        Commands::Probe {
            inputs,
            json,
            exact,
        } => {
            let (probed, skipped) = probe_command(tools, &cli.global, &inputs, exact)?;
            let total = probed
                .iter()
                .map(MediaMetadata::frame_count)
                .fold(0_u64, |total, count| total.saturating_add(count));

            if json {
                let payload = json!({
                    "inputs": probed.iter().map(metadata_json).collect::<Vec<_>>(),
                    "skipped": skipped_json(&skipped),
                    "total_frames": total,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for metadata in &probed {
                    println!("{}", metadata.path.display().to_string().bold());
                    println!("  Format: {}", metadata.format);
                    println!("  Duration: {:.3}s", metadata.duration.as_secs_f64());
                    if let Some(video) = &metadata.video {
                        println!(
                            "  Video: {}x{} @ {:.2} fps [{}]",
                            video.width, video.height, video.frames_per_second, video.codec,
                        );
                        println!(
                            "  Frames: {} ({})",
                            video.frame_count, video.frame_count_source
                        );
                    }
                }
                for input in &skipped {
                    warn(format!("{}: {}", input.path.display(), input.reason));
                }
                println!("Total extractable frames: {total}");
            }
        }
        Commands::Plan {
            inputs,
            count,
            json,
            exact,
            no_ensure_each,
        } => {
            let options = base_extract_options(&cli.global)?
                .with_frame_counting(frame_counting(exact))
                .with_ensure_each_input(!no_ensure_each);
            let extractor = FrameExtractor::new(tools, options);
            let (plan, skipped) = extractor.plan(&inputs, count)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plan_json(&plan, &skipped))?);
            } else {
                print_plan(&plan, &skipped);
            }
        }
        Commands::Extract {
            inputs,
            out,
            count,
            format,
            quality,
            naming,
            hardware,
            device,
            exact,
            verify,
            no_ensure_each,
        } => {
            let token = CancellationToken::new();
            install_ctrlc(&token)?;

            let mut options = base_extract_options(&cli.global)?
                .with_image_format(format)
                .with_quality(quality)
                .with_naming(naming)
                .with_frame_counting(frame_counting(exact))
                .with_verification(verify)
                .with_ensure_each_input(!no_ensure_each)
                .with_cancellation(token);
            if let Some(mode) = hardware {
                options = options.with_hardware_acceleration(mode);
            }
            if let Some(device) = device {
                options = options.with_hardware_device(device);
            }

            let progress = if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new()?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            let extractor = FrameExtractor::new(tools, options);
            let outcome = extract(&extractor, &inputs, &out, count, cli.global.verbose);
            if let Some(progress) = progress {
                progress.finish();
            }

            let report = outcome?;
            print_report(&report);
            if !report.is_complete() {
                return Err(format!(
                    "extraction incomplete: {} of {} image(s) written",
                    report.written(),
                    report.planned
                )
                .into());
            }
        }
        Commands::Validate { inputs } => {
            let probe = MediaProbe::new(tools);
            let mut invalid = 0_usize;
            for input in &inputs {
                let report = validation::validate_input(&probe, input);
                if !report.is_valid() {
                    invalid += 1;
                }
                println!("{}", input.display().to_string().bold());
                print!("{report}");
            }
            if invalid > 0 {
                return Err(format!("{invalid} of {} input(s) failed validation", inputs.len()).into());
            }
        }
        Commands::Devices { json } => {
            let methods = hardware_acceleration::available_hardware_devices(&tools)?;
            let gpus = hardware_acceleration::detect_nvidia_gpus();
            let intel_gpus = hardware_acceleration::detect_intel_gpus();

            if json {
                let payload = json!({
                    "hwaccels": methods.iter().map(|device| device.ffmpeg_name()).collect::<Vec<_>>(),
                    "nvidia_gpus": gpus.iter().map(|gpu| json!({
                        "index": gpu.index,
                        "name": gpu.name,
                    })).collect::<Vec<_>>(),
                    "intel_gpus": intel_gpus.iter().map(|gpu| json!({
                        "index": gpu.index,
                        "name": gpu.name,
                    })).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", "Hardware decoders:".bold());
                if methods.is_empty() {
                    println!("  (none)");
                }
                for device in &methods {
                    let note = if device.supported_on_host() {
                        ""
                    } else {
                        " (not usable on this platform)"
                    };
                    println!("  {device}{note}");
                }
                println!("{}", "NVIDIA GPUs:".bold());
                if gpus.is_empty() {
                    println!("  (none)");
                }
                for gpu in &gpus {
                    println!("  {gpu}");
                }
                println!("{}", "Intel GPUs (QSV):".bold());
                if intel_gpus.is_empty() {
                    println!("  (none)");
                }
                for gpu in &intel_gpus {
                    println!("  {gpu}");
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "stillframe-cli", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn extract(
    extractor: &FrameExtractor,
    inputs: &[PathBuf],
    out: &Path,
    count: u64,
    verbose: bool,
) -> Result<ExtractionReport, StillframeError> {
    let (plan, skipped) = extractor.plan(inputs, count)?;
    if verbose {
        print_plan(&plan, &skipped);
    }
    let mut report = extractor.execute(&plan, out)?;
    report.skipped = skipped;
    Ok(report)
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
