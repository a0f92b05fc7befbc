//! Core [`FrameExtractor`] implementation.
//!
//! `FrameExtractor` is the main entry point for the crate. A run probes every
//! input, builds a [`SamplingPlan`] for the requested number of images, and
//! runs one ffmpeg process per contributing input on a bounded worker pool.
//!
//! Inputs that are missing or cannot be probed are skipped and listed in the
//! report. An input whose ffmpeg run fails is recorded with its error while
//! the other inputs carry on.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    command::ExtractionCommand,
    configuration::ExtractOptions,
    error::StillframeError,
    ffmpeg::FfmpegTools,
    hardware_acceleration::HardwareAcceleration,
    metadata::MediaMetadata,
    parallel::WorkerPool,
    probe::MediaProbe,
    progress::{OperationType, ProgressTracker, SharedProgress},
    sampling::SamplingPlan,
};

/// An input left out of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInput {
    /// Path as given by the caller.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// What happened to one input.
#[derive(Debug, Clone, Default)]
pub struct InputOutcome {
    /// Path to the input.
    pub path: PathBuf,
    /// Images planned for this input.
    pub planned: u64,
    /// Images found on disk after ffmpeg finished.
    pub written: Vec<PathBuf>,
    /// Whether hardware decoding failed and software decoding was used.
    pub hardware_fallback: bool,
    /// The ffmpeg failure, if the input could not be processed.
    pub error: Option<String>,
    /// Written images that failed to decode during verification.
    pub unreadable: Vec<PathBuf>,
}

impl InputOutcome {
    /// `true` when every planned image was written and nothing failed.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.unreadable.is_empty() && self.written.len() as u64 == self.planned
    }
}

/// Summary of an extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Images the caller asked for.
    pub requested: u64,
    /// Images the plan allotted (less than `requested` when the inputs have
    /// fewer frames).
    pub planned: u64,
    /// Directory the images went into.
    pub output_dir: PathBuf,
    /// One entry per contributing input, in input order.
    pub inputs: Vec<InputOutcome>,
    /// Inputs that were not probed successfully.
    pub skipped: Vec<SkippedInput>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl ExtractionReport {
    /// Total images written.
    pub fn written(&self) -> u64 {
        self.inputs.iter().map(|input| input.written.len() as u64).sum()
    }

    /// `true` when every contributing input completed.
    ///
    /// Skipped inputs do not make a report incomplete; they were never part
    /// of the plan.
    pub fn is_complete(&self) -> bool {
        self.inputs.iter().all(InputOutcome::is_complete)
    }
}

impl Display for ExtractionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(
            f,
            "{} of {} image(s) written to {} in {:.1?}",
            self.written(),
            self.planned,
            self.output_dir.display(),
            self.elapsed,
        )?;
        for input in &self.inputs {
            write!(
                f,
                "  {}: {}/{}",
                input.path.display(),
                input.written.len(),
                input.planned
            )?;
            if input.hardware_fallback {
                write!(f, " (software fallback)")?;
            }
            if let Some(error) = &input.error {
                write!(f, " failed: {error}")?;
            }
            if !input.unreadable.is_empty() {
                write!(f, " ({} unreadable)", input.unreadable.len())?;
            }
            writeln!(f)?;
        }
        for skipped in &self.skipped {
            writeln!(f, "  {}: skipped ({})", skipped.path.display(), skipped.reason)?;
        }
        Ok(())
    }
}

/// Samples still frames from a set of videos.
///
/// # Example
///
/// ```no_run
/// use stillframe::{ExtractOptions, FfmpegTools, FrameExtractor};
///
/// let extractor = FrameExtractor::new(FfmpegTools::locate(), ExtractOptions::new());
/// let report = extractor.extract(&["a.mp4", "b.mov"], "frames", 500)?;
/// println!("{report}");
/// # Ok::<(), stillframe::StillframeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    tools: FfmpegTools,
    options: ExtractOptions,
}

impl FrameExtractor {
    /// Create an extractor.
    pub fn new(tools: FfmpegTools, options: ExtractOptions) -> Self {
        Self { tools, options }
    }

    /// The options this extractor runs with.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// The resolved tool paths.
    pub fn tools(&self) -> &FfmpegTools {
        &self.tools
    }

    fn check_cancelled(&self) -> Result<(), StillframeError> {
        if self.options.is_cancelled() {
            Err(StillframeError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Probe every input in parallel.
    ///
    /// Returns the metadata of the inputs that probed successfully, in input
    /// order, and the inputs that did not.
    pub fn probe_inputs<P: AsRef<Path> + Sync>(
        &self,
        inputs: &[P],
    ) -> Result<(Vec<MediaMetadata>, Vec<SkippedInput>), StillframeError> {
        self.check_cancelled()?;

        let pool = WorkerPool::new(self.options.workers)?;
        let probe = MediaProbe::new(self.tools.clone()).with_frame_counting(self.options.frame_counting);
        let progress = SharedProgress::new(ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::Probing,
            Some(inputs.len() as u64),
            1,
        ));

        let results = pool.map(inputs, |path| {
            if self.options.is_cancelled() {
                return Err(StillframeError::Cancelled);
            }
            let result = probe.probe(path);
            progress.advance_by(1, Some(path.as_ref().to_path_buf()));
            result
        });
        progress.finish();

        let mut probed = Vec::new();
        let mut skipped = Vec::new();
        for (path, result) in inputs.iter().zip(results) {
            match result {
                Ok(metadata) if metadata.frame_count() > 0 => probed.push(metadata),
                Ok(_) => {
                    log::warn!("Skipping {}: no frames", path.as_ref().display());
                    skipped.push(SkippedInput {
                        path: path.as_ref().to_path_buf(),
                        reason: "video has no frames".to_string(),
                    });
                }
                Err(error @ (StillframeError::Cancelled | StillframeError::ToolNotFound { .. })) => {
                    return Err(error);
                }
                Err(error) => {
                    log::warn!("Skipping {}: {error}", path.as_ref().display());
                    skipped.push(SkippedInput {
                        path: path.as_ref().to_path_buf(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok((probed, skipped))
    }

    /// Probe the inputs and decide which frames to take.
    ///
    /// # Errors
    ///
    /// - [`StillframeError::InvalidImageCount`] if `budget` is zero.
    /// - [`StillframeError::NoUsableInputs`] if no input could be probed.
    pub fn plan<P: AsRef<Path> + Sync>(
        &self,
        inputs: &[P],
        budget: u64,
    ) -> Result<(SamplingPlan, Vec<SkippedInput>), StillframeError> {
        if budget == 0 {
            return Err(StillframeError::InvalidImageCount);
        }

        let (metadata, skipped) = self.probe_inputs(inputs)?;
        if metadata.is_empty() {
            return Err(StillframeError::NoUsableInputs);
        }

        let plan = SamplingPlan::build(&metadata, budget, self.options.ensure_each_input);
        log::info!(
            "Planned {} of {} requested image(s) from {} frame(s) across {} input(s)",
            plan.planned_total(),
            budget,
            plan.total_frames,
            metadata.len(),
        );
        Ok((plan, skipped))
    }

    /// Extract `budget` images from `inputs` into `output_dir`.
    ///
    /// The directory is created if needed.
    ///
    /// # Errors
    ///
    /// Everything [`plan`](FrameExtractor::plan) returns, plus
    /// [`StillframeError::OutputExists`] when a target image exists and
    /// overwriting is off, and [`StillframeError::Cancelled`].
    pub fn extract<P: AsRef<Path> + Sync, Q: AsRef<Path>>(
        &self,
        inputs: &[P],
        output_dir: Q,
        budget: u64,
    ) -> Result<ExtractionReport, StillframeError> {
        let started = Instant::now();
        let (plan, skipped) = self.plan(inputs, budget)?;
        let mut report = self.execute(&plan, output_dir.as_ref())?;
        report.skipped = skipped;
        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Run a plan that was built earlier.
    pub fn execute(
        &self,
        plan: &SamplingPlan,
        output_dir: &Path,
    ) -> Result<ExtractionReport, StillframeError> {
        let started = Instant::now();
        self.check_cancelled()?;
        fs::create_dir_all(output_dir)?;

        let commands: Vec<(ExtractionCommand, u64)> = plan
            .active_inputs()
            .map(|input| {
                (
                    ExtractionCommand::new(input, output_dir, &self.options),
                    input.image_count(),
                )
            })
            .collect();

        self.prepare_targets(&commands)?;

        let pool = WorkerPool::new(self.options.workers)?;
        log::debug!(
            "Extracting from {} input(s) with {} worker(s)",
            commands.len(),
            pool.workers()
        );

        let progress = SharedProgress::new(ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::FrameExtraction,
            Some(plan.planned_total()),
            self.options.batch_size,
        ));

        let outcomes = pool.map(&commands, |(command, planned)| -> Result<InputOutcome, StillframeError> {
            let outcome = self.run_input(command, *planned)?;
            progress.advance_by(
                outcome.written.len() as u64,
                Some(outcome.path.clone()),
            );
            Ok(outcome)
        });
        progress.finish();

        let mut inputs = outcomes
            .into_iter()
            .collect::<Result<Vec<InputOutcome>, StillframeError>>()?;

        if self.options.verify_outputs {
            self.verify(&pool, &mut inputs);
        }

        Ok(ExtractionReport {
            requested: plan.requested,
            planned: plan.planned_total(),
            output_dir: output_dir.to_path_buf(),
            inputs,
            skipped: Vec::new(),
            elapsed: started.elapsed(),
        })
    }

    /// Refuse to clobber existing images, or clear them when overwriting so
    /// the written count reflects this run only.
    fn prepare_targets(&self, commands: &[(ExtractionCommand, u64)]) -> Result<(), StillframeError> {
        for (command, _) in commands {
            for path in command.output_paths() {
                if !path.exists() {
                    continue;
                }
                if !self.options.overwrite {
                    return Err(StillframeError::OutputExists(path));
                }
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn run_input(
        &self,
        command: &ExtractionCommand,
        planned: u64,
    ) -> Result<InputOutcome, StillframeError> {
        self.check_cancelled()?;

        let cancellation = self.options.cancellation.as_ref();
        let mut outcome = InputOutcome {
            path: command.input().to_path_buf(),
            planned,
            ..InputOutcome::default()
        };

        let mut result = command.run(&self.tools.ffmpeg, cancellation);

        if let Err(error) = &result {
            let retry = command.hardware().is_hardware()
                && !matches!(
                    error,
                    StillframeError::Cancelled | StillframeError::ToolNotFound { .. }
                );
            if retry {
                log::warn!(
                    "{} decoding failed for {}, retrying in software: {error}",
                    command.hardware().mode,
                    command.input().display(),
                );
                outcome.hardware_fallback = true;
                result = command
                    .clone()
                    .with_hardware(HardwareAcceleration::software())
                    .run(&self.tools.ffmpeg, cancellation);
            }
        }

        match result {
            Ok(()) => {}
            Err(StillframeError::Cancelled) => return Err(StillframeError::Cancelled),
            Err(error) => {
                log::error!("Extraction failed for {}: {error}", command.input().display());
                outcome.error = Some(error.to_string());
            }
        }

        outcome.written = command
            .output_paths()
            .into_iter()
            .filter(|path| path.is_file())
            .collect();

        if outcome.error.is_none() && (outcome.written.len() as u64) < planned {
            log::warn!(
                "{}: ffmpeg wrote {} of {} image(s); the frame count was probably overestimated",
                command.input().display(),
                outcome.written.len(),
                planned,
            );
        }

        Ok(outcome)
    }

    fn verify(&self, pool: &WorkerPool, inputs: &mut [InputOutcome]) {
        let total = inputs.iter().map(|input| input.written.len() as u64).sum();
        let progress = SharedProgress::new(ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::Verification,
            Some(total),
            self.options.batch_size,
        ));

        let unreadable = pool.map(inputs, |input| {
            let bad: Vec<PathBuf> = input
                .written
                .iter()
                .filter(|path| match image::image_dimensions(path) {
                    Ok((width, height)) => width == 0 || height == 0,
                    Err(error) => {
                        log::warn!("Unreadable image {}: {error}", path.display());
                        true
                    }
                })
                .cloned()
                .collect();
            progress.advance_by(input.written.len() as u64, Some(input.path.clone()));
            bad
        });
        progress.finish();

        for (input, bad) in inputs.iter_mut().zip(unreadable) {
            input.unreadable = bad;
        }
    }
}
