//! Building `ffmpeg` invocations.
//!
//! One [`ExtractionCommand`] extracts every planned frame of one input in a
//! single decoding pass: a `select` filter keeps exactly the planned frame
//! indices and the image2 muxer writes them as numbered files.
//!
//! Long index lists are written to a temporary filter script instead of the
//! command line, which keeps large runs under OS argument-length limits.

use std::{
    ffi::OsString,
    io::Write,
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    configuration::{ExtractOptions, ImageFormat, OutputNaming},
    error::StillframeError,
    ffmpeg::{FfmpegLogLevel, run_cancellable},
    hardware_acceleration::HardwareAcceleration,
    progress::CancellationToken,
    sampling::PlannedInput,
};

/// Above this many selected frames the filter goes into a script file.
pub const MAX_INLINE_SELECT_TERMS: usize = 256;

/// Digits in output numbers, matching `%07d`.
const NUMBER_WIDTH: usize = 7;

/// Build the `select` expression for a list of frame indices.
///
/// Commas are escaped so the expression survives filtergraph parsing.
///
/// ```
/// use stillframe::command::select_expression;
///
/// assert_eq!(select_expression(&[0, 12]), r"eq(n\,0)+eq(n\,12)");
/// ```
pub fn select_expression(indices: &[u64]) -> String {
    indices
        .iter()
        .map(|index| format!(r"eq(n\,{index})"))
        .collect::<Vec<_>>()
        .join("+")
}

/// An ffmpeg invocation for one input.
#[derive(Debug, Clone)]
pub struct ExtractionCommand {
    input: PathBuf,
    output_dir: PathBuf,
    indices: Vec<u64>,
    first_number: u64,
    prefix: Option<String>,
    format: ImageFormat,
    quality: u8,
    hardware: HardwareAcceleration,
    log_level: FfmpegLogLevel,
    overwrite: bool,
}

impl ExtractionCommand {
    /// Build the command for a planned input.
    pub fn new(planned: &PlannedInput, output_dir: &Path, options: &ExtractOptions) -> Self {
        let (first_number, prefix) = match options.naming {
            OutputNaming::Sequential => (planned.first_number, None),
            OutputNaming::VideoStem => (1, Some(planned.stem.clone())),
        };

        Self {
            input: planned.path.clone(),
            output_dir: output_dir.to_path_buf(),
            indices: planned.indices.clone(),
            first_number,
            prefix,
            format: options.image_format,
            quality: options.quality,
            hardware: options.hardware.clone(),
            log_level: options.log_level,
            overwrite: options.overwrite,
        }
    }

    /// Same command with a different decoder setting.
    #[must_use]
    pub fn with_hardware(mut self, hardware: HardwareAcceleration) -> Self {
        self.hardware = hardware;
        self
    }

    /// The hardware setting this command decodes with.
    pub fn hardware(&self) -> &HardwareAcceleration {
        &self.hardware
    }

    /// The input file.
    pub fn input(&self) -> &Path {
        &self.input
    }

    fn file_name(&self, number: &str) -> String {
        let extension = self.format.extension();
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{number}.{extension}"),
            None => format!("{number}.{extension}"),
        }
    }

    /// The image2 output pattern, e.g. `out/%07d.png`.
    pub fn output_pattern(&self) -> PathBuf {
        self.output_dir
            .join(self.file_name(&format!("%0{NUMBER_WIDTH}d")))
    }

    /// Every file this command is expected to write, in order.
    pub fn output_paths(&self) -> Vec<PathBuf> {
        let count = self.indices.len() as u64;
        (self.first_number..self.first_number + count)
            .map(|number| {
                self.output_dir
                    .join(self.file_name(&format!("{number:0NUMBER_WIDTH$}")))
            })
            .collect()
    }

    /// The filtergraph that selects the planned frames.
    pub fn filter(&self) -> String {
        format!("select='{}'", select_expression(&self.indices))
    }

    /// Whether the filter is too long to pass inline.
    pub fn needs_filter_script(&self) -> bool {
        self.indices.len() > MAX_INLINE_SELECT_TERMS
    }

    /// The full argument list.
    ///
    /// `filter_script` must be given when
    /// [`needs_filter_script`](ExtractionCommand::needs_filter_script) is true;
    /// it names a file containing [`filter`](ExtractionCommand::filter).
    pub fn args(&self, filter_script: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-loglevel".into(),
            self.log_level.as_arg().into(),
            if self.overwrite { "-y" } else { "-n" }.into(),
        ];

        args.extend(self.hardware.input_args().into_iter().map(OsString::from));
        args.push("-i".into());
        args.push(self.input.clone().into_os_string());

        for arg in ["-map", "0:v:0", "-an", "-sn"] {
            args.push(arg.into());
        }
        match filter_script {
            Some(script) => {
                args.push("-filter_script:v".into());
                args.push(script.as_os_str().to_os_string());
            }
            None => {
                args.push("-vf".into());
                args.push(self.filter().into());
            }
        }
        args.push("-vsync".into());
        args.push("vfr".into());
        args.extend(
            self.format
                .quality_args(self.quality)
                .into_iter()
                .map(OsString::from),
        );
        args.push("-start_number".into());
        args.push(self.first_number.to_string().into());
        args.push(self.output_pattern().into_os_string());
        args
    }

    /// Run ffmpeg and wait for it.
    ///
    /// # Errors
    ///
    /// [`StillframeError::ToolNotFound`], [`StillframeError::ToolFailed`], or
    /// [`StillframeError::Cancelled`] if the token fires mid-run.
    pub fn run(
        &self,
        ffmpeg: &Path,
        cancellation: Option<&CancellationToken>,
    ) -> Result<(), StillframeError> {
        if self.indices.is_empty() {
            return Ok(());
        }

        let script = if self.needs_filter_script() {
            let mut file = tempfile::Builder::new()
                .prefix("stillframe-select-")
                .suffix(".txt")
                .tempfile()?;
            file.write_all(self.filter().as_bytes())?;
            file.flush()?;
            Some(file)
        } else {
            None
        };

        let mut command = Command::new(ffmpeg);
        command.args(self.args(script.as_ref().map(|file| file.path())));
        run_cancellable("ffmpeg", &mut command, cancellation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware_acceleration::{HardwareAccelerationMode, HardwareDeviceType};

    fn planned(indices: Vec<u64>, first_number: u64) -> PlannedInput {
        PlannedInput {
            path: PathBuf::from("clips/a.mp4"),
            frame_count: 1000,
            indices,
            first_number,
            stem: "a".to_string(),
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn sequential_command_line() {
        let command =
            ExtractionCommand::new(&planned(vec![0, 50], 11), Path::new("out"), &ExtractOptions::new());
        let args = strings(&command.args(None));

        let pattern = Path::new("out").join("%07d.png").to_string_lossy().into_owned();
        let expected = [
            "-hide_banner",
            "-nostdin",
            "-loglevel",
            "error",
            "-n",
            "-i",
            "clips/a.mp4",
            "-map",
            "0:v:0",
            "-an",
            "-sn",
            "-vf",
            r"select='eq(n\,0)+eq(n\,50)'",
            "-vsync",
            "vfr",
            "-start_number",
            "11",
            pattern.as_str(),
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn hardware_args_go_before_input() {
        let options = ExtractOptions::new()
            .with_hardware_acceleration(HardwareAccelerationMode::Specific(HardwareDeviceType::Cuda))
            .with_hardware_device("0")
            .with_overwrite(true);
        let args = strings(&ExtractionCommand::new(&planned(vec![3], 1), Path::new("out"), &options).args(None));

        let hwaccel = args.iter().position(|a| a == "-hwaccel").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(hwaccel < input);
        assert_eq!(args[hwaccel + 1], "cuda");
        assert!(args.contains(&"-y".to_string()));
    }

    #[test]
    fn stem_naming_restarts_numbering() {
        let options = ExtractOptions::new()
            .with_naming(OutputNaming::VideoStem)
            .with_image_format(ImageFormat::Jpeg);
        let command = ExtractionCommand::new(&planned(vec![1, 2, 3], 40), Path::new("out"), &options);

        assert_eq!(command.output_pattern(), Path::new("out").join("a_%07d.jpg"));
        assert_eq!(
            command.output_paths(),
            vec![
                Path::new("out").join("a_0000001.jpg"),
                Path::new("out").join("a_0000002.jpg"),
                Path::new("out").join("a_0000003.jpg"),
            ]
        );
        assert!(strings(&command.args(None)).contains(&"-q:v".to_string()));
    }

    #[test]
    fn sequential_paths_follow_start_number() {
        let command =
            ExtractionCommand::new(&planned(vec![5, 9], 8), Path::new("out"), &ExtractOptions::new());
        assert_eq!(
            command.output_paths(),
            vec![
                Path::new("out").join("0000008.png"),
                Path::new("out").join("0000009.png"),
            ]
        );
    }

    #[test]
    fn long_selections_use_a_script() {
        let indices: Vec<u64> = (0..=MAX_INLINE_SELECT_TERMS as u64).collect();
        let command = ExtractionCommand::new(&planned(indices, 1), Path::new("out"), &ExtractOptions::new());
        assert!(command.needs_filter_script());

        let args = strings(&command.args(Some(Path::new("select.txt"))));
        let position = args.iter().position(|a| a == "-filter_script:v").unwrap();
        assert_eq!(args[position + 1], "select.txt");
        assert!(!args.contains(&"-vf".to_string()));
    }

    #[test]
    fn empty_selection_runs_nothing() {
        let command = ExtractionCommand::new(&planned(Vec::new(), 1), Path::new("out"), &ExtractOptions::new());
        assert!(command.output_paths().is_empty());
        command
            .run(Path::new("/definitely/not/ffmpeg"), None)
            .unwrap();
    }
}
