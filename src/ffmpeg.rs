//! Locating and running the FFmpeg command-line tools.
//!
//! All decoding and probing is delegated to the `ffmpeg` and `ffprobe`
//! binaries. This module resolves where those binaries live, maps
//! [`FfmpegLogLevel`] to the `-loglevel` argument, and wraps process
//! execution so that failures surface as [`StillframeError`] values carrying
//! the tool's stderr.
//!
//! # Example
//!
//! ```no_run
//! use stillframe::FfmpegTools;
//!
//! let tools = FfmpegTools::locate();
//! println!("{}", tools.verify()?);
//! # Ok::<(), stillframe::StillframeError>(())
//! ```
//!
//! # Binary resolution
//!
//! For each tool, the first match wins:
//!
//! 1. the `STILLFRAME_FFMPEG` / `STILLFRAME_FFPROBE` environment variable;
//! 2. a bundled static build under `ffmpeg/bin/` in the working directory;
//! 3. the bare program name, looked up on `PATH`.

use std::{
    env,
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    io::Read,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
    str::FromStr,
    thread,
    time::Duration,
};

use crate::{error::StillframeError, progress::CancellationToken};

/// Environment variable overriding the `ffmpeg` binary.
pub const FFMPEG_ENV: &str = "STILLFRAME_FFMPEG";
/// Environment variable overriding the `ffprobe` binary.
pub const FFPROBE_ENV: &str = "STILLFRAME_FFPROBE";

const BUNDLED_DIR: &str = "ffmpeg/bin";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// FFmpeg log verbosity, passed to every invocation as `-loglevel`.
///
/// # Ordering (most verbose → most quiet)
///
/// `Trace` > `Debug` > `Verbose` > `Info` > `Warning` > `Error` > `Fatal` > `Panic` > `Quiet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log conditions after which the process aborts.
    Panic,
    /// Only log unrecoverable errors.
    Fatal,
    /// Log recoverable errors. This is the default.
    #[default]
    Error,
    /// Log warnings.
    Warning,
    /// Log informational messages.
    Info,
    /// Log verbose informational messages.
    Verbose,
    /// Log debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    /// The value ffmpeg expects after `-loglevel`.
    pub fn as_arg(self) -> &'static str {
        match self {
            FfmpegLogLevel::Quiet => "quiet",
            FfmpegLogLevel::Panic => "panic",
            FfmpegLogLevel::Fatal => "fatal",
            FfmpegLogLevel::Error => "error",
            FfmpegLogLevel::Warning => "warning",
            FfmpegLogLevel::Info => "info",
            FfmpegLogLevel::Verbose => "verbose",
            FfmpegLogLevel::Debug => "debug",
            FfmpegLogLevel::Trace => "trace",
        }
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_arg())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "panic" => Ok(FfmpegLogLevel::Panic),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "verbose" => Ok(FfmpegLogLevel::Verbose),
            "debug" => Ok(FfmpegLogLevel::Debug),
            "trace" => Ok(FfmpegLogLevel::Trace),
            other => Err(format!("unknown ffmpeg log level: {other}")),
        }
    }
}

/// Paths to the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    /// The decoder/encoder binary.
    pub ffmpeg: PathBuf,
    /// The probing binary.
    pub ffprobe: PathBuf,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::locate()
    }
}

impl FfmpegTools {
    /// Use explicit binary paths.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(ffmpeg: P, ffprobe: Q) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve both binaries using the environment, a bundled build, or `PATH`.
    ///
    /// This never fails; a missing binary is only detected when it is first
    /// run (or by [`verify`](FfmpegTools::verify)).
    pub fn locate() -> Self {
        Self {
            ffmpeg: resolve_binary(FFMPEG_ENV, "ffmpeg"),
            ffprobe: resolve_binary(FFPROBE_ENV, "ffprobe"),
        }
    }

    /// Run `-version` on both tools and return ffmpeg's version line.
    ///
    /// # Errors
    ///
    /// [`StillframeError::ToolNotFound`] if either binary cannot be spawned.
    pub fn verify(&self) -> Result<String, StillframeError> {
        let output = run_to_completion("ffmpeg", Command::new(&self.ffmpeg).arg("-version"))?;
        run_to_completion("ffprobe", Command::new(&self.ffprobe).arg("-version"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }
}

fn resolve_binary(env_key: &str, name: &str) -> PathBuf {
    if let Some(path) = env::var_os(env_key).filter(|value| !value.is_empty()) {
        return PathBuf::from(path);
    }

    let executable = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    };

    if let Ok(current) = env::current_dir() {
        let bundled = current.join(BUNDLED_DIR).join(&executable);
        if bundled.is_file() {
            return bundled;
        }
    }

    PathBuf::from(name)
}

fn spawn_error(tool: &'static str, program: &OsStr, error: std::io::Error) -> StillframeError {
    StillframeError::ToolNotFound {
        tool,
        path: Path::new(program).to_path_buf(),
        reason: error.to_string(),
    }
}

fn render(command: &Command) -> String {
    let mut rendered = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

/// Run a tool, wait for it, and capture its output.
///
/// A non-zero exit becomes [`StillframeError::ToolFailed`].
pub(crate) fn run_to_completion(
    tool: &'static str,
    command: &mut Command,
) -> Result<Output, StillframeError> {
    log::debug!("Running {}", render(command));

    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|error| spawn_error(tool, command.get_program(), error))?;

    if !output.status.success() {
        return Err(StillframeError::ToolFailed {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

/// Run a tool while watching a cancellation token.
///
/// The child is polled rather than waited on so that a cancelled token kills
/// it promptly. Stderr is drained on a helper thread to keep the pipe from
/// filling up.
pub(crate) fn run_cancellable(
    tool: &'static str,
    command: &mut Command,
    cancellation: Option<&CancellationToken>,
) -> Result<(), StillframeError> {
    log::debug!("Running {}", render(command));

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| spawn_error(tool, command.get_program(), error))?;

    let stderr_reader = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buffer = String::new();
            let _ = stderr.read_to_string(&mut buffer);
            buffer
        })
    });

    let status = loop {
        let stop = match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if cancellation.is_some_and(|token| token.is_cancelled()) => {
                log::debug!("Killing {tool} (pid {}) after cancellation", child.id());
                StillframeError::Cancelled
            }
            Ok(None) => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(error) => {
                log::warn!("Lost track of {tool} (pid {}): {error}", child.id());
                StillframeError::IoError(error)
            }
        };

        let _ = child.kill();
        let _ = child.wait();
        if let Some(reader) = stderr_reader {
            let _ = reader.join();
        }
        return Err(stop);
    };

    let stderr = stderr_reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default();

    if !status.success() {
        return Err(StillframeError::ToolFailed {
            tool,
            status,
            stderr: stderr.trim().to_string(),
        });
    }

    if !stderr.trim().is_empty() {
        log::warn!("{tool}: {}", stderr.trim());
    }

    Ok(())
}
