//! Hardware-accelerated decoding.
//!
//! Decoding happens inside the `ffmpeg` process, so hardware acceleration is a
//! matter of passing the right `-hwaccel` input options. This module provides
//! [`HardwareAccelerationMode`] for choosing a backend, [`HardwareAcceleration`]
//! for turning that choice into arguments, and two probes that report what
//! the host offers: [`available_hardware_devices`] (what the ffmpeg build
//! supports), plus [`detect_nvidia_gpus`] and [`detect_intel_gpus`] (which
//! cards are installed).
//!
//! # Platform Support
//!
//! Availability depends on both the ffmpeg build and the host's GPU drivers.
//! A job that fails with hardware decoding is retried once in software by
//! [`FrameExtractor`](crate::FrameExtractor).

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::Path,
    process::Command,
    str::FromStr,
};

use crate::{
    error::StillframeError,
    ffmpeg::{FfmpegTools, run_to_completion},
};

/// Hardware acceleration mode for video decoding.
///
/// # Example
///
/// ```
/// use stillframe::{ExtractOptions, HardwareAccelerationMode, HardwareDeviceType};
///
/// let options = ExtractOptions::new()
///     .with_hardware_acceleration(HardwareAccelerationMode::Specific(HardwareDeviceType::Cuda))
///     .with_hardware_device("0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareAccelerationMode {
    /// Plain CPU decoding. This is the default.
    #[default]
    Software,
    /// Let ffmpeg pick the first working hardware decoder (`-hwaccel auto`).
    Auto,
    /// Use a specific hardware backend.
    Specific(HardwareDeviceType),
}

impl Display for HardwareAccelerationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            HardwareAccelerationMode::Software => f.write_str("software"),
            HardwareAccelerationMode::Auto => f.write_str("auto"),
            HardwareAccelerationMode::Specific(device) => write!(f, "{device}"),
        }
    }
}

impl FromStr for HardwareAccelerationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "software" | "sw" | "cpu" | "none" => Ok(HardwareAccelerationMode::Software),
            "auto" => Ok(HardwareAccelerationMode::Auto),
            _ => value
                .parse::<HardwareDeviceType>()
                .map(HardwareAccelerationMode::Specific),
        }
    }
}

/// Supported hardware backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareDeviceType {
    /// NVIDIA CUDA / NVDEC (Linux, Windows).
    Cuda,
    /// Intel Quick Sync Video.
    Qsv,
    /// Video Acceleration API (Linux).
    Vaapi,
    /// Apple VideoToolbox (macOS).
    VideoToolbox,
    /// Direct3D 11 Video Acceleration (Windows).
    D3d11va,
    /// DirectX Video Acceleration 2 (Windows).
    Dxva2,
}

impl HardwareDeviceType {
    /// Every backend, in preference order.
    pub const ALL: [HardwareDeviceType; 6] = [
        HardwareDeviceType::Cuda,
        HardwareDeviceType::Qsv,
        HardwareDeviceType::Vaapi,
        HardwareDeviceType::VideoToolbox,
        HardwareDeviceType::D3d11va,
        HardwareDeviceType::Dxva2,
    ];

    /// The name ffmpeg uses after `-hwaccel`.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            HardwareDeviceType::Cuda => "cuda",
            HardwareDeviceType::Qsv => "qsv",
            HardwareDeviceType::Vaapi => "vaapi",
            HardwareDeviceType::VideoToolbox => "videotoolbox",
            HardwareDeviceType::D3d11va => "d3d11va",
            HardwareDeviceType::Dxva2 => "dxva2",
        }
    }

    fn from_ffmpeg_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|device| device.ffmpeg_name() == name)
    }

    /// Whether the backend can work on the current operating system.
    pub fn supported_on_host(self) -> bool {
        match self {
            HardwareDeviceType::Vaapi => cfg!(target_os = "linux"),
            HardwareDeviceType::VideoToolbox => cfg!(target_os = "macos"),
            HardwareDeviceType::D3d11va | HardwareDeviceType::Dxva2 => cfg!(windows),
            HardwareDeviceType::Cuda | HardwareDeviceType::Qsv => true,
        }
    }
}

impl Display for HardwareDeviceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.ffmpeg_name())
    }
}

impl FromStr for HardwareDeviceType {
    type Err = String;

    /// Accepts ffmpeg names as well as vendor labels such as `"NVIDIA CUDA"`,
    /// `"Intel QSV"` and `"AMD VAAPI"`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let key = normalized
            .strip_prefix("nvidia ")
            .or_else(|| normalized.strip_prefix("intel "))
            .or_else(|| normalized.strip_prefix("amd "))
            .unwrap_or(&normalized);

        match key {
            "nvdec" | "nvenc" => Ok(HardwareDeviceType::Cuda),
            "quicksync" => Ok(HardwareDeviceType::Qsv),
            "d3d11" => Ok(HardwareDeviceType::D3d11va),
            _ => HardwareDeviceType::from_ffmpeg_name(key)
                .ok_or_else(|| format!("unsupported hardware mode: {value}")),
        }
    }
}

/// A resolved hardware acceleration setting: backend plus optional device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HardwareAcceleration {
    /// Backend selection.
    pub mode: HardwareAccelerationMode,
    /// Device selector passed as `-hwaccel_device` (a GPU index for CUDA, a
    /// render node such as `/dev/dri/renderD128` for VAAPI).
    pub device: Option<String>,
}

impl HardwareAcceleration {
    /// Create a setting with no explicit device.
    pub fn new(mode: HardwareAccelerationMode) -> Self {
        Self { mode, device: None }
    }

    /// Software decoding.
    pub fn software() -> Self {
        Self::default()
    }

    /// Whether this setting asks for any hardware decoding.
    pub fn is_hardware(&self) -> bool {
        self.effective_mode() != HardwareAccelerationMode::Software
    }

    /// The mode actually used on this host.
    ///
    /// A backend that cannot exist on the current OS (VAAPI outside Linux,
    /// for example) degrades to software decoding.
    pub fn effective_mode(&self) -> HardwareAccelerationMode {
        match self.mode {
            HardwareAccelerationMode::Specific(device) if !device.supported_on_host() => {
                HardwareAccelerationMode::Software
            }
            mode => mode,
        }
    }

    /// Input options to place before `-i`.
    pub fn input_args(&self) -> Vec<String> {
        let name = match self.effective_mode() {
            HardwareAccelerationMode::Software => {
                if self.mode != HardwareAccelerationMode::Software {
                    log::warn!(
                        "{} decoding is not available on this platform, using software decoding",
                        self.mode
                    );
                }
                return Vec::new();
            }
            HardwareAccelerationMode::Auto => "auto",
            HardwareAccelerationMode::Specific(device) => device.ffmpeg_name(),
        };

        let mut args = vec!["-hwaccel".to_string(), name.to_string()];
        if let Some(device) = self.device.as_ref().filter(|d| !d.trim().is_empty()) {
            args.push("-hwaccel_device".to_string());
            args.push(device.trim().to_string());
        }
        args
    }
}

/// List the hardware backends the ffmpeg build supports.
///
/// Runs `ffmpeg -hide_banner -hwaccels`. Methods this crate does not model
/// (e.g. `drm`, `opencl`, `vulkan`) are ignored.
pub fn available_hardware_devices(
    tools: &FfmpegTools,
) -> Result<Vec<HardwareDeviceType>, StillframeError> {
    let output = run_to_completion(
        "ffmpeg",
        Command::new(&tools.ffmpeg).args(["-hide_banner", "-hwaccels"]),
    )?;
    Ok(parse_hwaccels(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_hwaccels(text: &str) -> Vec<HardwareDeviceType> {
    text.lines()
        .skip_while(|line| !line.contains("Hardware acceleration methods"))
        .skip(1)
        .filter_map(|line| HardwareDeviceType::from_ffmpeg_name(line.trim()))
        .collect()
}

/// An NVIDIA GPU reported by `nvidia-smi`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDevice {
    /// Index usable as `-hwaccel_device`.
    pub index: u32,
    /// Marketing name, e.g. `"NVIDIA GeForce RTX 3080"`.
    pub name: String,
}

impl Display for GpuDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "GPU {}: {}", self.index, self.name)
    }
}

/// Enumerate NVIDIA GPUs with `nvidia-smi`.
///
/// Returns an empty list when the tool is missing or fails; a machine without
/// NVIDIA drivers is not an error.
pub fn detect_nvidia_gpus() -> Vec<GpuDevice> {
    let mut command = Command::new("nvidia-smi");
    command.args(["--query-gpu=index,name", "--format=csv,noheader"]);

    match run_to_completion("nvidia-smi", &mut command) {
        Ok(output) => parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout)),
        Err(error) => {
            log::debug!("No NVIDIA GPUs detected: {error}");
            Vec::new()
        }
    }
}

/// PCI vendor id of Intel graphics adapters.
const INTEL_VENDOR_ID: &str = "0x8086";

/// Enumerate Intel graphics adapters, the candidates for QSV decoding.
///
/// On Windows the video controllers are listed through PowerShell and the
/// index is the adapter's position in that list. On Linux the DRM render
/// nodes under `/sys/class/drm` are scanned and each Intel node is reported
/// with its `/dev/dri` path, which is what `-hwaccel_device` takes there.
/// Any failure gives an empty list.
pub fn detect_intel_gpus() -> Vec<GpuDevice> {
    if cfg!(windows) {
        let mut command = Command::new("powershell");
        command.args([
            "-NoProfile",
            "-Command",
            "Get-CimInstance Win32_VideoController | Select-Object -ExpandProperty Name",
        ]);
        match run_to_completion("powershell", &mut command) {
            Ok(output) => parse_video_controllers(&String::from_utf8_lossy(&output.stdout)),
            Err(error) => {
                log::debug!("No Intel GPUs detected: {error}");
                Vec::new()
            }
        }
    } else {
        intel_render_nodes(Path::new("/sys/class/drm"))
    }
}

fn parse_video_controllers(text: &str) -> Vec<GpuDevice> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .filter(|(_, name)| name.contains("Intel"))
        .map(|(index, name)| GpuDevice {
            index: index as u32,
            name: name.to_string(),
        })
        .collect()
}

fn intel_render_nodes(drm: &Path) -> Vec<GpuDevice> {
    let entries = match fs::read_dir(drm) {
        Ok(entries) => entries,
        Err(error) => {
            log::debug!("Cannot list {}: {error}", drm.display());
            return Vec::new();
        }
    };

    let mut nodes: Vec<GpuDevice> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let index = name.strip_prefix("renderD")?.parse().ok()?;
            let vendor = fs::read_to_string(entry.path().join("device/vendor")).ok()?;
            (vendor.trim() == INTEL_VENDOR_ID).then(|| GpuDevice {
                index,
                name: format!("Intel GPU (/dev/dri/{name})"),
            })
        })
        .collect();
    nodes.sort_by_key(|node| node.index);
    nodes
}

fn parse_nvidia_smi(text: &str) -> Vec<GpuDevice> {
    text.lines()
        .filter_map(|line| {
            let (index, name) = line.split_once(',')?;
            Some(GpuDevice {
                index: index.trim().parse().ok()?,
                name: name.trim().to_string(),
            })
        })
        .collect()
}
