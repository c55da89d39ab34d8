use interlock_core::{AcquisitionError, Camera, Frame, TimeBase};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraDevice {
    #[default]
    Picamera,
    Usbcamera,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    None,
    Flip,
    Left,
    Right,
}

impl Rotation {
    /// Clockwise degrees handed to the capture command.
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Right => 90,
            Rotation::Flip => 180,
            Rotation::Left => 270,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Program followed by arguments; placeholders are substituted per frame.
    pub command: Vec<String>,
    pub device: CameraDevice,
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub image_dir: PathBuf,
    pub image_prefix: String,
    /// Keep every frame under a unique name instead of overwriting one file.
    pub save_images: bool,
}

/// Where the next frame goes: `{dir}/{prefix}-{n}.jpg`, with `n` the Unix time
/// in centiseconds when frames are kept, otherwise `0`.
pub fn frame_path(dir: &Path, prefix: &str, save_images: bool, unix_us: u64) -> PathBuf {
    let n = if save_images { unix_us / 10_000 } else { 0 };
    dir.join(format!("{}-{}.jpg", prefix, n))
}

pub(crate) fn substitute(template: &str, vars: &[(&str, String)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

/// Captures stills by running an external program (e.g. `libcamera-still`).
pub struct CommandCamera {
    settings: CaptureSettings,
    timebase: TimeBase,
}

impl CommandCamera {
    pub fn new(settings: CaptureSettings, timebase: TimeBase) -> Self {
        Self { settings, timebase }
    }

    /// Capture straight to `output`, bypassing the frame naming scheme.
    pub fn capture_to(&mut self, output: &Path) -> Result<Frame, AcquisitionError> {
        let (program, args) = self
            .settings
            .command
            .split_first()
            .ok_or_else(|| AcquisitionError::Capture("no capture command configured".into()))?;

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AcquisitionError::Capture(format!("{}: {}", parent.display(), e)))?;
        }

        let device = match self.settings.device {
            CameraDevice::Picamera => "picamera",
            CameraDevice::Usbcamera => "usbcamera",
        };
        let vars = [
            ("output", output.display().to_string()),
            ("width", self.settings.width.to_string()),
            ("height", self.settings.height.to_string()),
            ("camera", self.settings.index.to_string()),
            ("device", device.to_string()),
            ("rotation", self.settings.rotation.degrees().to_string()),
        ];
        let args: Vec<String> = args.iter().map(|a| substitute(a, &vars)).collect();

        debug!(program = %program, ?args, "Capturing frame");
        let status = Command::new(program)
            .args(&args)
            .status()
            .map_err(|e| AcquisitionError::Capture(format!("{}: {}", program, e)))?;
        if !status.success() {
            warn!(program = %program, ?status, "Capture command failed");
            return Err(AcquisitionError::Capture(format!(
                "{} exited with {}",
                program, status
            )));
        }
        if !output.exists() {
            return Err(AcquisitionError::Capture(format!(
                "{} produced no image",
                output.display()
            )));
        }

        Ok(Frame {
            path: output.to_path_buf(),
            captured_at_us: self.timebase.now_us(),
        })
    }
}

impl Camera for CommandCamera {
    fn capture(&mut self) -> Result<Frame, AcquisitionError> {
        let output = frame_path(
            &self.settings.image_dir,
            &self.settings.image_prefix,
            self.settings.save_images,
            self.timebase.unix_us(),
        );
        self.capture_to(&output)
    }
}
