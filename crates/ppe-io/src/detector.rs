use crate::camera::substitute;
use interlock_core::{AcquisitionError, DetectionResult, Detector, Frame, PpeTag};
use serde::Deserialize;
use std::process::Command;
use tracing::{debug, warn};

/// One bounding box as printed by the inference command.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct DetectedBox {
    pub class: u16,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Program followed by arguments; `{image}`, `{model}`, `{confidence}` are substituted.
    pub command: Vec<String>,
    pub model: Option<String>,
    pub min_confidence: f32,
}

/// Parses inference stdout (a JSON array of boxes) into tags, dropping weak boxes.
pub fn parse_boxes(stdout: &str, min_confidence: f32) -> Result<DetectionResult, AcquisitionError> {
    let boxes: Vec<DetectedBox> = serde_json::from_str(stdout.trim())
        .map_err(|e| AcquisitionError::Detection(format!("unreadable detector output: {}", e)))?;
    Ok(boxes
        .into_iter()
        .filter(|b| b.confidence >= min_confidence)
        .map(|b| PpeTag::from_class(b.class))
        .collect())
}

/// Runs an external object-detection model once per frame.
pub struct CommandDetector {
    settings: DetectorSettings,
}

impl CommandDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self { settings }
    }
}

impl Detector for CommandDetector {
    fn infer(&mut self, frame: &Frame) -> Result<DetectionResult, AcquisitionError> {
        let (program, args) = self
            .settings
            .command
            .split_first()
            .ok_or(AcquisitionError::NoModel)?;
        let model = self.settings.model.clone().ok_or(AcquisitionError::NoModel)?;

        let vars = [
            ("image", frame.path.display().to_string()),
            ("model", model),
            ("confidence", self.settings.min_confidence.to_string()),
        ];
        let args: Vec<String> = args.iter().map(|a| substitute(a, &vars)).collect();

        let output = Command::new(program)
            .args(&args)
            .output()
            .map_err(|e| AcquisitionError::Detection(format!("{}: {}", program, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(program = %program, status = ?output.status, stderr = %stderr.trim(), "Detector failed");
            return Err(AcquisitionError::Detection(format!(
                "{} exited with {}",
                program, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let detected = parse_boxes(&stdout, self.settings.min_confidence)?;
        debug!(
            image = %frame.path.display(),
            tags = ?detected.tags().iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            "Detection complete"
        );
        Ok(detected)
    }
}
