use crate::actuator::{AlarmIndication, MachinePowerState};
use crate::compliance::DetectionResult;
use std::path::PathBuf;
use thiserror::Error;

/// Handle to one captured image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub path: PathBuf,
    pub captured_at_us: u64,
}

/// Camera or model could not produce a usable result this cycle.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("image capture failed: {0}")]
    Capture(String),

    #[error("no detection model configured")]
    NoModel,

    #[error("detection failed: {0}")]
    Detection(String),
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("actuator link unavailable: {0}")]
    Unavailable(String),

    #[error("actuator write failed: {0}")]
    Write(#[from] std::io::Error),
}

pub trait Camera: Send {
    fn capture(&mut self) -> Result<Frame, AcquisitionError>;
}

pub trait Detector: Send {
    fn infer(&mut self, frame: &Frame) -> Result<DetectionResult, AcquisitionError>;
}

/// Machine relay. Writing the current value again must be harmless.
pub trait MachinePower: Send {
    fn set_power(&mut self, state: MachinePowerState) -> Result<(), ActuatorError>;
}

/// Alarm tower. Writing the current indication again must be harmless.
pub trait AlarmIndicator: Send {
    fn set_indication(&mut self, indication: AlarmIndication) -> Result<(), ActuatorError>;
}

impl<T: Camera + ?Sized> Camera for Box<T> {
    fn capture(&mut self) -> Result<Frame, AcquisitionError> {
        (**self).capture()
    }
}

impl<T: Detector + ?Sized> Detector for Box<T> {
    fn infer(&mut self, frame: &Frame) -> Result<DetectionResult, AcquisitionError> {
        (**self).infer(frame)
    }
}
