use crate::actuator::{AlarmIndication, MachinePowerState};
use crate::compliance::DetectionResult;
use crate::hal::{
    AcquisitionError, ActuatorError, AlarmIndicator, Camera, Detector, Frame, MachinePower,
};
use crate::timebase::TimeBase;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Camera that never touches a device; frames are numbered placeholder paths.
#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    timebase: TimeBase,
    frames: u64,
    fail_every: Option<u64>,
}

impl SimulatedCamera {
    pub fn new(timebase: TimeBase) -> Self {
        Self {
            timebase,
            frames: 0,
            fail_every: None,
        }
    }

    /// Every `n`-th capture fails, to exercise skip paths.
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }
}

impl Camera for SimulatedCamera {
    fn capture(&mut self) -> Result<Frame, AcquisitionError> {
        self.frames += 1;
        if let Some(n) = self.fail_every {
            if self.frames % n == 0 {
                return Err(AcquisitionError::Capture(format!(
                    "simulated dropout on frame {}",
                    self.frames
                )));
            }
        }
        Ok(Frame {
            path: PathBuf::from(format!("sim-{}.jpg", self.frames)),
            captured_at_us: self.timebase.now_us(),
        })
    }
}

/// Replays a fixed sequence of detection outcomes, then repeats the last one.
#[derive(Debug)]
pub struct ScriptedDetector {
    script: VecDeque<Option<DetectionResult>>,
    last: Option<DetectionResult>,
}

impl ScriptedDetector {
    /// `None` entries simulate a failed inference.
    pub fn new<I: IntoIterator<Item = Option<DetectionResult>>>(script: I) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: None,
        }
    }

    /// Always reports the same boxes.
    pub fn constant(result: DetectionResult) -> Self {
        Self {
            script: VecDeque::new(),
            last: Some(result),
        }
    }
}

impl Detector for ScriptedDetector {
    fn infer(&mut self, _frame: &Frame) -> Result<DetectionResult, AcquisitionError> {
        let next = match self.script.pop_front() {
            Some(entry) => {
                self.last = entry.clone();
                entry
            }
            None => self.last.clone(),
        };
        next.ok_or_else(|| AcquisitionError::Detection("scripted failure".into()))
    }
}

/// Relay double that records every write. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingMachine {
    writes: Arc<Mutex<Vec<MachinePowerState>>>,
}

impl RecordingMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<MachinePowerState> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<MachinePowerState> {
        self.writes().last().copied()
    }
}

impl MachinePower for RecordingMachine {
    fn set_power(&mut self, state: MachinePowerState) -> Result<(), ActuatorError> {
        self.writes
            .lock()
            .map_err(|_| ActuatorError::Unavailable("recording poisoned".into()))?
            .push(state);
        Ok(())
    }
}

/// Alarm double that records every write. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingAlarm {
    writes: Arc<Mutex<Vec<AlarmIndication>>>,
}

impl RecordingAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<AlarmIndication> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<AlarmIndication> {
        self.writes().last().copied()
    }
}

impl AlarmIndicator for RecordingAlarm {
    fn set_indication(&mut self, indication: AlarmIndication) -> Result<(), ActuatorError> {
        self.writes
            .lock()
            .map_err(|_| ActuatorError::Unavailable("recording poisoned".into()))?
            .push(indication);
        Ok(())
    }
}

/// Relay stand-in for dry runs: keeps only the current state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRelay {
    state: Option<MachinePowerState>,
}

impl SimulatedRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<MachinePowerState> {
        self.state
    }
}

impl MachinePower for SimulatedRelay {
    fn set_power(&mut self, state: MachinePowerState) -> Result<(), ActuatorError> {
        if self.state != Some(state) {
            log::info!("[sim] machine power {:?}", state);
        }
        self.state = Some(state);
        Ok(())
    }
}

/// Alarm stand-in for dry runs: keeps only the current indication.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAlarm {
    indication: Option<AlarmIndication>,
}

impl SimulatedAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indication(&self) -> Option<AlarmIndication> {
        self.indication
    }
}

impl AlarmIndicator for SimulatedAlarm {
    fn set_indication(&mut self, indication: AlarmIndication) -> Result<(), ActuatorError> {
        if self.indication != Some(indication) {
            log::info!("[sim] alarm {:?}", indication);
        }
        self.indication = Some(indication);
        Ok(())
    }
}
