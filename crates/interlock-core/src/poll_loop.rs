use crate::actuator::{Actuation, ActuatorFacade, AlarmCommand, AlarmIndication, MachineCommand};
use crate::compliance::{is_compliant, RequiredSet};
use crate::hal::{AcquisitionError, Camera, Detector};
use crate::interlock::{Interlock, InterlockConfig, InterlockState, Step};
use crate::timebase::Clock;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct PollConfig {
    pub required: RequiredSet,
    pub interlock: InterlockConfig,
    /// Lower bound on one iteration. Zero lets capture + inference latency set the pace.
    pub min_cycle: Duration,
}

#[derive(Clone, Default, Debug)]
pub struct PollStats {
    pub polls: u64,
    pub capture_failures: u64,
    pub detection_failures: u64,
    pub compliant_polls: u64,
    pub transitions: u64,
}

#[derive(Debug)]
pub enum PollOutcome {
    /// Acquisition failed; interlock and outputs untouched.
    Skipped(AcquisitionError),
    Advanced { step: Step, actuation: Actuation },
}

/// Owns the interlock and drives it from camera and detector.
pub struct PollDriver<C: Camera, D: Detector, K: Clock> {
    camera: C,
    detector: D,
    actuators: ActuatorFacade,
    interlock: Interlock,
    required: RequiredSet,
    min_cycle: Duration,
    clock: K,
    stats: PollStats,
}

impl<C: Camera, D: Detector, K: Clock> PollDriver<C, D, K> {
    /// Forces the machine off and the alarm to standby before the first frame.
    pub fn new(camera: C, detector: D, actuators: ActuatorFacade, config: PollConfig, clock: K) -> Self {
        let mut driver = Self {
            camera,
            detector,
            actuators,
            interlock: Interlock::new(config.interlock),
            required: config.required,
            min_cycle: config.min_cycle,
            clock,
            stats: PollStats::default(),
        };
        driver.actuators.apply(
            MachineCommand::PowerOff,
            AlarmCommand::Set(AlarmIndication::Off),
        );
        driver
    }

    pub fn state(&self) -> InterlockState {
        self.interlock.state()
    }

    pub fn interlock(&self) -> &Interlock {
        &self.interlock
    }

    pub fn actuators(&self) -> &ActuatorFacade {
        &self.actuators
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// One capture → infer → evaluate → advance → actuate pass.
    pub fn poll_once(&mut self) -> PollOutcome {
        self.stats.polls += 1;

        let frame = match self.camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.capture_failures += 1;
                warn!("skipping poll: {}", e);
                return PollOutcome::Skipped(e);
            }
        };

        let detected = match self.detector.infer(&frame) {
            Ok(detected) => detected,
            Err(e) => {
                self.stats.detection_failures += 1;
                warn!("skipping poll on {}: {}", frame.path.display(), e);
                return PollOutcome::Skipped(e);
            }
        };

        let compliant = is_compliant(&self.required, Some(&detected));
        if compliant {
            self.stats.compliant_polls += 1;
        } else {
            let missing: Vec<String> = detected
                .missing(&self.required)
                .map(|tag| tag.to_string())
                .collect();
            debug!("non-compliant frame, missing: {:?}", missing);
        }

        let step = self.interlock.advance(compliant, self.clock.now_us());
        if step.changed_state() {
            self.stats.transitions += 1;
            info!(
                "interlock {} -> {} (compliant={}, machine={:?}, alarm={:?})",
                step.from.as_str(),
                step.to.as_str(),
                compliant,
                step.machine,
                step.alarm
            );
        }

        let actuation = self.actuators.apply(step.machine, step.alarm);
        PollOutcome::Advanced { step, actuation }
    }

    /// Polls until `stop` is raised, handing every outcome to `on_cycle`.
    pub fn run<F: FnMut(&PollOutcome)>(&mut self, stop: &AtomicBool, mut on_cycle: F) {
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            let outcome = self.poll_once();
            on_cycle(&outcome);

            let spent = cycle_start.elapsed();
            if spent < self.min_cycle {
                std::thread::sleep(self.min_cycle - spent);
            }
        }
    }
}
