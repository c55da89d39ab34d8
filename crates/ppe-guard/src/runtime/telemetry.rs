use interlock_core::{AcquisitionError, MachinePowerState, PollOutcome};
use ppe_io::metrics::{
    init_metrics, serve_metrics, ACTUATOR_ERRORS, ALARM_INDICATION, ALARM_SOUND,
    CAPTURE_FAILURES, COMPLIANT_POLLS, DETECTION_FAILURES, INTERLOCK_STATE, MACHINE_POWER, POLLS,
    TRANSITIONS,
};
use std::thread;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Folds one poll outcome into the Prometheus metrics.
pub fn record_outcome(outcome: &PollOutcome) {
    POLLS.inc();
    match outcome {
        PollOutcome::Skipped(AcquisitionError::Capture(_)) => CAPTURE_FAILURES.inc(),
        PollOutcome::Skipped(_) => DETECTION_FAILURES.inc(),
        PollOutcome::Advanced { step, actuation } => {
            if step.compliant {
                COMPLIANT_POLLS.inc();
            }
            if step.changed_state() {
                TRANSITIONS.inc();
            }
            INTERLOCK_STATE.set(step.to.code() as f64);
            if let Some(power) = actuation.power_written {
                MACHINE_POWER.set(match power {
                    MachinePowerState::On => 1.0,
                    MachinePowerState::Off => 0.0,
                });
            }
            if let Some(indication) = actuation.alarm_written {
                ALARM_INDICATION.set(indication.code() as f64);
                ALARM_SOUND.set(if indication.sound() { 1.0 } else { 0.0 });
            }
            ACTUATOR_ERRORS.inc_by(actuation.write_errors);
        }
    }
}
