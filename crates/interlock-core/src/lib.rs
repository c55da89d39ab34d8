pub mod actuator;
pub mod compliance;
pub mod hal;
#[cfg(any(test, feature = "simulation"))]
pub mod hal_sim;
pub mod interlock;
mod interlock_proptest;
pub mod poll_loop;
pub mod tags;
pub mod timebase;

pub use actuator::{
    Actuation, ActuatorFacade, ActuatorStats, AlarmCommand, AlarmIndication, MachineCommand,
    MachinePowerState,
};
pub use compliance::{is_compliant, DetectionResult, RequiredSet};
pub use hal::{AcquisitionError, ActuatorError, AlarmIndicator, Camera, Detector, Frame, MachinePower};
#[cfg(any(test, feature = "simulation"))]
pub use hal_sim::{
    RecordingAlarm, RecordingMachine, ScriptedDetector, SimulatedAlarm, SimulatedCamera,
    SimulatedRelay,
};
pub use interlock::{Interlock, InterlockConfig, InterlockState, Step, Transition};
pub use poll_loop::{PollConfig, PollDriver, PollOutcome, PollStats};
pub use tags::PpeTag;
pub use timebase::{Clock, ManualClock, TimeBase};
