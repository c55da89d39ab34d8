use crate::hal::{AlarmIndicator, MachinePower};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachinePowerState {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "color")]
pub enum AlarmIndication {
    Off,
    Green,
    Orange { sound: bool },
    Red { sound: bool },
}

impl AlarmIndication {
    /// Gauge encoding (0=off, 1=green, 2=orange, 3=red).
    pub fn code(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Green => 1,
            Self::Orange { .. } => 2,
            Self::Red { .. } => 3,
        }
    }

    pub fn sound(&self) -> bool {
        match self {
            Self::Off | Self::Green => false,
            Self::Orange { sound } | Self::Red { sound } => *sound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineCommand {
    /// Leave the relay as it is.
    Keep,
    PowerOn,
    PowerOff,
    /// Power on unless already known to be on.
    EnsureOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmCommand {
    Set(AlarmIndication),
    /// Write only if the indicator is not already showing this.
    Ensure(AlarmIndication),
}

impl AlarmCommand {
    pub fn indication(&self) -> AlarmIndication {
        match self {
            Self::Set(indication) | Self::Ensure(indication) => *indication,
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct ActuatorStats {
    pub machine_writes: u64,
    pub alarm_writes: u64,
    pub write_errors: u64,
}

/// What actually reached the sinks for one command pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actuation {
    pub power_written: Option<MachinePowerState>,
    pub alarm_written: Option<AlarmIndication>,
    pub write_errors: u64,
}

/// Routes interlock commands to whichever sinks are configured.
///
/// Commands for an absent sink are dropped. The facade remembers the last
/// value each sink accepted so `EnsureOn` / `Ensure` can skip redundant
/// writes; a failed write forgets it so the next ensure retries.
pub struct ActuatorFacade {
    machine: Option<Box<dyn MachinePower>>,
    alarm: Option<Box<dyn AlarmIndicator>>,
    power: Option<MachinePowerState>,
    indication: Option<AlarmIndication>,
    stats: ActuatorStats,
}

impl ActuatorFacade {
    pub fn new(
        machine: Option<Box<dyn MachinePower>>,
        alarm: Option<Box<dyn AlarmIndicator>>,
    ) -> Self {
        Self {
            machine,
            alarm,
            power: None,
            indication: None,
            stats: ActuatorStats::default(),
        }
    }

    /// Facade with no sinks at all (camera-only deployments).
    pub fn detached() -> Self {
        Self::new(None, None)
    }

    pub fn has_machine(&self) -> bool {
        self.machine.is_some()
    }

    pub fn has_alarm(&self) -> bool {
        self.alarm.is_some()
    }

    /// Last power state the relay accepted.
    pub fn power(&self) -> Option<MachinePowerState> {
        self.power
    }

    /// Last indication the alarm accepted.
    pub fn indication(&self) -> Option<AlarmIndication> {
        self.indication
    }

    pub fn stats(&self) -> &ActuatorStats {
        &self.stats
    }

    pub fn apply(&mut self, machine: MachineCommand, alarm: AlarmCommand) -> Actuation {
        let errors_before = self.stats.write_errors;
        let power_written = match machine {
            MachineCommand::Keep => None,
            MachineCommand::PowerOn => self.write_power(MachinePowerState::On),
            MachineCommand::PowerOff => self.write_power(MachinePowerState::Off),
            MachineCommand::EnsureOn => {
                if self.power == Some(MachinePowerState::On) {
                    None
                } else {
                    self.write_power(MachinePowerState::On)
                }
            }
        };

        let alarm_written = match alarm {
            AlarmCommand::Set(indication) => self.write_alarm(indication),
            AlarmCommand::Ensure(indication) => {
                if self.indication == Some(indication) {
                    None
                } else {
                    self.write_alarm(indication)
                }
            }
        };

        Actuation {
            power_written,
            alarm_written,
            write_errors: self.stats.write_errors - errors_before,
        }
    }

    fn write_power(&mut self, state: MachinePowerState) -> Option<MachinePowerState> {
        let sink = self.machine.as_mut()?;
        match sink.set_power(state) {
            Ok(()) => {
                debug!("machine power set to {:?}", state);
                self.stats.machine_writes += 1;
                self.power = Some(state);
                Some(state)
            }
            Err(e) => {
                warn!("machine power write ({:?}) failed: {}", state, e);
                self.stats.write_errors += 1;
                self.power = None;
                None
            }
        }
    }

    fn write_alarm(&mut self, indication: AlarmIndication) -> Option<AlarmIndication> {
        let sink = self.alarm.as_mut()?;
        match sink.set_indication(indication) {
            Ok(()) => {
                debug!("alarm set to {:?}", indication);
                self.stats.alarm_writes += 1;
                self.indication = Some(indication);
                Some(indication)
            }
            Err(e) => {
                warn!("alarm write ({:?}) failed: {}", indication, e);
                self.stats.write_errors += 1;
                self.indication = None;
                None
            }
        }
    }
}
