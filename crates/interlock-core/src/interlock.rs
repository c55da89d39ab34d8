use crate::actuator::{AlarmCommand, AlarmIndication, MachineCommand};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterlockState {
    #[default]
    Startup,
    Compliant,
    Warning,
    Fault,
}

impl InterlockState {
    /// Gauge encoding (0=startup, 1=compliant, 2=warning, 3=fault).
    pub fn code(&self) -> u8 {
        match self {
            Self::Startup => 0,
            Self::Compliant => 1,
            Self::Warning => 2,
            Self::Fault => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Compliant => "compliant",
            Self::Warning => "warning",
            Self::Fault => "fault",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterlockConfig {
    /// Dwell in `Warning` before escalating to `Fault`.
    pub warn_grace: Duration,
    /// Dwell in `Fault` before power is cut.
    pub fault_grace: Duration,
    pub warn_sound: bool,
    pub fault_sound: bool,
}

impl Default for InterlockConfig {
    fn default() -> Self {
        Self {
            warn_grace: Duration::from_secs(15),
            fault_grace: Duration::from_secs(15),
            warn_sound: false,
            fault_sound: false,
        }
    }
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: InterlockState,
    pub reset_timer: bool,
    pub machine: MachineCommand,
    pub alarm: AlarmCommand,
}

/// Result of feeding one compliance verdict into the interlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub from: InterlockState,
    pub to: InterlockState,
    pub compliant: bool,
    pub machine: MachineCommand,
    pub alarm: AlarmCommand,
}

impl Step {
    pub fn changed_state(&self) -> bool {
        self.from != self.to
    }
}

/// Pure transition table. `grace_elapsed` is only consulted in `Warning` and
/// `Fault`, measured from the last timer reset.
pub fn transition(
    state: InterlockState,
    compliant: bool,
    grace_elapsed: bool,
    config: &InterlockConfig,
) -> Transition {
    use InterlockState::*;

    let orange = AlarmIndication::Orange {
        sound: config.warn_sound,
    };
    let red = AlarmIndication::Red {
        sound: config.fault_sound,
    };

    let (next, reset_timer, machine, alarm) = match (state, compliant, grace_elapsed) {
        (Startup, true, _) => (
            Compliant,
            true,
            MachineCommand::PowerOn,
            AlarmCommand::Set(AlarmIndication::Green),
        ),
        (Startup, false, _) => (
            Startup,
            false,
            MachineCommand::PowerOff,
            AlarmCommand::Set(AlarmIndication::Off),
        ),
        (Compliant, true, _) => (
            Compliant,
            false,
            MachineCommand::EnsureOn,
            AlarmCommand::Ensure(AlarmIndication::Green),
        ),
        (Compliant, false, _) => (Warning, true, MachineCommand::Keep, AlarmCommand::Set(orange)),
        (Warning | Fault, true, _) => (
            Compliant,
            true,
            MachineCommand::PowerOn,
            AlarmCommand::Set(AlarmIndication::Green),
        ),
        (Warning, false, false) => (Warning, false, MachineCommand::Keep, AlarmCommand::Set(orange)),
        (Warning, false, true) => (Fault, true, MachineCommand::Keep, AlarmCommand::Set(red)),
        (Fault, false, false) => (Fault, false, MachineCommand::Keep, AlarmCommand::Set(red)),
        (Fault, false, true) => (
            Startup,
            true,
            MachineCommand::PowerOff,
            AlarmCommand::Set(AlarmIndication::Off),
        ),
    };

    Transition {
        next,
        reset_timer,
        machine,
        alarm,
    }
}

/// Interlock state plus the monotonic time of the last timer reset.
#[derive(Debug, Clone)]
pub struct Interlock {
    config: InterlockConfig,
    state: InterlockState,
    entered_at_us: u64,
}

impl Interlock {
    pub fn new(config: InterlockConfig) -> Self {
        Self {
            config,
            state: InterlockState::Startup,
            entered_at_us: 0,
        }
    }

    pub fn state(&self) -> InterlockState {
        self.state
    }

    pub fn entered_at_us(&self) -> u64 {
        self.entered_at_us
    }

    pub fn config(&self) -> &InterlockConfig {
        &self.config
    }

    fn grace_for(&self, state: InterlockState) -> Option<Duration> {
        match state {
            InterlockState::Warning => Some(self.config.warn_grace),
            InterlockState::Fault => Some(self.config.fault_grace),
            InterlockState::Startup | InterlockState::Compliant => None,
        }
    }

    /// Feeds one verdict. Never fails; always yields a command pair.
    pub fn advance(&mut self, compliant: bool, now_us: u64) -> Step {
        let elapsed = Duration::from_micros(now_us.saturating_sub(self.entered_at_us));
        let grace_elapsed = self
            .grace_for(self.state)
            .is_some_and(|grace| elapsed >= grace);

        let row = transition(self.state, compliant, grace_elapsed, &self.config);
        let from = self.state;
        self.state = row.next;
        if row.reset_timer {
            self.entered_at_us = now_us;
        }

        Step {
            from,
            to: row.next,
            compliant,
            machine: row.machine,
            alarm: row.alarm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000;

    fn config() -> InterlockConfig {
        InterlockConfig {
            warn_grace: Duration::from_secs(15),
            fault_grace: Duration::from_secs(15),
            warn_sound: false,
            fault_sound: true,
        }
    }

    fn compliant_at(interlock: &mut Interlock, t: u64) -> Step {
        interlock.advance(true, t * SEC)
    }

    fn missing_at(interlock: &mut Interlock, t: u64) -> Step {
        interlock.advance(false, t * SEC)
    }

    #[test]
    fn startup_holds_power_off_until_compliant() {
        let mut interlock = Interlock::new(config());
        let step = missing_at(&mut interlock, 0);
        assert_eq!(step.to, InterlockState::Startup);
        assert_eq!(step.machine, MachineCommand::PowerOff);
        assert_eq!(step.alarm, AlarmCommand::Set(AlarmIndication::Off));

        let step = compliant_at(&mut interlock, 1);
        assert_eq!(step.to, InterlockState::Compliant);
        assert_eq!(step.machine, MachineCommand::PowerOn);
        assert_eq!(step.alarm, AlarmCommand::Set(AlarmIndication::Green));
        assert_eq!(interlock.entered_at_us(), SEC);
    }

    #[test]
    fn staying_compliant_only_ensures_outputs() {
        let mut interlock = Interlock::new(config());
        compliant_at(&mut interlock, 0);
        let step = compliant_at(&mut interlock, 100);
        assert!(!step.changed_state());
        assert_eq!(step.machine, MachineCommand::EnsureOn);
        assert_eq!(step.alarm, AlarmCommand::Ensure(AlarmIndication::Green));
        assert_eq!(interlock.entered_at_us(), 0);
    }

    #[test]
    fn single_bad_frame_warns_without_touching_power() {
        let mut interlock = Interlock::new(config());
        compliant_at(&mut interlock, 0);
        let step = missing_at(&mut interlock, 3);
        assert_eq!(step.to, InterlockState::Warning);
        assert_eq!(step.machine, MachineCommand::Keep);
        assert_eq!(
            step.alarm,
            AlarmCommand::Set(AlarmIndication::Orange { sound: false })
        );
        assert_eq!(interlock.entered_at_us(), 3 * SEC);
    }

    #[test]
    fn warning_escalates_once_grace_has_elapsed() {
        let mut interlock = Interlock::new(config());
        compliant_at(&mut interlock, 0);
        missing_at(&mut interlock, 10);

        let step = interlock.advance(false, 25 * SEC - 1);
        assert_eq!(step.to, InterlockState::Warning);
        assert_eq!(
            step.alarm,
            AlarmCommand::Set(AlarmIndication::Orange { sound: false })
        );

        let step = missing_at(&mut interlock, 25);
        assert_eq!(step.to, InterlockState::Fault);
        assert_eq!(step.machine, MachineCommand::Keep);
        assert_eq!(
            step.alarm,
            AlarmCommand::Set(AlarmIndication::Red { sound: true })
        );
        assert_eq!(interlock.entered_at_us(), 25 * SEC);
    }

    #[test]
    fn fault_cuts_power_after_fault_grace() {
        let mut interlock = Interlock::new(InterlockConfig {
            fault_grace: Duration::from_secs(30),
            ..config()
        });
        compliant_at(&mut interlock, 0);
        missing_at(&mut interlock, 1);
        missing_at(&mut interlock, 16);
        assert_eq!(interlock.state(), InterlockState::Fault);

        let step = missing_at(&mut interlock, 45);
        assert_eq!(step.to, InterlockState::Fault);
        assert_eq!(step.machine, MachineCommand::Keep);

        let step = missing_at(&mut interlock, 46);
        assert_eq!(step.to, InterlockState::Startup);
        assert_eq!(step.machine, MachineCommand::PowerOff);
        assert_eq!(step.alarm, AlarmCommand::Set(AlarmIndication::Off));
        assert_eq!(interlock.entered_at_us(), 46 * SEC);
    }

    #[test]
    fn recovery_from_fault_is_immediate() {
        let mut interlock = Interlock::new(config());
        compliant_at(&mut interlock, 0);
        missing_at(&mut interlock, 1);
        missing_at(&mut interlock, 16);
        let step = compliant_at(&mut interlock, 17);
        assert_eq!(step.from, InterlockState::Fault);
        assert_eq!(step.to, InterlockState::Compliant);
        assert_eq!(step.machine, MachineCommand::PowerOn);
        assert_eq!(step.alarm, AlarmCommand::Set(AlarmIndication::Green));
    }

    #[test]
    fn elapsed_is_measured_from_last_entry() {
        // inputs at t = 0,5,10,16,20,25,31,32
        let mut interlock = Interlock::new(config());
        let inputs = [
            (0, false),
            (5, true),
            (10, false),
            (16, false),
            (20, false),
            (25, false),
            (31, false),
            (32, false),
        ];
        let states: Vec<InterlockState> = inputs
            .iter()
            .map(|&(t, ok)| interlock.advance(ok, t * SEC).to)
            .collect();

        use InterlockState::*;
        assert_eq!(
            states,
            vec![Startup, Compliant, Warning, Warning, Warning, Fault, Fault, Fault]
        );
        assert_eq!(interlock.entered_at_us(), 25 * SEC);
    }

    #[test]
    fn zero_grace_escalates_on_next_bad_frame() {
        let mut interlock = Interlock::new(InterlockConfig {
            warn_grace: Duration::ZERO,
            fault_grace: Duration::ZERO,
            ..config()
        });
        compliant_at(&mut interlock, 0);
        assert_eq!(missing_at(&mut interlock, 0).to, InterlockState::Warning);
        assert_eq!(missing_at(&mut interlock, 0).to, InterlockState::Fault);
        assert_eq!(missing_at(&mut interlock, 0).to, InterlockState::Startup);
    }
}
