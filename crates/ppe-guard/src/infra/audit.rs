//! Audit trail for interlock decisions.
//!
//! Every state transition and every relay write is appended to a JSONL
//! file so a shutdown can be traced back to the frames that caused it.

use interlock_core::{Actuation, MachinePowerState, Step};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Types of events that are logged in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Interlock started with the given configuration
    SystemStart,
    /// Interlock moved between states
    StateTransition,
    /// Relay accepted a power-on write
    MachinePowerOn,
    /// Relay accepted a power-off write
    MachinePowerOff,
    /// Interlock stopped
    SystemShutdown,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic timestamp in microseconds
    pub timestamp_us: u64,
    /// Wall-clock Unix timestamp in microseconds
    pub unix_us: u64,
    pub event_type: AuditEventType,
    pub details: serde_json::Value,
}

/// Thread-safe audit logger that writes to a JSONL file
pub struct AuditLogger {
    writer: Mutex<BufWriter<File>>,
    /// Last relay state recorded; repeated writes of it are not logged.
    last_power: Mutex<Option<MachinePowerState>>,
}

impl AuditLogger {
    /// Opens `path` in append mode, creating parent directories.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
            last_power: Mutex::new(None),
        })
    }

    pub fn log(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("audit writer poisoned"))?;
        serde_json::to_writer(&mut *writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn log_event(
        &self,
        timestamp_us: u64,
        unix_us: u64,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> std::io::Result<()> {
        self.log(AuditEntry {
            timestamp_us,
            unix_us,
            event_type,
            details,
        })
    }

    /// Records state changes and relay writes that changed the recorded power state.
    ///
    /// `Startup` re-asserts power off on every idle poll; only the first of
    /// those writes is logged.
    pub fn record_step(
        &self,
        timestamp_us: u64,
        unix_us: u64,
        step: &Step,
        actuation: &Actuation,
    ) -> std::io::Result<()> {
        if step.changed_state() {
            self.log_event(
                timestamp_us,
                unix_us,
                AuditEventType::StateTransition,
                serde_json::to_value(TransitionDetails::from(step))?,
            )?;
        }
        if let Some(power) = actuation.power_written.filter(|&p| self.power_changed(p)) {
            let event_type = match power {
                MachinePowerState::On => AuditEventType::MachinePowerOn,
                MachinePowerState::Off => AuditEventType::MachinePowerOff,
            };
            self.log_event(
                timestamp_us,
                unix_us,
                event_type,
                serde_json::json!({ "state": step.to }),
            )?;
        }
        Ok(())
    }

    fn power_changed(&self, power: MachinePowerState) -> bool {
        match self.last_power.lock() {
            Ok(mut last) => last.replace(power) != Some(power),
            Err(_) => true,
        }
    }
}

/// Details for a state transition event
#[derive(Debug, Clone, Serialize)]
pub struct TransitionDetails {
    pub from: interlock_core::InterlockState,
    pub to: interlock_core::InterlockState,
    pub compliant: bool,
    pub machine: interlock_core::MachineCommand,
    pub alarm: interlock_core::AlarmCommand,
}

impl From<&Step> for TransitionDetails {
    fn from(step: &Step) -> Self {
        Self {
            from: step.from,
            to: step.to,
            compliant: step.compliant,
            machine: step.machine,
            alarm: step.alarm,
        }
    }
}
