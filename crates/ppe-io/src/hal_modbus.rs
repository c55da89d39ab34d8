//! Relay and alarm-tower controllers reached over Modbus TCP.
//!
//! Relays are coils. Alarm LED channels are PWM duty holding registers
//! (0-255) and the buzzer is a coil.

use interlock_core::{ActuatorError, AlarmIndication, AlarmIndicator, MachinePower, MachinePowerState};
use serde::Deserialize;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info};

pub const DUTY_FULL: u16 = 255;
/// Green duty mixed with full red to read as orange.
pub const DUTY_ORANGE_GREEN: u16 = 80;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid Modbus address '{0}'")]
    InvalidAddress(String),

    #[error("failed to start I/O runtime: {0}")]
    Runtime(std::io::Error),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("initial write to {addr} failed: {source}")]
    Prime {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Blocking Modbus TCP client. Owns a current-thread runtime so callers stay synchronous.
pub struct ModbusLink {
    addr: SocketAddr,
    runtime: Runtime,
    ctx: Context,
}

impl ModbusLink {
    pub fn connect(addr: &str) -> Result<Self, LinkError> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| LinkError::InvalidAddress(addr.to_string()))?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(LinkError::Runtime)?;
        let ctx = runtime
            .block_on(tcp::connect(addr))
            .map_err(|source| LinkError::Connect { addr, source })?;
        info!(addr = %addr, "Connected to Modbus controller");
        Ok(Self { addr, runtime, ctx })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn write_coil(&mut self, coil: u16, level: bool) -> std::io::Result<()> {
        self.runtime.block_on(self.ctx.write_single_coil(coil, level))
    }

    pub fn write_register(&mut self, register: u16, value: u16) -> std::io::Result<()> {
        self.runtime
            .block_on(self.ctx.write_single_register(register, value))
    }
}

/// Coil level that realises `state` on a relay of the given wiring.
pub fn relay_level(state: MachinePowerState, normally_open: bool) -> bool {
    let energise = state == MachinePowerState::On;
    // Normally-open boards are active low.
    energise != normally_open
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    pub coils: Vec<u16>,
    #[serde(default)]
    pub normally_open: bool,
}

/// Machine power relay bank. Every coil follows the same state.
pub struct ModbusRelay {
    link: ModbusLink,
    config: RelayConfig,
}

impl ModbusRelay {
    /// Connects and drives every relay off.
    pub fn connect(addr: &str, config: RelayConfig) -> Result<Self, LinkError> {
        let link = ModbusLink::connect(addr)?;
        let mut relay = Self { link, config };
        relay
            .write_all(MachinePowerState::Off)
            .map_err(|source| LinkError::Prime {
                addr: relay.link.addr(),
                source,
            })?;
        Ok(relay)
    }

    fn write_all(&mut self, state: MachinePowerState) -> std::io::Result<()> {
        let level = relay_level(state, self.config.normally_open);
        for &coil in &self.config.coils {
            self.link.write_coil(coil, level)?;
        }
        debug!(?state, level, coils = ?self.config.coils, "Relay bank written");
        Ok(())
    }
}

impl MachinePower for ModbusRelay {
    fn set_power(&mut self, state: MachinePowerState) -> Result<(), ActuatorError> {
        self.write_all(state).map_err(ActuatorError::from)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AlarmChannels {
    pub red: u16,
    pub green: u16,
    /// Standby lamp shown while the alarm is off.
    #[serde(default)]
    pub blue: Option<u16>,
    pub buzzer: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLevels {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub buzzer: bool,
}

impl ChannelLevels {
    pub fn for_indication(indication: AlarmIndication) -> Self {
        let dark = ChannelLevels {
            red: 0,
            green: 0,
            blue: 0,
            buzzer: false,
        };
        match indication {
            AlarmIndication::Off => ChannelLevels {
                blue: DUTY_FULL,
                ..dark
            },
            AlarmIndication::Green => ChannelLevels {
                green: DUTY_FULL,
                ..dark
            },
            AlarmIndication::Orange { sound } => ChannelLevels {
                red: DUTY_FULL,
                green: DUTY_ORANGE_GREEN,
                buzzer: sound,
                ..dark
            },
            AlarmIndication::Red { sound } => ChannelLevels {
                red: DUTY_FULL,
                buzzer: sound,
                ..dark
            },
        }
    }
}

/// RGB alarm tower with buzzer.
pub struct ModbusAlarm {
    link: ModbusLink,
    channels: AlarmChannels,
}

impl ModbusAlarm {
    /// Connects and darkens every channel.
    pub fn connect(addr: &str, channels: AlarmChannels) -> Result<Self, LinkError> {
        let link = ModbusLink::connect(addr)?;
        let mut alarm = Self { link, channels };
        let dark = ChannelLevels {
            red: 0,
            green: 0,
            blue: 0,
            buzzer: false,
        };
        alarm.write_levels(dark).map_err(|source| LinkError::Prime {
            addr: alarm.link.addr(),
            source,
        })?;
        Ok(alarm)
    }

    fn write_levels(&mut self, levels: ChannelLevels) -> std::io::Result<()> {
        self.link.write_register(self.channels.red, levels.red)?;
        self.link.write_register(self.channels.green, levels.green)?;
        if let Some(blue) = self.channels.blue {
            self.link.write_register(blue, levels.blue)?;
        }
        self.link.write_coil(self.channels.buzzer, levels.buzzer)
    }
}

impl AlarmIndicator for ModbusAlarm {
    fn set_indication(&mut self, indication: AlarmIndication) -> Result<(), ActuatorError> {
        let levels = ChannelLevels::for_indication(indication);
        debug!(?indication, ?levels, "Alarm tower written");
        self.write_levels(levels).map_err(ActuatorError::from)
    }
}
