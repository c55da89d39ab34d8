//! Deployment settings loaded from the TOML configuration file.

use interlock_core::{InterlockConfig, PpeTag, RequiredSet};
use ppe_io::{AlarmChannels, CameraDevice, CaptureSettings, DetectorSettings, RelayConfig, Rotation};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no required PPE configured ([ppe] required is empty)")]
    NoRequiredPpe,

    #[error("no detection model configured ([detector] command and model are required)")]
    NoModel,

    #[error("no capture command configured ([camera] command)")]
    NoCaptureCommand,

    #[error("min_confidence must be within 0..=1, got {0}")]
    InvalidConfidence(f32),

    #[error("{name} must be a non-negative number of seconds a Duration can hold, got {value}")]
    InvalidGrace { name: &'static str, value: f64 },

    #[error("relay link configured but [relay] coils is empty")]
    NoRelayCoils,

    #[error("alarm link configured but [alarm] red/green/buzzer channels are incomplete")]
    IncompleteAlarm,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkSection {
    pub relay_addr: Option<String>,
    pub alarm_addr: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelaySection {
    pub coils: Vec<u16>,
    pub normally_open: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlarmSection {
    pub red: Option<u16>,
    pub green: Option<u16>,
    pub blue: Option<u16>,
    pub buzzer: Option<u16>,
    pub warn_grace_secs: f64,
    pub fault_grace_secs: f64,
    pub warn_sound: bool,
    pub fault_sound: bool,
}

impl Default for AlarmSection {
    fn default() -> Self {
        Self {
            red: None,
            green: None,
            blue: None,
            buzzer: None,
            warn_grace_secs: 15.0,
            fault_grace_secs: 15.0,
            warn_sound: false,
            fault_sound: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorSection {
    pub command: Vec<String>,
    pub model: Option<String>,
    pub min_confidence: f32,
    pub image_dir: PathBuf,
    pub save_images: bool,
    pub image_prefix: String,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            model: None,
            min_confidence: 0.5,
            image_dir: PathBuf::from("./images"),
            save_images: false,
            image_prefix: "frame".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraSection {
    pub command: Vec<String>,
    pub device: CameraDevice,
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            device: CameraDevice::default(),
            index: 0,
            width: 640,
            height: 480,
            rotation: Rotation::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PpeSection {
    pub required: Vec<PpeTag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSection {
    pub min_cycle_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub links: LinkSection,
    pub relay: RelaySection,
    pub alarm: AlarmSection,
    pub detector: DetectorSection,
    pub camera: CameraSection,
    pub ppe: PpeSection,
    pub poll: PollSection,
}

/// Negative, NaN and values beyond `Duration::MAX` are rejected.
fn grace(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidGrace { name, value })
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Checks the preconditions for starting the interlock. Simulation needs no
    /// camera or model.
    pub fn validate(&self, simulate: bool) -> Result<(), ConfigError> {
        if self.ppe.required.is_empty() {
            return Err(ConfigError::NoRequiredPpe);
        }
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(ConfigError::InvalidConfidence(self.detector.min_confidence));
        }
        self.interlock_config()?;
        if self.links.relay_addr.is_some() && self.relay.coils.is_empty() {
            return Err(ConfigError::NoRelayCoils);
        }
        if self.links.alarm_addr.is_some() && self.alarm_channels().is_none() {
            return Err(ConfigError::IncompleteAlarm);
        }
        if simulate {
            return Ok(());
        }
        if self.detector.command.is_empty() || self.detector.model.is_none() {
            return Err(ConfigError::NoModel);
        }
        if self.camera.command.is_empty() {
            return Err(ConfigError::NoCaptureCommand);
        }
        Ok(())
    }

    pub fn required_set(&self) -> RequiredSet {
        RequiredSet::new(self.ppe.required.iter().copied())
    }

    pub fn interlock_config(&self) -> Result<InterlockConfig, ConfigError> {
        Ok(InterlockConfig {
            warn_grace: grace("warn_grace_secs", self.alarm.warn_grace_secs)?,
            fault_grace: grace("fault_grace_secs", self.alarm.fault_grace_secs)?,
            warn_sound: self.alarm.warn_sound,
            fault_sound: self.alarm.fault_sound,
        })
    }

    pub fn min_cycle(&self) -> Duration {
        Duration::from_millis(self.poll.min_cycle_ms)
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            coils: self.relay.coils.clone(),
            normally_open: self.relay.normally_open,
        }
    }

    pub fn alarm_channels(&self) -> Option<AlarmChannels> {
        Some(AlarmChannels {
            red: self.alarm.red?,
            green: self.alarm.green?,
            blue: self.alarm.blue,
            buzzer: self.alarm.buzzer?,
        })
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            command: self.camera.command.clone(),
            device: self.camera.device,
            index: self.camera.index,
            width: self.camera.width,
            height: self.camera.height,
            rotation: self.camera.rotation,
            image_dir: self.detector.image_dir.clone(),
            image_prefix: self.detector.image_prefix.clone(),
            save_images: self.detector.save_images,
        }
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            command: self.detector.command.clone(),
            model: self.detector.model.clone(),
            min_confidence: self.detector.min_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interlock_core::tags::{GLOVE, HELMET};

    const FULL: &str = r#"
        [links]
        relay_addr = "127.0.0.1:1502"
        alarm_addr = "127.0.0.1:1503"

        [relay]
        coils = [0, 1, 2, 3]
        normally_open = true

        [alarm]
        red = 0
        green = 1
        blue = 2
        buzzer = 0
        warn_grace_secs = 10
        fault_grace_secs = 20.5
        warn_sound = false
        fault_sound = true

        [detector]
        command = ["python3", "detect.py", "{model}", "{image}"]
        model = "ppe.pt"
        min_confidence = 0.6
        image_prefix = "press-1"

        [camera]
        command = ["libcamera-still", "-o", "{output}"]
        device = "usbcamera"
        rotation = "left"

        [ppe]
        required = ["helmet", "glove", "helmet"]
    "#;

    #[test]
    fn parses_full_file() {
        let settings = Settings::parse(FULL).unwrap();
        settings.validate(false).unwrap();

        let interlock = settings.interlock_config().unwrap();
        assert_eq!(interlock.warn_grace, Duration::from_secs(10));
        assert_eq!(interlock.fault_grace, Duration::from_millis(20_500));
        assert!(interlock.fault_sound);

        let required = settings.required_set();
        assert_eq!(required.iter().collect::<Vec<_>>(), vec![HELMET, GLOVE]);

        let channels = settings.alarm_channels().unwrap();
        assert_eq!(channels.blue, Some(2));
        assert!(settings.relay_config().normally_open);
        assert_eq!(settings.capture_settings().rotation, Rotation::Left);
        assert_eq!(settings.capture_settings().device, CameraDevice::Usbcamera);
    }

    #[test]
    fn fault_grace_is_independent_of_warn_grace() {
        let settings = Settings::parse(
            r#"
            [alarm]
            warn_grace_secs = 5
            fault_grace_secs = 60
            "#,
        )
        .unwrap();
        let interlock = settings.interlock_config().unwrap();
        assert_eq!(interlock.warn_grace, Duration::from_secs(5));
        assert_eq!(interlock.fault_grace, Duration::from_secs(60));
    }

    #[test]
    fn empty_required_set_is_rejected() {
        let settings = Settings::parse("").unwrap();
        assert!(matches!(
            settings.validate(true),
            Err(ConfigError::NoRequiredPpe)
        ));
    }

    #[test]
    fn missing_model_is_rejected_outside_simulation() {
        let settings = Settings::parse("[ppe]\nrequired = [\"helmet\"]").unwrap();
        assert!(settings.validate(true).is_ok());
        assert!(matches!(settings.validate(false), Err(ConfigError::NoModel)));
    }

    #[test]
    fn relay_link_without_coils_is_rejected() {
        let settings = Settings::parse(
            r#"
            [links]
            relay_addr = "127.0.0.1:502"
            [ppe]
            required = [0]
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.validate(true),
            Err(ConfigError::NoRelayCoils)
        ));
    }

    #[test]
    fn negative_grace_is_rejected() {
        let settings = Settings::parse(
            r#"
            [alarm]
            warn_grace_secs = -1
            [ppe]
            required = ["glove"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.validate(true),
            Err(ConfigError::InvalidGrace { .. })
        ));
    }

    #[test]
    fn huge_grace_is_rejected() {
        let settings = Settings::parse(
            r#"
            [alarm]
            fault_grace_secs = 1e30
            [ppe]
            required = ["helmet"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.validate(true),
            Err(ConfigError::InvalidGrace {
                name: "fault_grace_secs",
                ..
            })
        ));
    }

    #[test]
    fn unknown_tags_fail_to_parse() {
        assert!(Settings::parse("[ppe]\nrequired = [\"cape\"]").is_err());
    }

    #[test]
    fn shipped_example_config_is_valid() {
        let settings =
            Settings::parse(include_str!("../../../../config/ppe-guard.example.toml")).unwrap();
        settings.validate(false).unwrap();
        assert_eq!(settings.required_set().len(), 3);
        assert_eq!(settings.min_cycle(), Duration::from_millis(200));
    }
}
