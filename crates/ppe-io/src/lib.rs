pub mod camera;
pub mod detector;
pub mod hal_modbus;
pub mod metrics;

pub use camera::{CameraDevice, CaptureSettings, CommandCamera, Rotation};
pub use detector::{CommandDetector, DetectedBox, DetectorSettings};
pub use hal_modbus::{AlarmChannels, LinkError, ModbusAlarm, ModbusLink, ModbusRelay, RelayConfig};
pub use metrics::{init_metrics, serve_metrics};
