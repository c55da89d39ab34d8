use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgError {
    #[error("{0} expects a value")]
    MissingValue(String),

    #[error("invalid value '{value}' for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument '{0}'")]
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub config_path: PathBuf,
    pub run_seconds: Option<u64>,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
    pub simulate: bool,
    pub capture_only: bool,
    pub output_path: PathBuf,
    pub detect_once: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            config_path: PathBuf::from("./ppe-guard.toml"),
            run_seconds: None,
            json_logs: false,
            metrics_addr: None,
            audit_path: None,
            simulate: false,
            capture_only: false,
            output_path: PathBuf::from("./images/photo.jpg"),
            detect_once: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ArgError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Result<Self, ArgError> {
        let mut cfg = RuntimeConfig::default();
        let mut rest = args.iter().skip(1);
        while let Some(arg) = rest.next() {
            let flag = arg.as_str();
            let mut value = || rest.next().ok_or(ArgError::MissingValue(arg.clone()));
            match flag {
                "--config" | "-c" => cfg.config_path = PathBuf::from(value()?),
                "--run-seconds" => {
                    let raw = value()?;
                    let seconds = raw.parse::<u64>().map_err(|_| ArgError::InvalidValue {
                        flag: arg.clone(),
                        value: raw.clone(),
                    })?;
                    cfg.run_seconds = Some(seconds);
                }
                "--json-logs" => cfg.json_logs = true,
                "--metrics-addr" => cfg.metrics_addr = Some(value()?.clone()),
                "--audit-log" => cfg.audit_path = Some(PathBuf::from(value()?)),
                "--simulate" => cfg.simulate = true,
                "--capture-only" => cfg.capture_only = true,
                "--output" | "-o" => cfg.output_path = PathBuf::from(value()?),
                "--detect-once" => cfg.detect_once = true,
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => return Err(ArgError::Unknown(arg.clone())),
            }
        }
        Ok(cfg)
    }

    pub fn print_help() {
        println!(
            r#"ppe-guard - PPE-conditioned machine power interlock

USAGE:
    ppe-guard [OPTIONS]

OPTIONS:
    -c, --config <PATH>     Configuration file (TOML) [default: ./ppe-guard.toml]
    --run-seconds <SECS>    Run for a fixed duration then exit
    --json-logs             Output logs in JSON format (for log aggregation)
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>      Enable audit logging to specified JSONL file
    --simulate              Use a simulated camera, detector and actuators (no hardware)
    --capture-only          Take one photo and exit
    -o, --output <PATH>     Where --capture-only stores the photo [default: ./images/photo.jpg]
    --detect-once           Take one photo, print the detected PPE and exit
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,interlock_core=trace)

EXAMPLES:
    # Production run with observability
    ppe-guard --config /etc/ppe-guard.toml --json-logs --metrics-addr 0.0.0.0:9090 \
        --audit-log /var/log/ppe-guard/audit.jsonl

    # Check camera framing
    ppe-guard --capture-only --output ./images/framing.jpg

    # Short dry run without hardware
    ppe-guard --simulate --run-seconds 10
"#
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("ppe-guard")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_without_flags() {
        let cfg = RuntimeConfig::from_args(&args(&[])).unwrap();
        assert_eq!(cfg.config_path, PathBuf::from("./ppe-guard.toml"));
        assert!(!cfg.simulate);
        assert_eq!(cfg.run_seconds, None);
    }

    #[test]
    fn parses_flags_and_values() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--config",
            "/etc/guard.toml",
            "--run-seconds",
            "5",
            "--simulate",
            "--audit-log",
            "audit.jsonl",
            "--capture-only",
            "-o",
            "shot.jpg",
        ]))
        .unwrap();
        assert_eq!(cfg.config_path, PathBuf::from("/etc/guard.toml"));
        assert_eq!(cfg.run_seconds, Some(5));
        assert!(cfg.simulate);
        assert!(cfg.capture_only);
        assert_eq!(cfg.audit_path, Some(PathBuf::from("audit.jsonl")));
        assert_eq!(cfg.output_path, PathBuf::from("shot.jpg"));
    }

    #[test]
    fn help_stops_parsing() {
        let cfg = RuntimeConfig::from_args(&args(&["-h", "--simulate"])).unwrap();
        assert!(cfg.show_help);
        assert!(!cfg.simulate);
    }

    #[test]
    fn malformed_run_seconds_is_rejected() {
        assert_eq!(
            RuntimeConfig::from_args(&args(&["--run-seconds", "abc"])).unwrap_err(),
            ArgError::InvalidValue {
                flag: "--run-seconds".into(),
                value: "abc".into(),
            }
        );
        assert!(RuntimeConfig::from_args(&args(&["--run-seconds", "-5"])).is_err());
    }

    #[test]
    fn flag_without_value_is_rejected() {
        assert_eq!(
            RuntimeConfig::from_args(&args(&["--simulate", "--config"])).unwrap_err(),
            ArgError::MissingValue("--config".into())
        );
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert_eq!(
            RuntimeConfig::from_args(&args(&["--simulte"])).unwrap_err(),
            ArgError::Unknown("--simulte".into())
        );
    }
}
