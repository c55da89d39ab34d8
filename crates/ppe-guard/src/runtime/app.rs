use crate::infra::audit::{AuditEventType, AuditLogger};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::settings::{ConfigError, Settings};
use crate::runtime::telemetry;
use interlock_core::{
    is_compliant, AcquisitionError, ActuatorFacade, AlarmIndicator, Camera, DetectionResult,
    Detector, MachinePower, PollConfig, PollDriver, PollOutcome, PollStats, ScriptedDetector,
    SimulatedAlarm, SimulatedCamera, SimulatedRelay, TimeBase,
};
use ppe_io::{CommandCamera, CommandDetector, LinkError, ModbusAlarm, ModbusRelay};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("failed to open audit log {path}: {source}")]
    Audit {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("interlock thread panicked")]
    LoopPanicked,
}

impl StartupError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::from(2),
            Self::Link(_) => ExitCode::from(3),
            Self::Audit { .. } => ExitCode::from(4),
            Self::Acquisition(_) | Self::LoopPanicked => ExitCode::FAILURE,
        }
    }
}

type BoxedDriver = PollDriver<Box<dyn Camera>, Box<dyn Detector>, TimeBase>;

pub fn run_from_args() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ppe-guard: {} (see --help)", e);
            return ExitCode::from(2);
        }
    };
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> ExitCode {
    init_tracing(config.json_logs);

    match start(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "ppe-guard stopped");
            e.exit_code()
        }
    }
}

fn start(config: RuntimeConfig) -> Result<(), StartupError> {
    info!(path = %config.config_path.display(), "Loading configuration");
    let settings = Settings::load(&config.config_path)?;
    let timebase = TimeBase::new();

    if config.capture_only {
        return capture_only(&settings, &config.output_path, timebase);
    }

    settings.validate(config.simulate)?;

    if config.detect_once {
        return detect_once(&settings, config.simulate, timebase);
    }

    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let audit_logger = init_audit_logger(config.audit_path.as_ref())?;

    let poll_config = PollConfig {
        required: settings.required_set(),
        interlock: settings.interlock_config()?,
        min_cycle: settings.min_cycle(),
    };
    let (camera, detector) = build_acquisition(&settings, config.simulate, timebase);
    let actuators = build_actuators(&settings, config.simulate)?;

    if let Some(ref logger) = audit_logger {
        let required: Vec<_> = poll_config.required.iter().collect();
        if let Err(e) = logger.log_event(
            timebase.now_us(),
            timebase.unix_us(),
            AuditEventType::SystemStart,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "simulate": config.simulate,
                "required": required,
                "warn_grace_secs": poll_config.interlock.warn_grace.as_secs_f64(),
                "fault_grace_secs": poll_config.interlock.fault_grace.as_secs_f64(),
                "relay": actuators.has_machine(),
                "alarm": actuators.has_alarm(),
            }),
        ) {
            warn!(error = %e, "Failed to write audit entry");
        }
    }

    info!(
        required = poll_config.required.len(),
        warn_grace_s = poll_config.interlock.warn_grace.as_secs_f64(),
        fault_grace_s = poll_config.interlock.fault_grace.as_secs_f64(),
        relay = actuators.has_machine(),
        alarm = actuators.has_alarm(),
        simulate = config.simulate,
        "Starting interlock loop"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stop_loop = Arc::clone(&stop);
    let audit_loop = audit_logger.clone();

    let interlock_handle = thread::spawn(move || {
        let mut driver: BoxedDriver =
            PollDriver::new(camera, detector, actuators, poll_config, timebase);
        driver.run(&stop_loop, |outcome| {
            telemetry::record_outcome(outcome);
            if let (Some(logger), PollOutcome::Advanced { step, actuation }) =
                (audit_loop.as_ref(), outcome)
            {
                if let Err(e) =
                    logger.record_step(timebase.now_us(), timebase.unix_us(), step, actuation)
                {
                    warn!(error = %e, "Failed to write audit entry");
                }
            }
        });
        (driver.stats().clone(), driver.actuators().stats().write_errors)
    });

    info!("ppe-guard running");

    if let Some(seconds) = config.run_seconds {
        info!(seconds, "Running for limited duration");
        thread::sleep(Duration::from_secs(seconds));
        stop.store(true, Ordering::Relaxed);
    }

    let (stats, write_errors) = interlock_handle
        .join()
        .map_err(|_| StartupError::LoopPanicked)?;
    log_shutdown(&stats, write_errors, audit_logger.as_deref(), timebase);
    Ok(())
}

fn log_shutdown(
    stats: &PollStats,
    write_errors: u64,
    audit_logger: Option<&AuditLogger>,
    timebase: TimeBase,
) {
    info!(
        polls = stats.polls,
        compliant_polls = stats.compliant_polls,
        capture_failures = stats.capture_failures,
        detection_failures = stats.detection_failures,
        transitions = stats.transitions,
        write_errors,
        "Run complete"
    );

    if let Some(logger) = audit_logger {
        if let Err(e) = logger.log_event(
            timebase.now_us(),
            timebase.unix_us(),
            AuditEventType::SystemShutdown,
            serde_json::json!({
                "polls": stats.polls,
                "compliant_polls": stats.compliant_polls,
                "capture_failures": stats.capture_failures,
                "detection_failures": stats.detection_failures,
                "transitions": stats.transitions,
                "write_errors": write_errors,
            }),
        ) {
            warn!(error = %e, "Failed to write audit entry");
        }
    }
}

fn build_acquisition(
    settings: &Settings,
    simulate: bool,
    timebase: TimeBase,
) -> (Box<dyn Camera>, Box<dyn Detector>) {
    if simulate {
        info!("Simulated camera; every frame shows the full required set");
        let everything = DetectionResult::new(settings.required_set().iter().collect());
        (
            Box::new(SimulatedCamera::new(timebase)),
            Box::new(ScriptedDetector::constant(everything)),
        )
    } else {
        (
            Box::new(CommandCamera::new(settings.capture_settings(), timebase)),
            Box::new(CommandDetector::new(settings.detector_settings())),
        )
    }
}

fn build_actuators(settings: &Settings, simulate: bool) -> Result<ActuatorFacade, LinkError> {
    let machine: Option<Box<dyn MachinePower>> = match (&settings.links.relay_addr, simulate) {
        (_, true) => Some(Box::new(SimulatedRelay::new())),
        (Some(addr), false) => {
            info!(addr = %addr, "Connecting to relay bank");
            Some(Box::new(ModbusRelay::connect(addr, settings.relay_config())?))
        }
        (None, false) => {
            warn!("No relay link configured; machine power is not controlled");
            None
        }
    };

    let alarm: Option<Box<dyn AlarmIndicator>> = match (&settings.links.alarm_addr, simulate) {
        (_, true) => Some(Box::new(SimulatedAlarm::new())),
        (Some(addr), false) => match settings.alarm_channels() {
            Some(channels) => {
                info!(addr = %addr, "Connecting to alarm tower");
                Some(Box::new(ModbusAlarm::connect(addr, channels)?))
            }
            None => None,
        },
        (None, false) => {
            warn!("No alarm link configured; indication is log-only");
            None
        }
    };

    Ok(ActuatorFacade::new(machine, alarm))
}

fn capture_only(settings: &Settings, output: &Path, timebase: TimeBase) -> Result<(), StartupError> {
    let mut camera = CommandCamera::new(settings.capture_settings(), timebase);
    let frame = camera.capture_to(output)?;
    info!(path = %frame.path.display(), "Frame captured");
    println!("{}", frame.path.display());
    Ok(())
}

fn detect_once(settings: &Settings, simulate: bool, timebase: TimeBase) -> Result<(), StartupError> {
    let (mut camera, mut detector) = build_acquisition(settings, simulate, timebase);
    let required = settings.required_set();

    let frame = camera.capture()?;
    let detected = detector.infer(&frame)?;
    let compliant = is_compliant(&required, Some(&detected));

    println!("frame: {}", frame.path.display());
    for tag in detected.tags() {
        println!("detected: {} ({})", tag, tag.name().unwrap_or("unknown class"));
    }
    for tag in detected.missing(&required) {
        println!("missing: {} ({})", tag, tag.name().unwrap_or("unknown class"));
    }
    println!("compliant: {}", compliant);
    Ok(())
}

fn init_audit_logger(audit_path: Option<&PathBuf>) -> Result<Option<Arc<AuditLogger>>, StartupError> {
    let Some(path) = audit_path else {
        return Ok(None);
    };
    let logger = AuditLogger::new(path).map_err(|source| StartupError::Audit {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "Audit logging enabled");
    Ok(Some(Arc::new(logger)))
}
