//! Prometheus metrics for the PPE interlock.
//!
//! Covers the poll loop, the interlock state and the actuator links.

use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

fn gauge(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(name, help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

// ============================================================================
// Poll Loop Metrics
// ============================================================================

/// Poll iterations started
pub static POLLS: LazyLock<IntCounter> =
    LazyLock::new(|| counter("ppeguard_polls_total", "Poll iterations started"));

/// Iterations skipped because the camera produced no frame
pub static CAPTURE_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "ppeguard_capture_failures_total",
        "Poll iterations skipped because image capture failed",
    )
});

/// Iterations skipped because inference failed
pub static DETECTION_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "ppeguard_detection_failures_total",
        "Poll iterations skipped because detection failed",
    )
});

/// Frames where every required PPE class was present
pub static COMPLIANT_POLLS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "ppeguard_compliant_polls_total",
        "Frames in which every required PPE class was detected",
    )
});

// ============================================================================
// Interlock Metrics
// ============================================================================

/// Interlock state changes
pub static TRANSITIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "ppeguard_state_transitions_total",
        "Interlock state transitions",
    )
});

/// Interlock state (0=startup,1=compliant,2=warning,3=fault)
pub static INTERLOCK_STATE: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "ppeguard_interlock_state",
        "Interlock state (0=startup,1=compliant,2=warning,3=fault)",
    )
});

// ============================================================================
// Actuator Metrics
// ============================================================================

/// Commanded machine power (1 = on, 0 = off)
pub static MACHINE_POWER: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "ppeguard_machine_power",
        "Last machine power written to the relay (1=on, 0=off)",
    )
});

/// Alarm indication (0=off,1=green,2=orange,3=red)
pub static ALARM_INDICATION: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "ppeguard_alarm_indication",
        "Last alarm indication written (0=off,1=green,2=orange,3=red)",
    )
});

/// Buzzer state (1 = sounding)
pub static ALARM_SOUND: LazyLock<Gauge> =
    LazyLock::new(|| gauge("ppeguard_alarm_sound", "Alarm buzzer state (1=sounding)"));

/// Failed relay or alarm writes
pub static ACTUATOR_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "ppeguard_actuator_write_errors_total",
        "Relay or alarm writes that failed",
    )
});

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();

                    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let mut response = Response::from_data(buffer);
                    if let Ok(header) = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once a frame has been evaluated
                    if POLLS.get() > CAPTURE_FAILURES.get() + DETECTION_FAILURES.get() {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = POLLS.get();
    let _ = CAPTURE_FAILURES.get();
    let _ = DETECTION_FAILURES.get();
    let _ = COMPLIANT_POLLS.get();
    let _ = TRANSITIONS.get();
    let _ = INTERLOCK_STATE.get();
    let _ = MACHINE_POWER.get();
    let _ = ALARM_INDICATION.get();
    let _ = ALARM_SOUND.get();
    let _ = ACTUATOR_ERRORS.get();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exposes_interlock_metrics() {
        init_metrics();
        INTERLOCK_STATE.set(2.0);
        let names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"ppeguard_interlock_state".to_string()));
        assert!(names.contains(&"ppeguard_polls_total".to_string()));
    }
}
