use interlock_core::{AlarmIndication, AlarmIndicator, MachinePower, MachinePowerState};
use ppe_io::{AlarmChannels, ModbusAlarm, ModbusRelay, RelayConfig};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

const WRITE_SINGLE_COIL: u8 = 0x05;
const WRITE_SINGLE_REGISTER: u8 = 0x06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Written {
    Coil(u16, bool),
    Register(u16, u16),
}

/// Minimal Modbus TCP controller: records single-coil and single-register
/// writes and echoes each request back, as a real controller acknowledges them.
struct Controller {
    addr: String,
    written: Arc<Mutex<Vec<Written>>>,
}

impl Controller {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind controller");
        let addr = listener.local_addr().unwrap().to_string();
        let written = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&written);

        thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            loop {
                let mut header = [0u8; 7];
                if stream.read_exact(&mut header).is_err() {
                    return;
                }
                let len = u16::from_be_bytes([header[4], header[5]]) as usize;
                let mut pdu = vec![0u8; len.saturating_sub(1)];
                if stream.read_exact(&mut pdu).is_err() {
                    return;
                }

                let address = u16::from_be_bytes([pdu[1], pdu[2]]);
                let value = u16::from_be_bytes([pdu[3], pdu[4]]);
                let entry = match pdu[0] {
                    WRITE_SINGLE_COIL => Written::Coil(address, value == 0xFF00),
                    WRITE_SINGLE_REGISTER => Written::Register(address, value),
                    other => panic!("unexpected function code {:#04x}", other),
                };
                log.lock().unwrap().push(entry);

                if stream.write_all(&header).is_err() || stream.write_all(&pdu).is_err() {
                    return;
                }
            }
        });

        Self { addr, written }
    }

    fn take(&self) -> Vec<Written> {
        std::mem::take(&mut *self.written.lock().unwrap())
    }
}

#[test]
fn relay_bank_is_driven_off_on_connect_and_follows_power() {
    let controller = Controller::start();
    let mut relay = ModbusRelay::connect(
        &controller.addr,
        RelayConfig {
            coils: vec![3, 1],
            normally_open: true,
        },
    )
    .expect("relay should connect");

    // Normally-open wiring: off is a high coil.
    assert_eq!(
        controller.take(),
        vec![Written::Coil(3, true), Written::Coil(1, true)]
    );

    relay.set_power(MachinePowerState::On).unwrap();
    assert_eq!(
        controller.take(),
        vec![Written::Coil(3, false), Written::Coil(1, false)]
    );
}

#[test]
fn alarm_tower_is_darkened_on_connect_and_shows_orange() {
    let controller = Controller::start();
    let mut alarm = ModbusAlarm::connect(
        &controller.addr,
        AlarmChannels {
            red: 10,
            green: 11,
            blue: Some(12),
            buzzer: 4,
        },
    )
    .expect("alarm should connect");

    assert_eq!(
        controller.take(),
        vec![
            Written::Register(10, 0),
            Written::Register(11, 0),
            Written::Register(12, 0),
            Written::Coil(4, false),
        ]
    );

    alarm
        .set_indication(AlarmIndication::Orange { sound: true })
        .unwrap();
    assert_eq!(
        controller.take(),
        vec![
            Written::Register(10, 255),
            Written::Register(11, 80),
            Written::Register(12, 0),
            Written::Coil(4, true),
        ]
    );

    alarm.set_indication(AlarmIndication::Off).unwrap();
    assert_eq!(
        controller.take(),
        vec![
            Written::Register(10, 0),
            Written::Register(11, 0),
            Written::Register(12, 255),
            Written::Coil(4, false),
        ]
    );
}

#[test]
fn unreachable_controller_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    assert!(ModbusRelay::connect(
        &addr,
        RelayConfig {
            coils: vec![0],
            normally_open: false,
        },
    )
    .is_err());
}
