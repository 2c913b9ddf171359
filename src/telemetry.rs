//! Outbound telemetry: named OSC messages over UDP, fire and forget.
//!
//! Both engines talk to a [`TelemetrySink`]. Sends never fail from the
//! caller's point of view; transport errors are logged and dropped.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use log::{debug, info};
use rosc::{encoder, OscMessage, OscPacket, OscType};

use crate::frame::{Side, SideReading, Vec3};

pub const ADDR_PLAY_STATUS: &str = "/playStatus";
pub const ADDR_CALIBRATING: &str = "/calibrating";
pub const ADDR_TIMESTAMP: &str = "/current_timestamp";
pub const ADDR_FILENAME: &str = "/filename";

pub fn accel_address(side: Side) -> String {
    format!("/raspi/{}/accel", side.label())
}

pub fn mag_address(side: Side) -> String {
    format!("/raspi/{}/mag", side.label())
}

pub fn gyro_address(side: Side) -> String {
    format!("/raspi/{}/gyro", side.label())
}

pub fn connection_address(side: Side) -> String {
    format!("/I2C/connection/{}", side.label())
}

/// Best-effort outbound message channel
pub trait TelemetrySink {
    /// Send one message. Must not block on acknowledgement or retry.
    fn send(&self, address: &str, args: Vec<OscType>);

    fn send_triple(&self, address: &str, values: &Vec3) {
        self.send(
            address,
            values.iter().map(|v| OscType::Float(*v as f32)).collect(),
        );
    }

    /// Emit the accel, mag and gyro groups for one side
    fn send_side(&self, side: Side, reading: &SideReading) {
        self.send_triple(&accel_address(side), &reading.accel);
        self.send_triple(&mag_address(side), &reading.mag);
        self.send_triple(&gyro_address(side), &reading.gyro);
    }

    fn send_flag(&self, address: &str, on: bool) {
        self.send(address, vec![OscType::Int(on as i32)]);
    }

    fn send_play_status(&self, playing: bool) {
        self.send_flag(ADDR_PLAY_STATUS, playing);
    }

    fn send_timestamp(&self, timestamp_ms: f64) {
        self.send(ADDR_TIMESTAMP, vec![OscType::Float(timestamp_ms as f32)]);
    }

    fn send_filename(&self, name: &str) {
        self.send(ADDR_FILENAME, vec![OscType::String(name.to_string())]);
    }
}

/// OSC/UDP client bound to an ephemeral local port
pub struct OscUdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscUdpSink {
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let target = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no address for {}:{}", host, port),
            )
        })?;

        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)?;

        info!("[OSC] Telemetry client ready for {}", target);
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl TelemetrySink for OscUdpSink {
    fn send(&self, address: &str, args: Vec<OscType>) {
        let packet = OscPacket::Message(OscMessage {
            addr: address.to_string(),
            args,
        });

        let bytes = match encoder::encode(&packet) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("[OSC] Failed to encode {}: {:?}", address, e);
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&bytes, self.target) {
            debug!("[OSC] Send to {} failed for {}: {}", self.target, address, e);
        }
    }
}

/// Sends the terminal `playStatus=0` when dropped.
///
/// Held for the lifetime of an engine run so the final status goes out on
/// every exit path: normal end, error return, cancellation or a dropped future.
pub struct TerminalStatus<S: TelemetrySink> {
    sink: Arc<S>,
}

impl<S: TelemetrySink> TerminalStatus<S> {
    pub fn arm(sink: Arc<S>) -> Self {
        Self { sink }
    }
}

impl<S: TelemetrySink> Drop for TerminalStatus<S> {
    fn drop(&mut self) {
        self.sink.send_play_status(false);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Clone, Debug)]
    pub struct Sent {
        pub at: Instant,
        pub address: String,
        pub args: Vec<OscType>,
    }

    /// In-memory sink that records every message, optionally stalling on one address
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<Sent>>,
        stall: Option<(String, Duration)>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Block for `cost` every time `address` is sent
        pub fn with_stall(address: &str, cost: Duration) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                stall: Some((address.to_string(), cost)),
            }
        }

        pub fn messages(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        pub fn to(&self, address: &str) -> Vec<Sent> {
            self.messages()
                .into_iter()
                .filter(|m| m.address == address)
                .collect()
        }

        pub fn play_statuses(&self) -> Vec<i32> {
            self.to(ADDR_PLAY_STATUS)
                .iter()
                .map(|m| match m.args.first() {
                    Some(OscType::Int(v)) => *v,
                    other => panic!("unexpected playStatus payload {:?}", other),
                })
                .collect()
        }
    }

    impl TelemetrySink for RecordingSink {
        fn send(&self, address: &str, args: Vec<OscType>) {
            let at = Instant::now();
            self.sent.lock().unwrap().push(Sent {
                at,
                address: address.to_string(),
                args,
            });
            if let Some((stalled, cost)) = &self.stall {
                if stalled == address {
                    std::thread::sleep(*cost);
                }
            }
        }
    }

    pub fn floats(args: &[OscType]) -> Vec<f32> {
        args.iter()
            .map(|a| match a {
                OscType::Float(v) => *v,
                other => panic!("expected float, got {:?}", other),
            })
            .collect()
    }
}
