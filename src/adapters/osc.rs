//! OSC-over-UDP telemetry adapter.
//!
//! Implements [`TelemetrySink`] by sending one OSC message per value to a
//! listener such as SuperCollider.  Only the subset of OSC 1.0 needed here
//! is encoded: an address pattern and a single float32 argument.
//!
//! ```text
//! ┌──────────────────────┬──────────────┬──────────────┐
//! │ address\0 + pad to 4 │ ",f\0\0"     │ f32 big-end. │
//! └──────────────────────┴──────────────┴──────────────┘
//! ```

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use heapless::Vec;
use log::info;

use crate::app::ports::TelemetrySink;
use crate::error::TelemetryError;

/// Largest packet we build; bounds the address to about 110 bytes.
pub const MAX_PACKET: usize = 128;

const FLOAT_TYPE_TAG: [u8; 4] = *b",f\0\0";

/// Encode `address` + one float argument as an OSC message.
pub fn encode_message(address: &str, value: f32) -> Result<Vec<u8, MAX_PACKET>, TelemetryError> {
    if !address.starts_with('/') {
        return Err(TelemetryError::Encode("OSC address must start with '/'"));
    }
    if address.bytes().any(|b| b == 0) {
        return Err(TelemetryError::Encode("OSC address contains NUL"));
    }

    const TOO_LONG: TelemetryError = TelemetryError::Encode("OSC packet too large");
    let mut packet: Vec<u8, MAX_PACKET> = Vec::new();
    packet
        .extend_from_slice(address.as_bytes())
        .map_err(|()| TOO_LONG)?;
    // OSC strings are NUL-terminated and padded to a 4-byte boundary.
    packet.push(0).map_err(|_| TOO_LONG)?;
    while packet.len() % 4 != 0 {
        packet.push(0).map_err(|_| TOO_LONG)?;
    }
    packet
        .extend_from_slice(&FLOAT_TYPE_TAG)
        .map_err(|()| TOO_LONG)?;
    packet
        .extend_from_slice(&value.to_be_bytes())
        .map_err(|()| TOO_LONG)?;
    Ok(packet)
}

/// Connectionless OSC client.
pub struct OscUdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscUdpSink {
    /// Resolve `host:port` and bind an ephemeral local socket.
    pub fn new(host: &str, port: u16) -> Result<Self, TelemetryError> {
        let target = (host, port)
            .to_socket_addrs()
            .map_err(|e| TelemetryError::Io(format!("resolve {host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| TelemetryError::Io(format!("{host}:{port} resolved to nothing")))?;
        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).map_err(|e| TelemetryError::Io(e.to_string()))?;
        info!("OSC telemetry → {target}");
        Ok(Self { socket, target })
    }
}

impl TelemetrySink for OscUdpSink {
    fn send(&mut self, address: &str, value: f32) -> Result<(), TelemetryError> {
        let packet = encode_message(address, value)?;
        self.socket
            .send_to(&packet, self.target)
            .map_err(|e| TelemetryError::Io(e.to_string()))?;
        Ok(())
    }
}
