//! Encoder/decoder between a structured [`Message`] and a packetizer frame
//! body.
//!
//! Both directions are pure functions of a [`CodecConfig`]: nothing here
//! owns a driver, a socket, or any mutable state. A failure is reported
//! through an [`EventManager`] and surfaced to the caller as `None`,
//! never a panic or a `Result` — device-capability mismatches and
//! malformed wire bytes are operational failures, not programmer errors.

use bytemuck::{Pod, Zeroable};
use viface_events::{DeviceSerial, EventManager, EventType, Severity};

/// Longest data payload a classic (non-FD) CAN frame can carry.
pub const MAX_CLASSIC_DATA_LEN: usize = 8;
/// Longest data payload a CAN-FD frame can carry.
pub const MAX_FD_DATA_LEN: usize = 64;

/// Device capabilities the codec must respect.
#[derive(Clone, Copy, Debug)]
pub struct CodecConfig {
    /// Whether the target device accepts CAN-FD frames at all.
    pub support_canfd: bool,
    /// Nanoseconds represented by one on-wire timestamp tick.
    pub timestamp_resolution_ns: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            support_canfd: false,
            timestamp_resolution_ns: 1,
        }
    }
}

/// A decoded (or to-be-encoded) network message, independent of any wire
/// representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub network_id: u8,
    pub arbitration_id: u32,
    pub extended: bool,
    pub remote: bool,
    pub fd: bool,
    pub bitrate_switch: bool,
    pub data: Vec<u8>,
    pub timestamp_ns: u64,
}

const FLAG_EXTENDED: u8 = 0b0001;
const FLAG_REMOTE: u8 = 0b0010;
const FLAG_FD: u8 = 0b0100;
const FLAG_BRS: u8 = 0b1000;

/// Fixed-size prefix of a packetizer frame body carrying one message.
/// Multi-byte fields are raw little-endian byte arrays so the struct has
/// no alignment padding, matching the teacher's wire-struct convention.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct WireHeader {
    network_id: u8,
    flags: u8,
    data_len: u8,
    _reserved: u8,
    arbitration_id: [u8; 4],
    timestamp_ticks: [u8; 8],
}

const HEADER_LEN: usize = std::mem::size_of::<WireHeader>();

/// Encode `message` into a packetizer frame body, or report a failure and
/// return `None`.
///
/// Reports `CANFDNotSupported` for an FD frame on a non-FD-capable
/// device, `RTRNotSupported` for a remote FD frame (RTR does not exist on
/// CAN-FD), and `MessageFormattingError` / `MessageMaxLengthExceeded` for
/// data that doesn't fit the frame kind.
pub fn encode(
    config: &CodecConfig,
    message: &Message,
    events: &EventManager,
    serial: Option<DeviceSerial>,
) -> Option<Vec<u8>> {
    if message.fd && !config.support_canfd {
        events.add(EventType::CANFDNotSupported, Severity::Error, serial);
        return None;
    }
    if message.fd && message.remote {
        events.add(EventType::RTRNotSupported, Severity::Error, serial);
        return None;
    }
    let max_len = if message.fd {
        MAX_FD_DATA_LEN
    } else {
        MAX_CLASSIC_DATA_LEN
    };
    if message.data.len() > max_len {
        events.add(EventType::MessageMaxLengthExceeded, Severity::Error, serial);
        return None;
    }
    let data_len: u8 = match message.data.len().try_into() {
        Ok(n) => n,
        Err(_) => {
            events.add(EventType::MessageFormattingError, Severity::Error, serial);
            return None;
        }
    };

    let mut flags = 0u8;
    if message.extended {
        flags |= FLAG_EXTENDED;
    }
    if message.remote {
        flags |= FLAG_REMOTE;
    }
    if message.fd {
        flags |= FLAG_FD;
    }
    if message.bitrate_switch {
        flags |= FLAG_BRS;
    }

    let ticks = message
        .timestamp_ns
        .checked_div(config.timestamp_resolution_ns.max(1))
        .unwrap_or(0);

    let header = WireHeader {
        network_id: message.network_id,
        flags,
        data_len,
        _reserved: 0,
        arbitration_id: message.arbitration_id.to_le_bytes(),
        timestamp_ticks: ticks.to_le_bytes(),
    };

    let mut out = Vec::with_capacity(HEADER_LEN + message.data.len());
    out.extend_from_slice(bytemuck::bytes_of(&header));
    out.extend_from_slice(&message.data);
    Some(out)
}

/// Decode a packetizer frame body into a [`Message`], or report a failure
/// and return `None`.
///
/// Reports `PacketDecodingError` for a body shorter than the header, a
/// truncated data section, or a declared data length exceeding what the
/// frame kind allows.
pub fn decode(
    config: &CodecConfig,
    body: &[u8],
    events: &EventManager,
    serial: Option<DeviceSerial>,
) -> Option<Message> {
    if body.len() < HEADER_LEN {
        events.add(EventType::PacketDecodingError, Severity::Error, serial);
        return None;
    }
    let header: &WireHeader = bytemuck::from_bytes(&body[..HEADER_LEN]);
    let data_len = header.data_len as usize;
    let max_len = if header.flags & FLAG_FD != 0 {
        MAX_FD_DATA_LEN
    } else {
        MAX_CLASSIC_DATA_LEN
    };
    if data_len > max_len || body.len() < HEADER_LEN + data_len {
        tracing::debug!(data_len, "decoded message data length out of range");
        events.add(EventType::PacketDecodingError, Severity::Error, serial);
        return None;
    }
    if header.flags & FLAG_FD != 0 && !config.support_canfd {
        events.add(EventType::CANFDNotSupported, Severity::Error, serial);
        return None;
    }

    let ticks = u64::from_le_bytes(header.timestamp_ticks);
    Some(Message {
        network_id: header.network_id,
        arbitration_id: u32::from_le_bytes(header.arbitration_id),
        extended: header.flags & FLAG_EXTENDED != 0,
        remote: header.flags & FLAG_REMOTE != 0,
        fd: header.flags & FLAG_FD != 0,
        bitrate_switch: header.flags & FLAG_BRS != 0,
        data: body[HEADER_LEN..HEADER_LEN + data_len].to_vec(),
        timestamp_ns: ticks.saturating_mul(config.timestamp_resolution_ns.max(1)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(data: Vec<u8>) -> Message {
        Message {
            network_id: 1,
            arbitration_id: 0x123,
            extended: false,
            remote: false,
            fd: false,
            bitrate_switch: false,
            data,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn round_trips_a_classic_frame() {
        let config = CodecConfig::default();
        let events = EventManager::default();
        let message = msg(vec![1, 2, 3, 4]);
        let body = encode(&config, &message, &events, None).unwrap();
        let decoded = decode(&config, &body, &events, None).unwrap();
        assert_eq!(decoded, message);
        assert!(events.get(&Default::default(), None, false).is_empty());
    }

    #[test]
    fn encode_rejects_fd_frame_when_device_does_not_support_it() {
        let config = CodecConfig::default();
        let events = EventManager::default();
        let mut message = msg(vec![0; 20]);
        message.fd = true;
        assert!(encode(&config, &message, &events, None).is_none());
        let reported = events.get(&Default::default(), None, false);
        assert_eq!(reported[0].kind(), EventType::CANFDNotSupported);
    }

    #[test]
    fn encode_rejects_remote_fd_frame() {
        let config = CodecConfig {
            support_canfd: true,
            ..CodecConfig::default()
        };
        let events = EventManager::default();
        let mut message = msg(vec![]);
        message.fd = true;
        message.remote = true;
        assert!(encode(&config, &message, &events, None).is_none());
        let reported = events.get(&Default::default(), None, false);
        assert_eq!(reported[0].kind(), EventType::RTRNotSupported);
    }

    #[test]
    fn encode_rejects_oversized_classic_payload() {
        let config = CodecConfig::default();
        let events = EventManager::default();
        let message = msg(vec![0; MAX_CLASSIC_DATA_LEN + 1]);
        assert!(encode(&config, &message, &events, None).is_none());
        let reported = events.get(&Default::default(), None, false);
        assert_eq!(reported[0].kind(), EventType::MessageMaxLengthExceeded);
    }

    #[test]
    fn timestamp_resolution_is_applied_as_a_tick_multiplier() {
        let config = CodecConfig {
            support_canfd: false,
            timestamp_resolution_ns: 25,
        };
        let events = EventManager::default();
        let mut message = msg(vec![9]);
        message.timestamp_ns = 250;
        let body = encode(&config, &message, &events, None).unwrap();
        let decoded = decode(&config, &body, &events, None).unwrap();
        assert_eq!(decoded.timestamp_ns, 250);
    }

    #[test]
    fn decode_reports_on_truncated_body() {
        let config = CodecConfig::default();
        let events = EventManager::default();
        let decoded = decode(&config, &[1, 2, 3], &events, None);
        assert!(decoded.is_none());
        let reported = events.get(&Default::default(), None, false);
        assert_eq!(reported[0].kind(), EventType::PacketDecodingError);
    }

    #[test]
    fn decode_rejects_fd_data_on_a_non_fd_configured_codec() {
        let fd_config = CodecConfig {
            support_canfd: true,
            ..CodecConfig::default()
        };
        let events = EventManager::default();
        let mut message = msg(vec![0; MAX_FD_DATA_LEN]);
        message.fd = true;
        let body = encode(&fd_config, &message, &events, None).unwrap();

        let classic_config = CodecConfig::default();
        let decoded = decode(&classic_config, &body, &events, None);
        assert!(decoded.is_none());
        let reported = events.get(&Default::default(), None, false);
        assert_eq!(reported[0].kind(), EventType::CANFDNotSupported);
    }
}
