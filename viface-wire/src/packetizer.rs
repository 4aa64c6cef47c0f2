//! Byte-stream packetizer: preamble-delimited, checksummed framing over a
//! raw request/reply byte stream.

use viface_events::{DeviceSerial, EventManager, EventType, Severity};

const PREAMBLE: u8 = 0xAA;

/// Tunable framing behavior for devices that disable the checksum byte or
/// pad frames to an even length.
#[derive(Clone, Copy, Debug)]
pub struct PacketizerConfig {
    /// Some devices omit the trailing checksum byte entirely.
    pub disable_checksum: bool,
    /// Pad the encoded frame with a trailing `0x00` when its length would
    /// otherwise be odd, so every frame lands on a 16-bit boundary.
    pub align16bit: bool,
}

impl Default for PacketizerConfig {
    fn default() -> Self {
        Self {
            disable_checksum: false,
            align16bit: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    SeenPreamble1,
    ReadingHeader { low: Option<u8> },
    ReadingBody,
    AwaitingChecksum,
}

fn checksum(body: &[u8]) -> u8 {
    let sum = body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    sum.wrapping_neg()
}

/// Frames outgoing bodies and de-frames an incoming byte stream.
///
/// Encoding is stateless; decoding is a resynchronizing state machine fed
/// one chunk at a time via [`Self::decode`].
pub struct Packetizer {
    config: PacketizerConfig,
    state: State,
    len: u16,
    body: Vec<u8>,
}

impl Packetizer {
    pub fn new(config: PacketizerConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            len: 0,
            body: Vec::new(),
        }
    }

    /// Frame `body` for transmission: `AA AA`, a 16-bit little-endian
    /// length, the body itself, an optional checksum byte, and an optional
    /// alignment pad.
    pub fn encode(&self, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + body.len() + 2);
        out.push(PREAMBLE);
        out.push(PREAMBLE);
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend_from_slice(body);
        if !self.config.disable_checksum {
            out.push(checksum(body));
        }
        if self.config.align16bit && out.len() % 2 != 0 {
            out.push(0x00);
        }
        out
    }

    /// Feed a chunk of incoming bytes, returning every body that completed
    /// a frame. Reports `PacketDecodingError` on a failed resync and
    /// `PacketChecksumError` on a checksum mismatch via `events`.
    pub fn decode(
        &mut self,
        bytes: &[u8],
        events: &EventManager,
        serial: Option<DeviceSerial>,
    ) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        for &byte in bytes {
            if let Some(body) = self.advance(byte, events, serial) {
                out.push(body);
            }
        }
        out
    }

    fn advance(
        &mut self,
        byte: u8,
        events: &EventManager,
        serial: Option<DeviceSerial>,
    ) -> Option<Vec<u8>> {
        match self.state {
            State::Idle => {
                if byte == PREAMBLE {
                    self.state = State::SeenPreamble1;
                }
                None
            }
            State::SeenPreamble1 => {
                if byte == PREAMBLE {
                    self.state = State::ReadingHeader { low: None };
                } else {
                    events.add(EventType::PacketDecodingError, Severity::Error, serial);
                    self.state = State::Idle;
                }
                None
            }
            State::ReadingHeader { low: None } => {
                self.state = State::ReadingHeader { low: Some(byte) };
                None
            }
            State::ReadingHeader { low: Some(low) } => {
                self.len = (low as u16) | ((byte as u16) << 8);
                self.body.clear();
                self.body.reserve(self.len as usize);
                if self.len == 0 {
                    if self.config.disable_checksum {
                        self.state = State::Idle;
                        return Some(Vec::new());
                    }
                    self.state = State::AwaitingChecksum;
                } else {
                    self.state = State::ReadingBody;
                }
                None
            }
            State::ReadingBody => {
                self.body.push(byte);
                if self.body.len() == self.len as usize {
                    if self.config.disable_checksum {
                        self.state = State::Idle;
                        return Some(std::mem::take(&mut self.body));
                    }
                    self.state = State::AwaitingChecksum;
                }
                None
            }
            State::AwaitingChecksum => {
                self.state = State::Idle;
                let expected = checksum(&self.body);
                if byte == expected {
                    Some(std::mem::take(&mut self.body))
                } else {
                    events.add(EventType::PacketChecksumError, Severity::Error, serial);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_frame_with_checksum() {
        let mut packetizer = Packetizer::new(PacketizerConfig::default());
        let events = EventManager::default();
        let body = vec![1, 2, 3, 4];
        let framed = packetizer.encode(&body);
        let decoded = packetizer.decode(&framed, &events, None);
        assert_eq!(decoded, vec![body]);
        assert!(events.get(&Default::default(), None, false).is_empty());
    }

    #[test]
    fn round_trips_without_checksum() {
        let config = PacketizerConfig {
            disable_checksum: true,
            align16bit: false,
        };
        let mut packetizer = Packetizer::new(config);
        let events = EventManager::default();
        let body = vec![9, 9, 9];
        let framed = packetizer.encode(&body);
        assert_eq!(framed, vec![0xAA, 0xAA, 3, 0, 9, 9, 9]);
        let decoded = packetizer.decode(&framed, &events, None);
        assert_eq!(decoded, vec![body]);
    }

    #[test]
    fn pads_to_16_bit_alignment_when_frame_length_is_odd() {
        let config = PacketizerConfig {
            disable_checksum: true,
            align16bit: true,
        };
        let packetizer = Packetizer::new(config);
        // preamble(2) + len(2) + body(3) = 7, odd, so a pad byte is appended.
        let framed = packetizer.encode(&[1, 2, 3]);
        assert_eq!(framed.len(), 8);
        assert_eq!(*framed.last().unwrap(), 0x00);
    }

    #[test]
    fn checksum_mismatch_reports_and_resyncs() {
        let mut packetizer = Packetizer::new(PacketizerConfig::default());
        let events = EventManager::default();
        let mut framed = packetizer.encode(&[1, 2, 3]);
        *framed.last_mut().unwrap() ^= 0xFF;
        framed.extend(packetizer.encode(&[9]));

        let decoded = packetizer.decode(&framed, &events, None);
        assert_eq!(decoded, vec![vec![9]]);
        let reported = events.get(&Default::default(), None, false);
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].kind(), EventType::PacketChecksumError);
    }

    #[test]
    fn garbage_before_a_preamble_is_silently_skipped() {
        let mut packetizer = Packetizer::new(PacketizerConfig::default());
        let events = EventManager::default();
        let mut stream = vec![0x00, 0x01, 0x02];
        stream.extend(packetizer.encode(&[7, 7]));

        let decoded = packetizer.decode(&stream, &events, None);
        assert_eq!(decoded, vec![vec![7, 7]]);
        assert!(events.get(&Default::default(), None, false).is_empty());
    }

    #[test]
    fn a_failed_preamble_resync_reports_exactly_once() {
        let mut packetizer = Packetizer::new(PacketizerConfig::default());
        let events = EventManager::default();
        // A lone AA followed by a non-AA byte is a failed second-preamble
        // match: one resync event, then clean recovery.
        let mut stream = vec![0xAA, 0x01];
        stream.extend(packetizer.encode(&[5]));

        let decoded = packetizer.decode(&stream, &events, None);
        assert_eq!(decoded, vec![vec![5]]);
        let reported = events.get(&Default::default(), None, false);
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].kind(), EventType::PacketDecodingError);
    }

    #[test]
    fn decode_can_be_fed_one_byte_at_a_time() {
        let mut packetizer = Packetizer::new(PacketizerConfig::default());
        let events = EventManager::default();
        let framed = packetizer.encode(&[1, 2, 3]);
        let mut results = Vec::new();
        for byte in framed {
            results.extend(packetizer.decode(&[byte], &events, None));
        }
        assert_eq!(results, vec![vec![1, 2, 3]]);
    }
}
