//! Ethernet-tunnel packetizer: carries whole packetizer frames as the
//! payload of a custom Ethernet II protocol when a raw-Ethernet bridge is
//! the transport instead of a byte stream.
//!
//! Downward frames (`input_down`/`output_down`) pack outgoing packetizer
//! frames greedily into L2 frames up to [`MAX_PAYLOAD`] bytes, splitting
//! any frame that doesn't fit on its own across several pieces sharing a
//! sequence number. Upward frames (`input_up`/`output_up`) reverse this:
//! pieces sharing a sequence number are concatenated back into the
//! original packetizer frame.

use std::collections::VecDeque;

use bytemuck::{Pod, Zeroable};
use viface_events::{DeviceSerial, EventManager, EventType, Severity};

/// Custom EtherType used to distinguish tunnel frames on the wire.
pub const ETHERTYPE: u16 = 0xCAB1;
/// Magic bytes following the EtherType, identifying this as a tunnel frame.
pub const MAGIC: [u8; 4] = [0xAA, 0xAA, 0x55, 0x55];
/// Largest payload a single L2 frame may carry.
pub const MAX_PAYLOAD: usize = 1490;
const HEADER_VERSION: u8 = 0x01;
const L2_HEADER_LEN: usize = std::mem::size_of::<L2Header>();

/// The fixed 24-byte prefix of every tunnel L2 frame, before the
/// variable-length payload. Multi-byte fields are kept as raw byte arrays
/// (rather than `u16`) so the struct has no alignment padding and can be
/// read directly out of a wire buffer with [`bytemuck`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct L2Header {
    dst_mac: [u8; 6],
    src_mac: [u8; 6],
    ethertype: [u8; 2],
    magic: [u8; 4],
    length: [u8; 2],
    seq: [u8; 2],
    flags: u8,
    version: u8,
}

/// Which part of a (possibly split) packetizer frame an L2 piece carries.
///
/// The two bits are independent: bit 0 marks "this piece starts the
/// packetizer frame", bit 1 marks "this piece ends it". A frame that fits
/// in one piece sets both (`Solo`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PieceFlags {
    Mid = 0b00,
    First = 0b01,
    Last = 0b10,
    Solo = 0b11,
}

impl PieceFlags {
    fn is_first(byte: u8) -> bool {
        byte & PieceFlags::First as u8 != 0
    }

    fn is_last(byte: u8) -> bool {
        byte & PieceFlags::Last as u8 != 0
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EthernetPacketizerConfig {
    /// MAC address of the device end of the tunnel.
    pub device_mac: [u8; 6],
    /// MAC address of the host end of the tunnel.
    pub host_mac: [u8; 6],
}

/// Packs packetizer frames into L2 frames downward, and reassembles them
/// upward.
pub struct EthernetPacketizer {
    config: EthernetPacketizerConfig,
    down_queue: VecDeque<Vec<u8>>,
    down_ready: VecDeque<Vec<u8>>,
    up_ready: VecDeque<Vec<u8>>,
    seq: u16,
    reassembly: Option<Vec<u8>>,
    reassembly_seq: Option<u16>,
}

impl EthernetPacketizer {
    pub fn new(config: EthernetPacketizerConfig) -> Self {
        Self {
            config,
            down_queue: VecDeque::new(),
            down_ready: VecDeque::new(),
            up_ready: VecDeque::new(),
            seq: 0,
            reassembly: None,
            reassembly_seq: None,
        }
    }

    /// Queue a packetizer frame to be tunneled downward.
    pub fn input_down(&mut self, frame: Vec<u8>) {
        self.down_queue.push_back(frame);
    }

    /// Drain the L2 frames built so far from queued `input_down` frames.
    pub fn output_down(&mut self) -> Vec<Vec<u8>> {
        while let Some(frame) = self.down_queue.pop_front() {
            let seq = self.next_seq();
            if frame.len() > MAX_PAYLOAD {
                self.pack_split(seq, &frame);
            } else {
                self.pack_whole(seq, frame);
            }
        }
        self.down_ready.drain(..).collect()
    }

    fn next_seq(&mut self) -> u16 {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }

    /// A frame that fits in one piece: pack it together with as many
    /// whole pending frames as still fit, all sharing `seq`.
    fn pack_whole(&mut self, seq: u16, frame: Vec<u8>) {
        let mut buffer = frame;
        while let Some(next) = self.down_queue.front() {
            if buffer.len() + next.len() > MAX_PAYLOAD {
                break;
            }
            buffer.extend_from_slice(&self.down_queue.pop_front().unwrap());
        }
        self.down_ready
            .push_back(self.build_l2(seq, PieceFlags::Solo, &buffer));
    }

    /// A frame too large for one piece: split it into `MAX_PAYLOAD`-sized
    /// chunks, packing any remaining whole pending frames into the room
    /// left in the trailing (last) piece. Every piece shares `seq`.
    fn pack_split(&mut self, seq: u16, frame: &[u8]) {
        let mut remaining = frame;
        let mut first = true;
        loop {
            if remaining.len() <= MAX_PAYLOAD {
                let mut buffer = remaining.to_vec();
                while let Some(next) = self.down_queue.front() {
                    if buffer.len() + next.len() > MAX_PAYLOAD {
                        break;
                    }
                    buffer.extend_from_slice(&self.down_queue.pop_front().unwrap());
                }
                self.down_ready
                    .push_back(self.build_l2(seq, PieceFlags::Last, &buffer));
                break;
            }
            let (piece, rest) = remaining.split_at(MAX_PAYLOAD);
            let flags = if first { PieceFlags::First } else { PieceFlags::Mid };
            self.down_ready.push_back(self.build_l2(seq, flags, piece));
            remaining = rest;
            first = false;
        }
    }

    fn build_l2(&self, seq: u16, flags: PieceFlags, payload: &[u8]) -> Vec<u8> {
        let header = L2Header {
            dst_mac: self.config.device_mac,
            src_mac: self.config.host_mac,
            ethertype: ETHERTYPE.to_be_bytes(),
            magic: MAGIC,
            length: (payload.len() as u16).to_le_bytes(),
            seq: seq.to_le_bytes(),
            flags: flags as u8,
            version: HEADER_VERSION,
        };
        let mut out = Vec::with_capacity(L2_HEADER_LEN + payload.len());
        out.extend_from_slice(bytemuck::bytes_of(&header));
        out.extend_from_slice(payload);
        out
    }

    /// Feed one incoming L2 frame. Malformed frames, and pieces that
    /// arrive out of sequence or without a preceding `First`, are dropped
    /// with a reported `PacketDecodingError`.
    pub fn input_up(
        &mut self,
        frame: &[u8],
        events: &EventManager,
        serial: Option<DeviceSerial>,
    ) {
        if !self.parse_up(frame, events, serial) {
            events.add(EventType::PacketDecodingError, Severity::Error, serial);
        }
    }

    fn parse_up(&mut self, frame: &[u8], events: &EventManager, serial: Option<DeviceSerial>) -> bool {
        if frame.len() < L2_HEADER_LEN {
            tracing::debug!(len = frame.len(), "tunnel frame shorter than header");
            return false;
        }
        let header: &L2Header = bytemuck::from_bytes(&frame[..L2_HEADER_LEN]);
        let ethertype = u16::from_be_bytes(header.ethertype);
        let length = u16::from_le_bytes(header.length) as usize;
        let seq = u16::from_le_bytes(header.seq);
        let flags = header.flags;

        if header.dst_mac != self.config.host_mac
            || ethertype != ETHERTYPE
            || header.magic != MAGIC
            || header.version != HEADER_VERSION
            || length > MAX_PAYLOAD
            || frame.len() < L2_HEADER_LEN + length
        {
            tracing::debug!("malformed tunnel frame header");
            return false;
        }

        let payload = &frame[L2_HEADER_LEN..L2_HEADER_LEN + length];
        let is_first = PieceFlags::is_first(flags);
        let is_last = PieceFlags::is_last(flags);

        if is_first {
            self.reassembly = Some(payload.to_vec());
            self.reassembly_seq = Some(seq);
        } else {
            match (self.reassembly.as_mut(), self.reassembly_seq) {
                (Some(buf), Some(expected)) if expected == seq => {
                    buf.extend_from_slice(payload);
                }
                _ => {
                    self.reassembly = None;
                    self.reassembly_seq = None;
                    // Report through the normal path so callers see one
                    // event for this dropped piece, not a second one from
                    // the caller's generic failure branch.
                    events.add(EventType::PacketDecodingError, Severity::Error, serial);
                    return true;
                }
            }
        }

        if is_last {
            if let Some(buf) = self.reassembly.take() {
                self.reassembly_seq = None;
                self.up_ready.push_back(buf);
            }
        }
        true
    }

    /// Drain packetizer frames fully reassembled so far.
    pub fn output_up(&mut self) -> Vec<Vec<u8>> {
        self.up_ready.drain(..).collect()
    }
}
