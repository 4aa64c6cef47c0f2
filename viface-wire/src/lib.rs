//! Framing and de-framing of device packets.
//!
//! Two packetizers compose here: the byte [`Packetizer`] frames a raw
//! request/reply stream with a checksummed, preamble-delimited header,
//! and the [`ethernet::EthernetPacketizer`] tunnels whole packetizer
//! frames across a custom Ethernet L2 protocol when the transport is a
//! raw-Ethernet bridge rather than a direct byte stream. Both are plain
//! state machines, not I/O: callers feed them bytes and drain complete
//! units.

pub mod ethernet;
mod packetizer;

pub use ethernet::{EthernetPacketizer, EthernetPacketizerConfig, PieceFlags};
pub use packetizer::{Packetizer, PacketizerConfig};
