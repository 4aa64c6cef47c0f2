//! Local network interface enumeration.
//!
//! A raw-Ethernet bridge device is reachable over whichever local NIC is
//! plugged into it; discovering that transport needs to know which
//! interfaces exist and are up before it can probe them. This crate
//! answers only the "which interfaces" half, synchronously and without
//! any vehicle-interface-specific knowledge.

mod getifaddrs;

use std::net::IpAddr;

pub use getifaddrs::get_interfaces;

/// Stable handle for one network interface, as returned by the kernel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct InterfaceIndex(pub u32);

bitflags::bitflags! {
    /// Kernel interface flags relevant to device discovery.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Flags: u32 {
        const UP = 1 << 0;
        const RUNNING = 1 << 1;
        const LOOPBACK = 1 << 2;
        const POINTTOPOINT = 1 << 3;
        const BROADCAST = 1 << 4;
        const MULTICAST = 1 << 5;
    }
}

/// One fact discovered while walking the current interface list: either
/// a new interface, or a new address on an already-seen interface.
/// Interfaces are always reported before their addresses.
#[derive(Clone, Debug)]
pub enum NetworkEvent {
    NewLink(InterfaceIndex, String, Flags),
    NewAddr(InterfaceIndex, IpAddr, u8),
}

/// Interfaces that are up, running, and broadcast-capable — the
/// candidates a raw-Ethernet bridge transport's `Find()` would probe.
/// Loopback interfaces are excluded since no bridge device listens there.
pub fn find_broadcast_capable_interfaces() -> std::io::Result<Vec<(String, Flags)>> {
    let mut found = Vec::new();
    get_interfaces(|event| {
        if let NetworkEvent::NewLink(_, name, flags) = event {
            let wanted = Flags::UP | Flags::RUNNING | Flags::BROADCAST;
            if flags.contains(wanted) && !flags.contains(Flags::LOOPBACK) {
                found.push((name, flags));
            }
        }
    })?;
    Ok(found)
}
