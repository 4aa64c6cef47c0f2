use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use nix::ifaddrs;
use nix::net::if_::InterfaceFlags;

use crate::{Flags, InterfaceIndex, NetworkEvent};

/// Walk the current interface list, calling `callback` with a
/// [`NetworkEvent`] per interface and per address on that interface.
///
/// This is a snapshot: no `DelLink`/`DelAddr` events exist. Linux's
/// alias naming (`eth0:1`) is folded back into its base interface name.
pub fn get_interfaces<FN>(mut callback: FN) -> Result<(), std::io::Error>
where
    FN: FnMut(NetworkEvent),
{
    let addrs = ifaddrs::getifaddrs()?;
    let mut next_index = 1u32;
    let mut index_map = HashMap::new();

    for ifaddr in addrs {
        let name = match ifaddr.interface_name.split_once(':') {
            None => ifaddr.interface_name,
            Some((prefix, _alias)) => prefix.to_string(),
        };

        let index = match index_map.entry(name) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let kernel_flags = ifaddr.flags;
                let mut flags = Flags::empty();
                for (iff, mapped) in [
                    (InterfaceFlags::IFF_UP, Flags::UP),
                    (InterfaceFlags::IFF_RUNNING, Flags::RUNNING),
                    (InterfaceFlags::IFF_LOOPBACK, Flags::LOOPBACK),
                    (InterfaceFlags::IFF_POINTOPOINT, Flags::POINTTOPOINT),
                    (InterfaceFlags::IFF_BROADCAST, Flags::BROADCAST),
                    (InterfaceFlags::IFF_MULTICAST, Flags::MULTICAST),
                ] {
                    if kernel_flags.contains(iff) {
                        flags |= mapped;
                    }
                }

                let index = next_index;
                next_index += 1;
                callback(NetworkEvent::NewLink(
                    InterfaceIndex(index),
                    e.key().clone(),
                    flags,
                ));
                e.insert(index);
                index
            }
        };

        if let (Some(addr), Some(mask)) = (ifaddr.address, ifaddr.netmask) {
            if let Some(ipv4) = addr.as_sockaddr_in() {
                if let Some(netmask) = mask.as_sockaddr_in() {
                    callback(NetworkEvent::NewAddr(
                        InterfaceIndex(index),
                        IpAddr::from(Ipv4Addr::from(ipv4.ip())),
                        netmask.ip().leading_ones() as u8,
                    ));
                }
            } else if let Some(ipv6) = addr.as_sockaddr_in6() {
                if let Some(netmask) = mask.as_sockaddr_in6() {
                    callback(NetworkEvent::NewAddr(
                        InterfaceIndex(index),
                        IpAddr::from(ipv6.ip()),
                        u128::from_be_bytes(netmask.as_ref().sin6_addr.s6_addr)
                            .leading_ones() as u8,
                    ));
                }
            }
        }
    }
    Ok(())
}
