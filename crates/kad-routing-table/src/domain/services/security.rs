//! Security services: Sybil resistance and address usability.
//!
//! SECURITY-CRITICAL: Contains IP diversity checks.
//! Isolate for security audits.

use crate::domain::{IpAddr, SocketAddr, SubnetMask};

/// Check if two IP addresses share the same subnet prefix.
///
/// IPv4 and IPv6 addresses never share a subnet.
pub fn is_same_subnet(a: &IpAddr, b: &IpAddr, mask: &SubnetMask) -> bool {
    match (a, b) {
        (IpAddr::V4(a_bytes), IpAddr::V4(b_bytes)) => {
            prefix_matches(a_bytes, b_bytes, mask.prefix_length)
        }
        (IpAddr::V6(a_bytes), IpAddr::V6(b_bytes)) => {
            prefix_matches(a_bytes, b_bytes, mask.prefix_length)
        }
        _ => false,
    }
}

/// Canonical subnet of an address: /24 for IPv4, /48 for IPv6.
///
/// Two addresses are in the same subnet iff their keys are equal, which lets
/// the table count subnet members in a map.
pub fn subnet_key(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(bytes) => IpAddr::V4(mask_bytes(*bytes, SubnetMask::ipv4_default())),
        IpAddr::V6(bytes) => IpAddr::V6(mask_bytes(*bytes, SubnetMask::ipv6_default())),
    }
}

/// Whether an address may be stored in the routing table.
///
/// Rejects the unspecified address, port zero, multicast and broadcast
/// addresses, and loopback unless explicitly allowed.
pub fn is_usable_address(addr: &SocketAddr, allow_loopback: bool) -> bool {
    let ip = &addr.ip;
    if addr.port == 0 || ip.is_unspecified() || ip.is_multicast() || ip.is_broadcast() {
        return false;
    }
    allow_loopback || !ip.is_loopback()
}

fn mask_bytes<const N: usize>(mut bytes: [u8; N], mask: SubnetMask) -> [u8; N] {
    let prefix_bits = mask.prefix_length as usize;
    for (i, byte) in bytes.iter_mut().enumerate() {
        let start = i * 8;
        if start >= prefix_bits {
            *byte = 0;
        } else if start + 8 > prefix_bits {
            *byte &= 0xFF << (8 - (prefix_bits - start));
        }
    }
    bytes
}

/// Returns true if the first `prefix_bits` bits of both slices are equal.
fn prefix_matches(a: &[u8], b: &[u8], prefix_bits: u8) -> bool {
    let prefix_bytes = (prefix_bits / 8) as usize;
    let remaining_bits = prefix_bits % 8;
    let max_bytes = a.len().min(b.len());

    if a.iter().zip(b.iter()).take(prefix_bytes.min(max_bytes)).any(|(x, y)| x != y) {
        return false;
    }

    if remaining_bits > 0 && prefix_bytes < max_bytes {
        let mask_byte = 0xFF << (8 - remaining_bits);
        return (a[prefix_bytes] & mask_byte) == (b[prefix_bytes] & mask_byte);
    }

    true
}
