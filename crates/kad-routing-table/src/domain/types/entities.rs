//! Core Domain Entities for the Routing Table
//!
//! Identifiers, network addresses and timestamps shared by every layer.

use std::fmt;
use std::hash::Hash;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Width of a KUID in bytes.
pub const KUID_BYTES: usize = 20;

/// Width of a KUID in bits.
pub const KUID_BITS: usize = KUID_BYTES * 8;

/// 160-bit Kademlia identifier.
///
/// Ordering is the numeric (big-endian) ordering of the raw bytes, so two
/// XOR distances can be compared directly with `<`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kuid(pub [u8; KUID_BYTES]);

impl Kuid {
    /// The all-zero identifier.
    pub const ZERO: Kuid = Kuid([0u8; KUID_BYTES]);

    /// The all-ones identifier, also the largest possible XOR distance.
    pub const MAX: Kuid = Kuid([0xFF; KUID_BYTES]);

    /// Create a Kuid from raw bytes.
    pub const fn new(bytes: [u8; KUID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; KUID_BYTES] {
        &self.0
    }

    /// Draw a uniformly random identifier.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; KUID_BYTES];
        rng.fill(&mut bytes[..]);
        Self(bytes)
    }

    /// Draw a uniformly random identifier sharing the first `bits` bits of
    /// `prefix`.
    pub fn random_in_prefix<R: Rng + ?Sized>(prefix: &Kuid, bits: usize, rng: &mut R) -> Self {
        let random = Self::random(rng);
        random.with_prefix_of(prefix, bits)
    }

    /// Value of bit `n`, counting from the most significant bit (bit 0).
    ///
    /// Bits past the identifier width read as zero.
    pub fn bit(&self, n: usize) -> bool {
        self.0
            .get(n / 8)
            .is_some_and(|byte| byte & (0x80 >> (n % 8)) != 0)
    }

    /// Copy with bit `n` forced to `value`.
    pub fn with_bit(&self, n: usize, value: bool) -> Self {
        let mut bytes = self.0;
        if let Some(byte) = bytes.get_mut(n / 8) {
            let mask = 0x80 >> (n % 8);
            if value {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
        Self(bytes)
    }

    /// Copy with the n-th leading bit inverted.
    pub fn flip_leading_bit(&self, n: usize) -> Self {
        self.with_bit(n, !self.bit(n))
    }

    /// Bitwise XOR of two identifiers.
    pub fn xor(&self, other: &Kuid) -> Kuid {
        let mut bytes = [0u8; KUID_BYTES];
        for (out, (a, b)) in bytes.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *out = a ^ b;
        }
        Kuid(bytes)
    }

    /// Number of leading zero bits (160 for the zero identifier).
    pub fn leading_zeros(&self) -> usize {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return i * 8 + byte.leading_zeros() as usize;
            }
        }
        KUID_BITS
    }

    /// Keep the first `bits` bits and zero the rest.
    pub fn masked(&self, bits: usize) -> Self {
        Kuid::ZERO.with_prefix_of(self, bits)
    }

    /// Copy whose first `bits` bits are taken from `prefix`.
    pub fn with_prefix_of(&self, prefix: &Kuid, bits: usize) -> Self {
        let bits = bits.min(KUID_BITS);
        let mut bytes = self.0;
        let full = bits / 8;
        let rest = bits % 8;

        for (dst, src) in bytes.iter_mut().zip(prefix.0.iter()).take(full) {
            *dst = *src;
        }
        if rest > 0 {
            if let (Some(dst), Some(src)) = (bytes.get_mut(full), prefix.0.get(full)) {
                let mask = 0xFFu8 << (8 - rest);
                *dst = (*src & mask) | (*dst & !mask);
            }
        }
        Self(bytes)
    }

    /// Leading byte, which names one of the 256 size-estimate regions.
    pub fn leading_byte(&self) -> u8 {
        self.0[0]
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 40-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s).ok()?;
        let bytes: [u8; KUID_BYTES] = raw.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for Kuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kuid({})", self.to_hex())
    }
}

impl fmt::Display for Kuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Kuid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Kuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Kuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Kuid::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid KUID hex"))
    }
}

/// Four-character vendor tag announced by a remote implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VendorCode(pub [u8; 4]);

impl VendorCode {
    /// Build from a 4-byte ASCII tag such as `b"GTKG"`.
    pub const fn new(tag: [u8; 4]) -> Self {
        Self(tag)
    }
}

impl fmt::Display for VendorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            let c = if b.is_ascii_graphic() { b as char } else { '.' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// DHT protocol version spoken by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Socket address (IP + Port) - abstraction over std::net::SocketAddr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketAddr {
    /// IP address (v4 or v6).
    pub ip: IpAddr,
    /// Port number.
    pub port: u16,
}

impl SocketAddr {
    /// Create a new socket address from IP and port.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Convert to the standard library representation.
    pub fn to_std(&self) -> std::net::SocketAddr {
        let ip = match self.ip {
            IpAddr::V4(b) => std::net::IpAddr::from(b),
            IpAddr::V6(b) => std::net::IpAddr::from(b),
        };
        std::net::SocketAddr::new(ip, self.port)
    }
}

impl From<std::net::SocketAddr> for SocketAddr {
    fn from(addr: std::net::SocketAddr) -> Self {
        let ip = match addr.ip() {
            std::net::IpAddr::V4(v4) => IpAddr::V4(v4.octets()),
            std::net::IpAddr::V6(v6) => IpAddr::V6(v6.octets()),
        };
        Self::new(ip, addr.port())
    }
}

impl fmt::Display for SocketAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_std())
    }
}

impl Serialize for SocketAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.to_std())
    }
}

impl<'de> Deserialize<'de> for SocketAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<std::net::SocketAddr>()
            .map(SocketAddr::from)
            .map_err(serde::de::Error::custom)
    }
}

/// IP address enum supporting both IPv4 and IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpAddr {
    /// IPv4 address (4 bytes).
    V4([u8; 4]),
    /// IPv6 address (16 bytes).
    V6([u8; 16]),
}

impl IpAddr {
    /// Create an IPv4 address
    pub fn v4(a: u8, b: u8, c: u8, d: u8) -> Self {
        IpAddr::V4([a, b, c, d])
    }

    /// Create an IPv6 address from bytes
    pub fn v6(bytes: [u8; 16]) -> Self {
        IpAddr::V6(bytes)
    }

    /// Check if this is an IPv4 address
    pub fn is_ipv4(&self) -> bool {
        matches!(self, IpAddr::V4(_))
    }

    /// Raw address bytes.
    pub fn octets(&self) -> &[u8] {
        match self {
            IpAddr::V4(b) => b,
            IpAddr::V6(b) => b,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        self.octets().iter().all(|b| *b == 0)
    }

    pub fn is_loopback(&self) -> bool {
        match self {
            IpAddr::V4(b) => b[0] == 127,
            IpAddr::V6(b) => std::net::Ipv6Addr::from(*b).is_loopback(),
        }
    }

    pub fn is_multicast(&self) -> bool {
        match self {
            IpAddr::V4(b) => (224..=239).contains(&b[0]),
            IpAddr::V6(b) => b[0] == 0xFF,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, IpAddr::V4([255, 255, 255, 255]))
    }
}

/// Unix timestamp in seconds
///
/// Timestamps are clamped to a reasonable maximum to prevent overflow
/// in sorting and comparison operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    /// Create a new timestamp, clamping to MAX_REASONABLE.
    pub const fn new(secs: u64) -> Self {
        if secs > Self::MAX_REASONABLE {
            Self(Self::MAX_REASONABLE)
        } else {
            Self(secs)
        }
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds to timestamp (saturating at MAX_REASONABLE).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs).min(Self::MAX_REASONABLE))
    }

    /// Subtract seconds from timestamp (saturating at 0).
    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Seconds elapsed since `earlier` (zero if `earlier` is in the future).
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}
