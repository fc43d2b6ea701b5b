//! Kademlia distance calculations.

use std::cmp::Ordering;

use crate::domain::Kuid;

/// XOR distance between two identifiers.
///
/// Symmetric, zero only for identical inputs, and totally ordered through
/// the numeric ordering of [`Kuid`].
pub fn distance(a: &Kuid, b: &Kuid) -> Kuid {
    a.xor(b)
}

/// Which of `a` and `b` is closer to `target`.
///
/// Returns `Ordering::Less` when `a` is closer, `Ordering::Greater` when `b`
/// is closer and `Ordering::Equal` only when `a == b`.
pub fn compare3(target: &Kuid, a: &Kuid, b: &Kuid) -> Ordering {
    for ((t, x), y) in target.0.iter().zip(a.0.iter()).zip(b.0.iter()) {
        let da = t ^ x;
        let db = t ^ y;
        if da != db {
            return da.cmp(&db);
        }
    }
    Ordering::Equal
}

/// Number of leading bits shared by `a` and `b` (160 when equal).
#[inline]
pub fn common_prefix_len(a: &Kuid, b: &Kuid) -> usize {
    a.xor(b).leading_zeros()
}

/// Whether the first `bits` bits of `a` and `b` are identical.
#[inline]
pub fn match_leading(a: &Kuid, b: &Kuid, bits: usize) -> bool {
    common_prefix_len(a, b) >= bits
}
