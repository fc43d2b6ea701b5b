//! # Network Size Estimation
//!
//! A sample of the nodes closest to a target gives a density: if the i-th
//! closest node sits at distance `d_i`, the least-squares slope of `d_i`
//! against `i` is `D / S` with `D = Σ i·d_i` and `S = Σ i²`. The whole
//! space then holds about `(2^160 - 1) / (D / S) + 1` nodes.
//!
//! The local estimate (sampled around our own KUID) is combined with
//! regional estimates from recent lookups and with estimates reported by
//! peers, discarding outliers further than one standard deviation from the
//! mean.

use std::collections::{HashMap, VecDeque};

use primitive_types::U256;

use crate::domain::{Kuid, RoutingConfig, Timestamp, KUID_BITS};

fn kuid_max() -> U256 {
    (U256::one() << KUID_BITS) - U256::one()
}

fn to_u256(id: &Kuid) -> U256 {
    U256::from_big_endian(id.as_bytes())
}

/// Extrapolate the network size from nodes near `target`.
///
/// Returns `None` without samples. Returns `u64::MAX` when the sample
/// cannot support an estimate: `D` does not fit in 160 bits, every node sits
/// at distance zero, or the result is past `u64`.
///
/// `D` outgrows 160 bits whenever the sample spans a large share of the
/// space, which happens for any network smaller than `S` nodes.
pub fn estimate_size(target: &Kuid, nodes: &[Kuid]) -> Option<u64> {
    if nodes.is_empty() {
        return None;
    }
    let max = kuid_max();
    let mut distances: Vec<U256> = nodes.iter().map(|n| to_u256(&n.xor(target))).collect();
    distances.sort();

    let mut d = U256::zero();
    let mut s = U256::zero();
    for (i, distance) in distances.iter().enumerate() {
        let i = U256::from(i as u64 + 1);
        s += i * i;
        d += i * *distance;
        if d > max {
            return Some(u64::MAX);
        }
    }

    let slope = d / s;
    if slope.is_zero() {
        return Some(u64::MAX);
    }
    let size = max / slope + U256::one();
    if size > U256::from(u64::MAX) {
        Some(u64::MAX)
    } else {
        Some(size.low_u64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sample {
    estimate: u64,
    at: Timestamp,
}

/// Keeps the local, regional and peer-reported estimates.
///
/// Regions are the 256 values of a KUID's leading byte.
#[derive(Debug, Clone)]
pub struct SizeEstimator {
    samples: usize,
    lifetime_secs: u64,
    peers_per_region: usize,
    local: Option<u64>,
    regional: HashMap<u8, Sample>,
    peers: HashMap<u8, VecDeque<Sample>>,
}

impl SizeEstimator {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            samples: config.estimate_samples,
            lifetime_secs: config.estimate_lifetime_secs,
            peers_per_region: config.peer_estimates_per_region,
            local: None,
            regional: HashMap::new(),
            peers: HashMap::new(),
        }
    }

    /// Number of closest nodes each estimate uses.
    pub fn sample_size(&self) -> usize {
        self.samples
    }

    pub fn local(&self) -> Option<u64> {
        self.local
    }

    /// Recompute the estimate around our own KUID from nodes given closest
    /// first.
    pub fn update_local(&mut self, local_id: &Kuid, closest: &[Kuid]) -> Option<u64> {
        self.local = estimate_size(local_id, self.truncated(closest));
        self.local
    }

    /// Record the estimate around the target of a completed lookup.
    pub fn record_regional(&mut self, target: &Kuid, closest: &[Kuid], now: Timestamp) -> Option<u64> {
        let estimate = estimate_size(target, self.truncated(closest))?;
        self.regional
            .insert(target.leading_byte(), Sample { estimate, at: now });
        Some(estimate)
    }

    /// Record the estimate a peer reported about itself.
    pub fn record_peer(&mut self, peer: &Kuid, estimate: u64, now: Timestamp) {
        let ring = self.peers.entry(peer.leading_byte()).or_default();
        if ring.len() >= self.peers_per_region {
            ring.pop_front();
        }
        ring.push_back(Sample { estimate, at: now });
    }

    /// Drop regional and peer estimates older than their lifetime.
    pub fn expire(&mut self, now: Timestamp) {
        let lifetime = self.lifetime_secs;
        let fresh = |s: &Sample| now.secs_since(s.at) <= lifetime;
        self.regional.retain(|_, s| fresh(s));
        for ring in self.peers.values_mut() {
            ring.retain(|s| fresh(s));
        }
        self.peers.retain(|_, ring| !ring.is_empty());
    }

    /// Combined estimate after expiring old samples.
    pub fn estimate(&mut self, now: Timestamp) -> Option<u64> {
        self.expire(now);
        let samples: Vec<u64> = self
            .local
            .into_iter()
            .chain(self.regional.values().map(|s| s.estimate))
            .chain(self.peers.values().flatten().map(|s| s.estimate))
            .collect();
        trimmed_mean(&samples)
    }

    fn truncated<'a>(&self, closest: &'a [Kuid]) -> &'a [Kuid] {
        &closest[..closest.len().min(self.samples)]
    }
}

/// Mean of the samples lying within one standard deviation of the mean.
fn trimmed_mean(samples: &[u64]) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|&x| (x as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let sd = variance.sqrt();

    let kept: Vec<f64> = samples
        .iter()
        .map(|&x| x as f64)
        .filter(|x| (x - mean).abs() <= sd)
        .collect();
    let result = if kept.is_empty() {
        mean
    } else {
        kept.iter().sum::<f64>() / kept.len() as f64
    };
    Some(result.round() as u64)
}
