//! Key hashing and probing policies for the station table.
//!
//! Hash functions are plain `fn(&[u8]) -> u64` so that alternatives can be
//! benchmarked without touching the table itself.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

pub type HashFn = fn(&[u8]) -> u64;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const DJB2_SEED: u64 = 5381;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HashPolicy {
    #[default]
    Fnv1a,
    Djb2,
    Fx,
}

impl HashPolicy {
    pub fn function(self) -> HashFn {
        match self {
            HashPolicy::Fnv1a => fnv1a,
            HashPolicy::Djb2 => djb2,
            HashPolicy::Fx => fx,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashPolicy::Fnv1a => "fnv1a",
            HashPolicy::Djb2 => "djb2",
            HashPolicy::Fx => "fx",
        }
    }

    pub fn all() -> [HashPolicy; 3] {
        [HashPolicy::Fnv1a, HashPolicy::Djb2, HashPolicy::Fx]
    }
}

impl std::fmt::Display for HashPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStrategy {
    #[default]
    Linear,
    /// Triangular steps (1, 2, 3, ...); covers every slot of a power-of-two table.
    Quadratic,
}

impl ProbeStrategy {
    /// Slot to try after `slot` on the `attempt`-th collision (1-based).
    #[inline]
    pub fn next(self, slot: usize, attempt: usize, mask: usize) -> usize {
        match self {
            ProbeStrategy::Linear => (slot + 1) & mask,
            ProbeStrategy::Quadratic => (slot + attempt) & mask,
        }
    }
}

#[inline]
pub fn fnv1a(key: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in key {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[inline]
pub fn djb2(key: &[u8]) -> u64 {
    key.iter().fold(DJB2_SEED, |hash, &byte| {
        hash.wrapping_shl(5).wrapping_add(hash).wrapping_add(byte as u64)
    })
}

#[inline]
pub fn fx(key: &[u8]) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    hasher.write(key);
    hasher.finish()
}
