//! Determinism primitives.
//!
//! `derive_seed` fixes one integer per report from the most stable identifier
//! available; `fnv1a_64` turns `(seed, id)` pairs into tie-breaks that look
//! random but are identical on every platform and run.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{AxisInfo, UserTagSet};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Bumped whenever the canonical serialization changes.
const SEED_FORMAT_VERSION: &str = "seed.v1";

pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Which identifier the seed was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    AttemptId,
    Canonical,
}

/// Seed for one report: the attempt id when known, else the canonical user state.
pub fn derive_seed(attempt_id: Option<Uuid>, tags: &UserTagSet, axis: &AxisInfo) -> (u64, SeedSource) {
    let (text, source) = match attempt_id {
        Some(id) => (
            format!("{SEED_FORMAT_VERSION}\nattempt:{}", id.as_hyphenated()),
            SeedSource::AttemptId,
        ),
        None => (canonical_state(tags, axis), SeedSource::Canonical),
    };
    (sha256_prefix(text.as_bytes()), source)
}

/// Ordered, versioned text form of the user state. Both inputs are sorted
/// collections, so insertion order never leaks into the result.
pub fn canonical_state(tags: &UserTagSet, axis: &AxisInfo) -> String {
    let mut out = String::from(SEED_FORMAT_VERSION);
    out.push_str("\ntags:");
    for tag in tags.iter() {
        out.push('\n');
        out.push_str(tag);
    }
    out.push_str("\naxis:");
    for (dim, state) in axis.iter() {
        out.push_str(&format!(
            "\n{dim}|{}|{}|{}|{}",
            state.side, state.percentile, state.delta, state.level
        ));
    }
    out
}

fn sha256_prefix(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}
