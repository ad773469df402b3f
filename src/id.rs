//! Global tenant identifiers.
//!
//! A `GlobalId` is an opaque `u64` handed to us by a collaborator. Most of
//! the core treats it as a bare key for maps and metric labels. The only
//! place that cares about its internal structure is human-facing output
//! (logs, metric label values), where we decode it into a region and a
//! local tenant id.

use std::fmt;

const ENCODED_FLAG: u64 = 1 << 63;
const REGION_BITS: u32 = 15;
const LOCAL_BITS: u32 = 48;
const LOCAL_MASK: u64 = (1 << LOCAL_BITS) - 1;
const REGION_MASK: u64 = (1 << REGION_BITS) - 1;

/// Opaque tenant identifier, unique per (region, tenant) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalId(u64);

impl GlobalId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Encodes a region id and a local tenant id into one `GlobalId`.
    ///
    /// `region_id` is truncated to 15 bits and `local_id` to 48 bits; callers
    /// outside tests are expected to stay within those ranges.
    pub fn encode(region_id: u16, local_id: u64) -> Self {
        let region = (region_id as u64) & REGION_MASK;
        let local = local_id & LOCAL_MASK;
        Self(ENCODED_FLAG | (region << LOCAL_BITS) | local)
    }

    /// Decodes `(local_id, region_id)`. IDs that were never produced by
    /// [`GlobalId::encode`] (the high bit is unset) decode as `(raw, 0)`.
    pub fn decode(&self) -> (u64, u16) {
        if self.0 & ENCODED_FLAG == 0 {
            (self.0, 0)
        } else {
            let region = ((self.0 >> LOCAL_BITS) & REGION_MASK) as u16;
            let local = self.0 & LOCAL_MASK;
            (local, region)
        }
    }

    pub fn local_id(&self) -> u64 {
        self.decode().0
    }

    pub fn region_id(&self) -> u16 {
        self.decode().1
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (local, region) = self.decode();
        write!(f, "{local}@region{region}")
    }
}

impl From<u64> for GlobalId {
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}
