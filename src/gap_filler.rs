//! Fills short gaps between publishes by repeating the last known sample
//! value, so a downstream step function doesn't read as a real drop to
//! zero across an ordinary scrape-interval jitter.
//!
//! One `GapFiller` sits in front of the whole multiplexer rather than being
//! duplicated per tenant pusher, but its known-series map is keyed by
//! `(tenant, label set)`, not label set alone, so tenants that happen to
//! share an identical label set never see each other's history.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::id::GlobalId;
use crate::payload::{Sample, TimeSeries};

const MAX_SYNTHETIC_SAMPLES: i64 = 5;

pub struct GapFiller {
    max_gap: Duration,
    last_seen: Mutex<HashMap<GlobalId, HashMap<String, (i64, f64)>>>,
}

impl GapFiller {
    pub fn new(max_gap: Duration) -> Self {
        Self { max_gap, last_seen: Mutex::new(HashMap::new()) }
    }

    /// Processes one tenant's metric series in place: inserts synthetic
    /// samples where a short gap is detected, then rebuilds the known-series
    /// map for `tenant` from scratch using this publish's qualifying
    /// samples. A series absent from this call is absent from the map
    /// afterwards, even if it reappears on the next call.
    pub fn process(&self, tenant: GlobalId, series: &mut [TimeSeries]) {
        if self.max_gap.is_zero() {
            return;
        }
        let max_gap_ms = self.max_gap.as_millis() as i64;
        let mut guard = self.last_seen.lock().unwrap();
        let old_map = guard.remove(&tenant).unwrap_or_default();
        let mut new_map = HashMap::with_capacity(old_map.len());

        for ts in series.iter_mut() {
            if !ts.is_gap_fill_candidate() {
                continue;
            }
            let key = ts.label_key();
            let new_ts = ts.samples[0].timestamp_ms;
            let new_val = ts.samples[0].value;

            if let Some(&(prev_ts, prev_val)) = old_map.get(&key) {
                let gap = new_ts - prev_ts;
                if gap > max_gap_ms && gap <= MAX_SYNTHETIC_SAMPLES * max_gap_ms {
                    let holes = (gap + max_gap_ms - 1) / max_gap_ms;
                    let synthetic_count = holes - 1;
                    let mut synthetic = Vec::with_capacity(synthetic_count as usize);
                    for k in 1..=synthetic_count {
                        let t = prev_ts + k * max_gap_ms;
                        if t >= new_ts {
                            break;
                        }
                        synthetic.push(Sample { timestamp_ms: t, value: prev_val });
                    }
                    ts.samples.splice(0..0, synthetic);
                }
            }

            new_map.insert(key, (new_ts, new_val));
        }

        guard.insert(tenant, new_map);
    }
}
