//! Configuration consumed by the publishing core. Parsing this from a file
//! or environment is a host process's job; this crate only defines the
//! shape and its literal defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::backoff::{DEFAULT_MAX, DEFAULT_MIN};
use crate::queue::QueueLimits as RuntimeQueueLimits;
use crate::retry_budget::DEFAULT_MAX_RETRIES;

fn default_backoff_min() -> Duration {
    DEFAULT_MIN
}

fn default_backoff_max() -> Duration {
    DEFAULT_MAX
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_max_lifetime() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_max_lifetime_jitter() -> f64 {
    0.1
}

fn default_max_gap() -> Duration {
    Duration::from_secs(15)
}

fn default_tenant_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_max_push_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_wait_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_tenant_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_discard_duration() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueueLimitsConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_max_age")]
    pub max_age: Duration,
}

fn default_max_items() -> usize {
    10_000
}

fn default_max_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_max_age() -> Duration {
    Duration::from_secs(300)
}

impl Default for QueueLimitsConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            max_bytes: default_max_bytes(),
            max_age: default_max_age(),
        }
    }
}

impl From<QueueLimitsConfig> for RuntimeQueueLimits {
    fn from(cfg: QueueLimitsConfig) -> Self {
        RuntimeQueueLimits { max_items: cfg.max_items, max_bytes: cfg.max_bytes, max_age: cfg.max_age }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TenantCacheConfig {
    #[serde(default = "default_tenant_ttl")]
    pub ttl: Duration,
}

impl Default for TenantCacheConfig {
    fn default() -> Self {
        Self { ttl: default_tenant_ttl() }
    }
}

/// Top-level configuration for one publisher multiplexer.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_backoff_min")]
    pub backoff_min: Duration,
    #[serde(default = "default_backoff_max")]
    pub backoff_max: Duration,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: Duration,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime: Duration,
    /// Fraction of `max_lifetime` the lifetime checker jitters its deadline
    /// by, so tenants spawned together don't all refresh in lockstep.
    #[serde(default = "default_max_lifetime_jitter")]
    pub max_lifetime_jitter: f64,
    #[serde(default = "default_max_gap")]
    pub max_gap: Duration,
    #[serde(default = "default_max_push_bytes")]
    pub max_push_bytes: usize,
    /// How long a `Wait`-classified response pauses sending for.
    #[serde(default = "default_wait_delay")]
    pub wait_delay: Duration,
    /// How long a `Tenant`-classified response (401, tenant-fetch failure)
    /// pauses sending for, before the next attempt picks up the refreshed
    /// tenant record.
    #[serde(default = "default_tenant_delay")]
    pub tenant_delay: Duration,
    /// How long a `Fatal`-classified response discards data for.
    #[serde(default = "default_discard_duration")]
    pub discard_duration: Duration,
    #[serde(default)]
    pub queue_limits: QueueLimitsConfig,
    #[serde(default)]
    pub tenant_cache: TenantCacheConfig,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            backoff_min: default_backoff_min(),
            backoff_max: default_backoff_max(),
            max_retries: default_max_retries(),
            idle_timeout: default_idle_timeout(),
            max_lifetime: default_max_lifetime(),
            max_lifetime_jitter: default_max_lifetime_jitter(),
            max_gap: default_max_gap(),
            max_push_bytes: default_max_push_bytes(),
            wait_delay: default_wait_delay(),
            tenant_delay: default_tenant_delay(),
            discard_duration: default_discard_duration(),
            queue_limits: QueueLimitsConfig::default(),
            tenant_cache: TenantCacheConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_literals() {
        let cfg = PublisherConfig::default();
        assert_eq!(cfg.backoff_min, Duration::from_millis(30));
        assert_eq!(cfg.backoff_max, Duration::from_secs(2));
        assert_eq!(cfg.max_retries, 20);
    }

    #[test]
    fn deserializes_from_json_with_partial_overrides() {
        let json = r#"{"max_retries": 5}"#;
        let cfg: PublisherConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.backoff_min, Duration::from_millis(30));
    }
}
