//! Curried, per-tenant metric families.
//!
//! Modelled as value objects holding pre-bound label tuples: `for_tenant`
//! and `for_kind` each return a new handle sharing the same underlying
//! counter/gauge vectors, so call sites never repeat label values and can't
//! typo a label that was already bound upstream.

use prometheus::{IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

use crate::id::GlobalId;
use crate::payload::PayloadKind;

#[derive(Clone)]
pub struct PublisherMetrics {
    push_total: IntCounterVec,
    push_bytes_total: IntCounterVec,
    push_errors_total: IntCounterVec,
    push_failed_total: IntCounterVec,
    retries_total: IntCounterVec,
    drop_total: IntCounterVec,
    responses_total: IntCounterVec,
    handlers_total: IntGauge,
    push_idle_seconds: IntGaugeVec,
}

impl PublisherMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let labels = &["region_id", "tenant_id", "kind"];
        let push_total = IntCounterVec::new(
            Opts::new("publisher_push_total", "Total publish attempts."),
            labels,
        )?;
        let push_bytes_total = IntCounterVec::new(
            Opts::new("publisher_push_bytes_total", "Total bytes sent."),
            labels,
        )?;
        let push_errors_total = IntCounterVec::new(
            Opts::new("publisher_push_errors_total", "Push attempts that returned an error."),
            &["region_id", "tenant_id", "kind", "reason"],
        )?;
        let push_failed_total = IntCounterVec::new(
            Opts::new("publisher_push_failed_total", "Batches ultimately discarded."),
            &["region_id", "tenant_id", "kind", "reason"],
        )?;
        let retries_total = IntCounterVec::new(
            Opts::new("publisher_retries_total", "Retry attempts performed."),
            labels,
        )?;
        let drop_total = IntCounterVec::new(
            Opts::new("publisher_drop_total", "Queue entries dropped by limit enforcement."),
            labels,
        )?;
        let responses_total = IntCounterVec::new(
            Opts::new("publisher_responses_total", "Remote responses by status."),
            &["region_id", "tenant_id", "kind", "status"],
        )?;
        let handlers_total =
            IntGauge::new("publisher_handlers_total", "Currently installed tenant handlers.")?;
        let push_idle_seconds = IntGaugeVec::new(
            Opts::new("publisher_push_idle_seconds", "Seconds since a tenant pusher last received a publish."),
            &["region_id", "tenant_id"],
        )?;

        registry.register(Box::new(push_total.clone()))?;
        registry.register(Box::new(push_bytes_total.clone()))?;
        registry.register(Box::new(push_errors_total.clone()))?;
        registry.register(Box::new(push_failed_total.clone()))?;
        registry.register(Box::new(retries_total.clone()))?;
        registry.register(Box::new(drop_total.clone()))?;
        registry.register(Box::new(responses_total.clone()))?;
        registry.register(Box::new(handlers_total.clone()))?;
        registry.register(Box::new(push_idle_seconds.clone()))?;

        Ok(Self {
            push_total,
            push_bytes_total,
            push_errors_total,
            push_failed_total,
            retries_total,
            drop_total,
            responses_total,
            handlers_total,
            push_idle_seconds,
        })
    }

    pub fn handlers_total(&self) -> &IntGauge {
        &self.handlers_total
    }

    pub fn for_tenant(&self, tenant: GlobalId) -> TenantMetrics {
        let (local, region) = tenant.decode();
        TenantMetrics { metrics: self.clone(), region: region.to_string(), tenant: local.to_string() }
    }
}

#[derive(Clone)]
pub struct TenantMetrics {
    metrics: PublisherMetrics,
    region: String,
    tenant: String,
}

impl TenantMetrics {
    pub fn for_kind(&self, kind: PayloadKind) -> KindMetrics {
        KindMetrics {
            metrics: self.metrics.clone(),
            region: self.region.clone(),
            tenant: self.tenant.clone(),
            kind: kind.as_str(),
        }
    }

    pub fn set_idle_seconds(&self, seconds: i64) {
        self.metrics
            .push_idle_seconds
            .with_label_values(&[&self.region, &self.tenant])
            .set(seconds);
    }
}

#[derive(Clone)]
pub struct KindMetrics {
    metrics: PublisherMetrics,
    region: String,
    tenant: String,
    kind: &'static str,
}

impl KindMetrics {
    fn labels(&self) -> [&str; 3] {
        [&self.region, &self.tenant, self.kind]
    }

    pub fn inc_push(&self) {
        self.metrics.push_total.with_label_values(&self.labels()).inc();
    }

    pub fn add_bytes(&self, n: u64) {
        self.metrics.push_bytes_total.with_label_values(&self.labels()).inc_by(n);
    }

    pub fn inc_error(&self, reason: &str) {
        let [region, tenant, kind] = self.labels();
        self.metrics
            .push_errors_total
            .with_label_values(&[region, tenant, kind, reason])
            .inc();
    }

    pub fn inc_failed(&self, reason: &str) {
        let [region, tenant, kind] = self.labels();
        self.metrics
            .push_failed_total
            .with_label_values(&[region, tenant, kind, reason])
            .inc();
    }

    pub fn inc_retry(&self) {
        self.metrics.retries_total.with_label_values(&self.labels()).inc();
    }

    pub fn inc_dropped(&self, n: u64) {
        self.metrics.drop_total.with_label_values(&self.labels()).inc_by(n);
    }

    pub fn inc_response(&self, status: &str) {
        let [region, tenant, kind] = self.labels();
        self.metrics
            .responses_total
            .with_label_values(&[region, tenant, kind, status])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curried_handles_share_underlying_counters() {
        let registry = Registry::new();
        let metrics = PublisherMetrics::new(&registry).unwrap();
        let tenant = GlobalId::encode(2, 7);

        let kind_metrics = metrics.for_tenant(tenant).for_kind(PayloadKind::Metrics);
        kind_metrics.inc_push();
        kind_metrics.inc_push();

        let families = registry.gather();
        let push_total = families.iter().find(|f| f.name() == "publisher_push_total").unwrap();
        let metric = &push_total.get_metric()[0];
        assert_eq!(metric.get_counter().value(), 2.0);
        let label_values: Vec<_> =
            metric.get_label().iter().map(|l| (l.name(), l.value())).collect();
        assert!(label_values.contains(&("region_id", "2")));
        assert!(label_values.contains(&("tenant_id", "7")));
        assert!(label_values.contains(&("kind", "metrics")));
    }

    #[test]
    fn idle_gauge_tracks_per_tenant_seconds() {
        let registry = Registry::new();
        let metrics = PublisherMetrics::new(&registry).unwrap();
        let tenant = GlobalId::encode(3, 9);

        metrics.for_tenant(tenant).set_idle_seconds(42);

        let families = registry.gather();
        let idle = families.iter().find(|f| f.name() == "publisher_push_idle_seconds").unwrap();
        assert_eq!(idle.get_metric()[0].get_gauge().value(), 42.0);
    }

    #[test]
    fn handlers_gauge_tracks_installs_and_evictions() {
        let registry = Registry::new();
        let metrics = PublisherMetrics::new(&registry).unwrap();
        metrics.handlers_total().inc();
        metrics.handlers_total().inc();
        metrics.handlers_total().dec();
        assert_eq!(metrics.handlers_total().get(), 1);
    }
}
