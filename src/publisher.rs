//! The multiplexer: routes an incoming [`Payload`] to its tenant's pusher,
//! creating one on first use. Exactly one handler exists per tenant at a
//! time; replacing a terminated handler with a fresh one is a lock-free
//! compare-and-swap, so no publish ever blocks on another tenant's I/O.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use arc_swap::ArcSwapOption;
use tokio_util::sync::CancellationToken;

use crate::buffer_pool::BufferPool;
use crate::config::PublisherConfig;
use crate::gap_filler::GapFiller;
use crate::id::GlobalId;
use crate::metrics::PublisherMetrics;
use crate::payload::Payload;
use crate::pusher::{spawn_tenant_pusher, PublishError, TenantPusherHandle};
use crate::remote::RemoteWriteClient;
use crate::tenant_cache::TenantCache;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("payload has no tenant")]
    MissingTenant,
    #[error(transparent)]
    Publish(#[from] PublishError),
}

type Slot = Arc<ArcSwapOption<TenantPusherHandle>>;

pub struct Publisher {
    handlers: RwLock<HashMap<GlobalId, Slot>>,
    config: PublisherConfig,
    tenant_cache: Arc<TenantCache>,
    gap_filler: Arc<GapFiller>,
    remote: Arc<dyn RemoteWriteClient>,
    pool: Arc<BufferPool>,
    metrics: PublisherMetrics,
    cancel: CancellationToken,
    tasks: std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Publisher {
    pub fn new(
        config: PublisherConfig,
        tenant_cache: Arc<TenantCache>,
        remote: Arc<dyn RemoteWriteClient>,
        metrics: PublisherMetrics,
    ) -> Self {
        let gap_filler = Arc::new(GapFiller::new(config.max_gap));
        Self {
            handlers: RwLock::new(HashMap::new()),
            config,
            tenant_cache,
            gap_filler,
            remote,
            pool: Arc::new(BufferPool::new()),
            metrics,
            cancel: CancellationToken::new(),
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Routes `payload` to its tenant's pusher, spawning one if needed.
    pub fn publish(&self, payload: Payload) -> Result<(), RouteError> {
        let tenant = payload.tenant.ok_or(RouteError::MissingTenant)?;
        let handle = self.handler_for(tenant);
        handle.publish(payload)?;
        Ok(())
    }

    /// Cancels every tenant pusher. Awaiting the returned handles lets a
    /// caller block until every sending loop and watchdog has actually
    /// exited.
    pub fn shutdown(&self) -> Vec<tokio::task::JoinHandle<()>> {
        self.cancel.cancel();
        std::mem::take(&mut self.tasks.lock().unwrap())
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().unwrap().len()
    }

    fn handler_for(&self, tenant: GlobalId) -> Arc<TenantPusherHandle> {
        let slot = self.slot_for(tenant);

        if let Some(existing) = slot.load_full() {
            if !existing.is_terminated() {
                return existing;
            }
            let (local, region) = tenant.decode();
            tracing::info!(tenant_id = local, region_id = region, "tenant handler evicted, replacing");
        }

        let (candidate, tasks) = spawn_tenant_pusher(
            tenant,
            self.config.clone(),
            self.tenant_cache.clone(),
            self.gap_filler.clone(),
            self.remote.clone(),
            self.pool.clone(),
            self.metrics.for_tenant(tenant),
            &self.cancel,
        );

        let mut installed = None;
        slot.rcu(|current| {
            let keep_current = current.as_ref().is_some_and(|h| !h.is_terminated());
            if keep_current {
                installed = current.clone();
                current.clone()
            } else {
                installed = Some(candidate.clone());
                Some(candidate.clone())
            }
        });

        let winner = installed.expect("rcu always installs a value");
        if Arc::ptr_eq(&winner, &candidate) {
            let (local, region) = tenant.decode();
            tracing::info!(tenant_id = local, region_id = region, "tenant handler installed");
            self.metrics.handlers_total().inc();
            self.tasks.lock().unwrap().extend(tasks);
        } else {
            // lost the race: another publish() call installed its handler
            // first. Tear down the one we built instead of leaking it.
            candidate.cancel_token().cancel();
        }
        winner
    }

    fn slot_for(&self, tenant: GlobalId) -> Slot {
        if let Some(slot) = self.handlers.read().unwrap().get(&tenant) {
            return slot.clone();
        }
        let mut write_guard = self.handlers.write().unwrap();
        write_guard.entry(tenant).or_insert_with(|| Arc::new(ArcSwapOption::from(None))).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SendOutcome;
    use crate::payload::{Label, Sample, TimeSeries};
    use crate::remote::SendRequest;
    use crate::tenant_cache::{RemoteConfig, TenantFetchError, TenantRecord, TenantSource, TenantStatus};
    use async_trait::async_trait;
    use prometheus::Registry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};

    struct FixedSource;

    #[async_trait]
    impl TenantSource for FixedSource {
        async fn fetch(&self, id: GlobalId) -> Result<TenantRecord, TenantFetchError> {
            Ok(TenantRecord {
                id,
                metrics_remote: RemoteConfig { url: "http://metrics".into(), username: "".into(), password: "".into() },
                events_remote: RemoteConfig { url: "http://events".into(), username: "".into(), password: "".into() },
                status: TenantStatus::Active,
                modified: SystemTime::now(),
            })
        }
    }

    struct CountingRemote {
        sends: AtomicUsize,
    }

    #[async_trait]
    impl RemoteWriteClient for CountingRemote {
        async fn send(&self, _request: SendRequest<'_>) -> SendOutcome {
            self.sends.fetch_add(1, Ordering::SeqCst);
            SendOutcome::Success
        }
    }

    fn sample_payload(tenant: GlobalId) -> Payload {
        Payload {
            tenant: Some(tenant),
            metrics: vec![TimeSeries {
                labels: vec![Label { name: "__name__".into(), value: "up".into() }],
                samples: vec![Sample { timestamp_ms: 0, value: 1.0 }],
                ..Default::default()
            }],
            streams: vec![],
        }
    }

    fn publisher(remote: Arc<dyn RemoteWriteClient>) -> Publisher {
        let registry = Registry::new();
        let metrics = PublisherMetrics::new(&registry).unwrap();
        let tenant_cache = Arc::new(TenantCache::new(Arc::new(FixedSource), Duration::from_secs(60)));
        Publisher::new(PublisherConfig::default(), tenant_cache, remote, metrics)
    }

    #[test]
    fn publish_without_tenant_is_an_error() {
        let remote = Arc::new(CountingRemote { sends: AtomicUsize::new(0) });
        let publisher = publisher(remote);
        let err = publisher.publish(Payload::default()).unwrap_err();
        assert!(matches!(err, RouteError::MissingTenant));
    }

    #[tokio::test]
    async fn same_tenant_reuses_one_handler() {
        let remote = Arc::new(CountingRemote { sends: AtomicUsize::new(0) });
        let publisher = publisher(remote);
        let tenant = GlobalId::encode(1, 1);

        publisher.publish(sample_payload(tenant)).unwrap();
        publisher.publish(sample_payload(tenant)).unwrap();

        assert_eq!(publisher.handler_count(), 1);
        let _ = publisher.shutdown();
    }

    #[tokio::test]
    async fn distinct_tenants_get_distinct_handlers() {
        let remote = Arc::new(CountingRemote { sends: AtomicUsize::new(0) });
        let publisher = publisher(remote);

        publisher.publish(sample_payload(GlobalId::encode(1, 1))).unwrap();
        publisher.publish(sample_payload(GlobalId::encode(1, 2))).unwrap();

        assert_eq!(publisher.handler_count(), 2);
        let _ = publisher.shutdown();
    }
}
