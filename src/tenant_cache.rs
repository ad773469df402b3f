//! TTL cache of tenant info, refreshed either by a pull (on-demand fetch
//! through [`TenantSource`]) or a push (an out-of-band update arriving on a
//! channel). A map lock guards inserting new entries; each entry then has
//! its own lock, so concurrent lookups for different tenants never block
//! each other, and a slow fetch for one tenant never blocks lookups for
//! others.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::id::GlobalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TenantRecord {
    pub id: GlobalId,
    pub metrics_remote: RemoteConfig,
    pub events_remote: RemoteConfig,
    pub status: TenantStatus,
    pub modified: SystemTime,
}

#[derive(Debug, thiserror::Error)]
pub enum TenantFetchError {
    #[error("tenant {0} not found")]
    NotFound(GlobalId),
    #[error("tenant info source unavailable: {0}")]
    Unavailable(String),
}

/// Collaborator that knows how to look up a tenant by id. Implemented by
/// whatever talks to the actual tenant-info service; this crate only
/// depends on the trait.
#[async_trait]
pub trait TenantSource: Send + Sync {
    async fn fetch(&self, id: GlobalId) -> Result<TenantRecord, TenantFetchError>;
}

struct CacheEntry {
    state: AsyncMutex<Option<CachedState>>,
}

struct CachedState {
    record: TenantRecord,
    valid_until: Instant,
}

pub struct TenantCache {
    entries: RwLock<HashMap<u64, Arc<CacheEntry>>>,
    source: Arc<dyn TenantSource>,
    ttl: std::time::Duration,
}

impl TenantCache {
    pub fn new(source: Arc<dyn TenantSource>, ttl: std::time::Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), source, ttl }
    }

    /// Returns cached tenant info if still fresh, otherwise fetches through
    /// the source and caches the result.
    pub async fn get_tenant(&self, id: GlobalId) -> Result<TenantRecord, TenantFetchError> {
        let entry = self.entry_for(id);
        let mut guard = entry.state.lock().await;
        if let Some(state) = guard.as_ref() {
            if Instant::now() < state.valid_until {
                return Ok(state.record.clone());
            }
        }
        let record = self.source.fetch(id).await?;
        let (local, region) = id.decode();
        tracing::info!(tenant_id = local, region_id = region, "tenant cache refreshed via pull");
        *guard = Some(CachedState { record: record.clone(), valid_until: Instant::now() + self.ttl });
        Ok(record)
    }

    /// Forces the next [`TenantCache::get_tenant`] call for `id` to refetch,
    /// used after a `Tenant`-kind push error.
    pub async fn invalidate(&self, id: GlobalId) {
        let present = self.entries.read().unwrap().get(&id.raw()).cloned();
        if let Some(entry) = present {
            let mut guard = entry.state.lock().await;
            if guard.is_some() {
                let (local, region) = id.decode();
                tracing::warn!(tenant_id = local, region_id = region, "tenant cache entry invalidated");
            }
            *guard = None;
        }
    }

    /// Drives an out-of-band update channel until `cancel` fires. An
    /// incoming record only replaces the cached one if it's newer
    /// (`modified` strictly greater), so a push racing a concurrent pull
    /// never regresses the cache.
    pub async fn run_push_listener(
        &self,
        mut updates: mpsc::Receiver<TenantRecord>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = updates.recv() => {
                    match maybe {
                        Some(incoming) => self.apply_push(incoming).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn apply_push(&self, incoming: TenantRecord) {
        let entry = self.entry_for(incoming.id);
        let mut guard = entry.state.lock().await;
        let should_update = match guard.as_ref() {
            Some(state) => incoming.modified > state.record.modified,
            None => true,
        };
        if should_update {
            let (local, region) = incoming.id.decode();
            tracing::info!(tenant_id = local, region_id = region, "tenant cache refreshed via push");
            *guard =
                Some(CachedState { valid_until: Instant::now() + self.ttl, record: incoming });
        }
    }

    fn entry_for(&self, id: GlobalId) -> Arc<CacheEntry> {
        if let Some(entry) = self.entries.read().unwrap().get(&id.raw()) {
            return entry.clone();
        }
        let mut write_guard = self.entries.write().unwrap();
        write_guard
            .entry(id.raw())
            .or_insert_with(|| Arc::new(CacheEntry { state: AsyncMutex::new(None) }))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn remote(name: &str) -> RemoteConfig {
        RemoteConfig { url: format!("http://{name}"), username: name.into(), password: "".into() }
    }

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TenantSource for CountingSource {
        async fn fetch(&self, id: GlobalId) -> Result<TenantRecord, TenantFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TenantRecord {
                id,
                metrics_remote: remote("metrics"),
                events_remote: remote("events"),
                status: TenantStatus::Active,
                modified: SystemTime::now(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn caches_until_ttl_expires() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let cache = TenantCache::new(source.clone(), Duration::from_secs(10));
        let id = GlobalId::encode(1, 1);

        cache.get_tenant(id).await.unwrap();
        cache.get_tenant(id).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.get_tenant(id).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let cache = TenantCache::new(source.clone(), Duration::from_secs(60));
        let id = GlobalId::encode(1, 1);

        cache.get_tenant(id).await.unwrap();
        cache.invalidate(id).await;
        cache.get_tenant(id).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn newer_push_replaces_cached_record() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let cache = TenantCache::new(source.clone(), Duration::from_secs(60));
        let id = GlobalId::encode(1, 1);
        cache.get_tenant(id).await.unwrap();

        let newer = TenantRecord {
            id,
            metrics_remote: remote("new-metrics"),
            events_remote: remote("events"),
            status: TenantStatus::Suspended,
            modified: SystemTime::now() + Duration::from_secs(5),
        };
        cache.apply_push(newer).await;

        let record = cache.get_tenant(id).await.unwrap();
        assert_eq!(record.status, TenantStatus::Suspended);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_push_does_not_replace_cached_record() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let cache = TenantCache::new(source.clone(), Duration::from_secs(60));
        let id = GlobalId::encode(1, 1);
        let first = cache.get_tenant(id).await.unwrap();

        let older = TenantRecord {
            id,
            metrics_remote: remote("stale"),
            events_remote: remote("events"),
            status: TenantStatus::Suspended,
            modified: first.modified - Duration::from_secs(5),
        };
        cache.apply_push(older).await;

        let record = cache.get_tenant(id).await.unwrap();
        assert_eq!(record.status, TenantStatus::Active);
    }
}
