//! Per-tenant publishing state machine: two independent sending loops (one
//! per [`PayloadKind`]) sharing one lifecycle, plus idle and max-lifetime
//! watchdogs that tear the whole thing down.

use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::buffer_pool::BufferPool;
use crate::concat_reader::ConcatFramedReader;
use crate::condition::Condition;
use crate::config::PublisherConfig;
use crate::error::{classify, ErrorKind, SendOutcome};
use crate::gap_filler::GapFiller;
use crate::id::GlobalId;
use crate::jitter::Jitter;
use crate::metrics::TenantMetrics;
use crate::payload::{Payload, PayloadKind};
use crate::queue::{BoundedQueue, QueueEntry};
use crate::remote::{RemoteWriteClient, SendRequest};
use crate::retry_budget::RetryBudget;
use crate::tenant_cache::TenantCache;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("encoding metric batch: {0}")]
    EncodeMetrics(#[source] prost::EncodeError),
    #[error("encoding log batch: {0}")]
    EncodeLogs(#[source] prost::EncodeError),
    #[error("compressing batch: {0}")]
    Compress(#[source] snap::Error),
}

/// The tenant pusher's lifecycle. A sending loop consults this before
/// taking a batch off its queue; only `Active` sends immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PusherState {
    Active,
    /// Paused by a rate-limit response; resumes sending at this instant,
    /// keeping whatever is queued.
    DelayingFor(Instant),
    /// Discarding everything (queued and incoming) until this instant,
    /// after a fatal/unrecoverable response.
    DiscardingUntil(Instant),
    /// Torn down; both sending loops exit and the handler is evicted.
    Terminated,
}

/// Pure decision: what state a pusher should move to after a classified
/// send result. Kept free of I/O so it's exhaustively unit-testable.
fn next_state(
    kind: ErrorKind,
    now: Instant,
    wait_delay: Duration,
    tenant_delay: Duration,
    discard_for: Duration,
) -> Option<PusherState> {
    match kind {
        ErrorKind::NoError | ErrorKind::Payload => None,
        ErrorKind::Network => None,
        ErrorKind::Wait => Some(PusherState::DelayingFor(now + wait_delay)),
        ErrorKind::Tenant => Some(PusherState::DelayingFor(now + tenant_delay)),
        ErrorKind::Fatal => Some(PusherState::DiscardingUntil(now + discard_for)),
        ErrorKind::Terminated => Some(PusherState::Terminated),
    }
}

enum Disposition {
    Requeue,
    Drop,
}

struct SendLoopContext {
    tenant: GlobalId,
    kind: PayloadKind,
    queue: Arc<BoundedQueue>,
    state: Arc<AsyncMutex<PusherState>>,
    backoff: Arc<AsyncMutex<Backoff>>,
    retry_budget: Arc<AsyncMutex<RetryBudget>>,
    tenant_cache: Arc<TenantCache>,
    remote: Arc<dyn RemoteWriteClient>,
    pool: Arc<BufferPool>,
    metrics: TenantMetrics,
    config: PublisherConfig,
    cancel: CancellationToken,
}

async fn run_sending_loop(ctx: SendLoopContext) {
    let kind_metrics = ctx.metrics.for_kind(ctx.kind);
    loop {
        if matches!(*ctx.state.lock().await, PusherState::Terminated) {
            return;
        }

        if !ctx.queue.condition().wait(&ctx.cancel).await {
            return;
        }

        if !wait_out_pause(&ctx).await {
            return;
        }

        let batch = ctx.queue.get(ctx.config.max_push_bytes);
        if batch.is_empty() {
            continue;
        }

        let Some(body) = encode_batch(&batch) else {
            for entry in batch {
                ctx.pool.release(entry.data);
            }
            continue;
        };

        let tenant_record = match ctx.tenant_cache.get_tenant(ctx.tenant).await {
            Ok(record) => record,
            Err(_) => {
                ctx.queue.requeue(batch);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                    _ = ctx.cancel.cancelled() => return,
                }
                continue;
            }
        };
        let remote_config = match ctx.kind {
            PayloadKind::Metrics => &tenant_record.metrics_remote,
            PayloadKind::Logs => &tenant_record.events_remote,
        };

        kind_metrics.inc_push();
        kind_metrics.add_bytes(body.len() as u64);

        let outcome =
            ctx.remote.send(SendRequest { remote: remote_config, kind: ctx.kind, body, timeout: Duration::from_secs(30) }).await;
        let classified = classify(outcome);
        if let Some(status) = classified.status {
            kind_metrics.inc_response(&status.to_string());
        }

        let disposition = apply_outcome(&ctx, &kind_metrics, classified.kind, batch.len()).await;
        match disposition {
            Disposition::Requeue => ctx.queue.requeue(batch),
            Disposition::Drop => {
                for entry in batch {
                    ctx.pool.release(entry.data);
                }
            }
        }

        if matches!(*ctx.state.lock().await, PusherState::Terminated) {
            return;
        }
    }
}

/// Sleeps out a `DelayingFor`/`DiscardingUntil` pause, draining (and
/// counting as dropped) anything that accumulates while discarding.
/// Returns `false` if cancelled mid-wait.
async fn wait_out_pause(ctx: &SendLoopContext) -> bool {
    loop {
        let now = Instant::now();
        let state = *ctx.state.lock().await;
        match state {
            PusherState::Terminated => return false,
            PusherState::DiscardingUntil(until) if now < until => {
                let dropped = ctx.queue.get(usize::MAX).len() as u64;
                if dropped > 0 {
                    ctx.metrics.for_kind(ctx.kind).inc_dropped(dropped);
                }
                tokio::select! {
                    _ = tokio::time::sleep(until - now) => {}
                    _ = ctx.cancel.cancelled() => return false,
                }
            }
            PusherState::DiscardingUntil(_) => {
                *ctx.state.lock().await = PusherState::Active;
                return true;
            }
            PusherState::DelayingFor(until) if now < until => {
                tokio::select! {
                    _ = tokio::time::sleep(until - now) => {}
                    _ = ctx.cancel.cancelled() => return false,
                }
            }
            PusherState::DelayingFor(_) => {
                *ctx.state.lock().await = PusherState::Active;
                return true;
            }
            PusherState::Active => return true,
        }
    }
}

async fn apply_outcome(
    ctx: &SendLoopContext,
    kind_metrics: &crate::metrics::KindMetrics,
    kind: ErrorKind,
    batch_len: usize,
) -> Disposition {
    if let Some(state) = next_state(
        kind,
        Instant::now(),
        ctx.config.wait_delay,
        ctx.config.tenant_delay,
        ctx.config.discard_duration,
    ) {
        let (local, region) = ctx.tenant.decode();
        tracing::info!(tenant_id = local, region_id = region, kind = ?kind, ?state, "tenant pusher state transition");
        *ctx.state.lock().await = state;
    }

    match kind {
        ErrorKind::NoError => {
            ctx.backoff.lock().await.reset();
            ctx.retry_budget.lock().await.reset();
            Disposition::Drop
        }
        ErrorKind::Network => {
            kind_metrics.inc_error("network");
            let granted = ctx.retry_budget.lock().await.retry();
            if granted {
                kind_metrics.inc_retry();
                ctx.backoff.lock().await.wait(&ctx.cancel).await;
                Disposition::Requeue
            } else {
                kind_metrics.inc_failed("retries_exhausted");
                kind_metrics.inc_dropped(batch_len as u64);
                Disposition::Drop
            }
        }
        ErrorKind::Wait => {
            kind_metrics.inc_error("wait");
            Disposition::Requeue
        }
        ErrorKind::Tenant => {
            kind_metrics.inc_error("tenant");
            ctx.tenant_cache.invalidate(ctx.tenant).await;
            Disposition::Requeue
        }
        ErrorKind::Payload => {
            kind_metrics.inc_error("payload");
            kind_metrics.inc_failed("payload_rejected");
            kind_metrics.inc_dropped(batch_len as u64);
            Disposition::Drop
        }
        ErrorKind::Fatal => {
            kind_metrics.inc_error("fatal");
            kind_metrics.inc_failed("fatal");
            kind_metrics.inc_dropped(batch_len as u64);
            Disposition::Drop
        }
        ErrorKind::Terminated => Disposition::Drop,
    }
}

fn encode_batch(batch: &[QueueEntry]) -> Option<Vec<u8>> {
    let frames: Vec<Bytes> = batch.iter().map(|e| e.data.clone()).collect();
    let mut reader = ConcatFramedReader::new(frames).ok()?;
    let mut body = Vec::new();
    reader.read_to_end(&mut body).ok()?;
    Some(body)
}

fn encode_payload_metrics(payload: &Payload) -> Result<Bytes, PublishError> {
    let wire = crate::wire::write_request(payload);
    let mut buf = Vec::new();
    prost::Message::encode(&wire, &mut buf).map_err(PublishError::EncodeMetrics)?;
    let frame = snap::raw::Encoder::new().compress_vec(&buf).map_err(PublishError::Compress)?;
    Ok(Bytes::from(frame))
}

fn encode_payload_logs(payload: &Payload) -> Result<Bytes, PublishError> {
    let wire = crate::wire::push_request(payload);
    let mut buf = Vec::new();
    prost::Message::encode(&wire, &mut buf).map_err(PublishError::EncodeLogs)?;
    let frame = snap::raw::Encoder::new().compress_vec(&buf).map_err(PublishError::Compress)?;
    Ok(Bytes::from(frame))
}

/// Caller-facing handle to a running tenant pusher: enqueues payloads and
/// exposes whether the pusher has torn itself down.
pub struct TenantPusherHandle {
    tenant: GlobalId,
    metrics_queue: Arc<BoundedQueue>,
    logs_queue: Arc<BoundedQueue>,
    gap_filler: Arc<GapFiller>,
    cancel: CancellationToken,
    created_at: Instant,
    last_activity_millis: AtomicU64,
    /// `max_lifetime` jittered once at spawn time; zero means disabled.
    lifetime_deadline: Duration,
}

impl TenantPusherHandle {
    pub fn publish(&self, mut payload: Payload) -> Result<(), PublishError> {
        self.touch();
        self.gap_filler.process(self.tenant, &mut payload.metrics);

        if !payload.metrics.is_empty() {
            self.metrics_queue.insert(encode_payload_metrics(&payload)?);
        }
        if !payload.streams.is_empty() {
            self.logs_queue.insert(encode_payload_logs(&payload)?);
        }
        Ok(())
    }

    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn touch(&self) {
        self.last_activity_millis.store(self.created_at.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_millis.load(Ordering::Relaxed));
        self.created_at.elapsed().saturating_sub(last)
    }

    fn exceeded_lifetime(&self) -> bool {
        self.lifetime_deadline != Duration::ZERO && self.created_at.elapsed() >= self.lifetime_deadline
    }
}

/// Spawns a tenant pusher: two sending loops and two watchdog tasks, all
/// cancelled together when `handle.cancel_token()` fires.
pub fn spawn_tenant_pusher(
    tenant: GlobalId,
    config: PublisherConfig,
    tenant_cache: Arc<TenantCache>,
    gap_filler: Arc<GapFiller>,
    remote: Arc<dyn RemoteWriteClient>,
    pool: Arc<BufferPool>,
    metrics: TenantMetrics,
    parent_cancel: &CancellationToken,
) -> (Arc<TenantPusherHandle>, Vec<tokio::task::JoinHandle<()>>) {
    let cancel = parent_cancel.child_token();
    let metrics_queue = Arc::new(BoundedQueue::new(config.queue_limits.into(), pool.clone()));
    let logs_queue = Arc::new(BoundedQueue::new(config.queue_limits.into(), pool.clone()));

    let lifetime_deadline = if config.max_lifetime == Duration::ZERO {
        Duration::ZERO
    } else {
        Jitter::symmetric(config.max_lifetime_jitter).apply(config.max_lifetime)
    };

    let handle = Arc::new(TenantPusherHandle {
        tenant,
        metrics_queue: metrics_queue.clone(),
        logs_queue: logs_queue.clone(),
        gap_filler,
        cancel: cancel.clone(),
        created_at: Instant::now(),
        last_activity_millis: AtomicU64::new(0),
        lifetime_deadline,
    });

    let mut tasks = Vec::with_capacity(4);

    for (kind, queue) in [(PayloadKind::Metrics, metrics_queue), (PayloadKind::Logs, logs_queue)] {
        let ctx = SendLoopContext {
            tenant,
            kind,
            queue,
            state: Arc::new(AsyncMutex::new(PusherState::Active)),
            backoff: Arc::new(AsyncMutex::new(Backoff::new(config.backoff_min, config.backoff_max))),
            retry_budget: Arc::new(AsyncMutex::new(RetryBudget::new(config.max_retries))),
            tenant_cache: tenant_cache.clone(),
            remote: remote.clone(),
            pool: pool.clone(),
            metrics: metrics.clone(),
            config: config.clone(),
            cancel: cancel.clone(),
        };
        tasks.push(tokio::spawn(run_sending_loop(ctx)));
    }

    {
        let handle = handle.clone();
        let cancel = cancel.clone();
        let idle_metrics = metrics.clone();
        let idle_timeout = config.idle_timeout;
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    _ = cancel.cancelled() => return,
                }
                let idle_for = handle.idle_for();
                idle_metrics.set_idle_seconds(idle_for.as_secs() as i64);
                if idle_timeout != Duration::ZERO && idle_for >= idle_timeout {
                    let (local, region) = handle.tenant.decode();
                    tracing::info!(tenant_id = local, region_id = region, "tenant pusher idle timeout, terminating");
                    cancel.cancel();
                    return;
                }
            }
        }));
    }

    {
        let handle = handle.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    _ = cancel.cancelled() => return,
                }
                if handle.exceeded_lifetime() {
                    let (local, region) = handle.tenant.decode();
                    tracing::info!(tenant_id = local, region_id = region, "tenant pusher exceeded max lifetime, refreshing");
                    cancel.cancel();
                    return;
                }
            }
        }));
    }

    (handle, tasks)
}
