#![forbid(unsafe_code)]

//! Per-tenant publishing core for a synthetic-monitoring agent.
//!
//! Accepts one [`Payload`] per tenant per probe run, multiplexes it to a
//! per-tenant pusher (spawned lazily, torn down on idleness or failure),
//! and drives remote-write/push delivery with bounded queues, gap-filled
//! metric series, and response-driven backoff/discard behaviour.

mod backoff;
mod buffer_pool;
mod clock;
mod concat_reader;
mod condition;
mod config;
mod error;
mod gap_filler;
mod id;
mod interpolation;
mod jitter;
mod metrics;
mod payload;
mod publisher;
mod pusher;
mod queue;
mod remote;
mod retry_budget;
mod sleeper;
mod tenant_cache;
mod wire;

pub use backoff::Backoff;
pub use buffer_pool::BufferPool;
pub use clock::{Clock, MonotonicClock};
pub use concat_reader::{ConcatFramedReader, ConcatReaderError};
pub use condition::Condition;
pub use config::{PublisherConfig, QueueLimitsConfig, TenantCacheConfig};
pub use error::{classify, ErrorKind, PushError, SendOutcome};
pub use gap_filler::GapFiller;
pub use id::GlobalId;
pub use interpolation::{interpolate, to_js_expression, validate_secret_name, InterpolationError};
pub use jitter::Jitter;
pub use metrics::{KindMetrics, PublisherMetrics, TenantMetrics};
pub use payload::{
    Exemplar, HistogramSample, Label, LogEntry, LogStream, Payload, PayloadKind, Sample,
    TimeSeries,
};
pub use publisher::{Publisher, RouteError};
pub use pusher::{PublishError, PusherState, TenantPusherHandle};
pub use queue::{BoundedQueue, QueueEntry, QueueLimits};
pub use remote::{HttpRemoteWriteClient, RemoteWriteClient, SendRequest};
pub use retry_budget::RetryBudget;
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use tenant_cache::{
    RemoteConfig, TenantCache, TenantFetchError, TenantRecord, TenantSource, TenantStatus,
};

pub mod prelude;
