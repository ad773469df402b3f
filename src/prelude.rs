//! Convenient re-exports for the common entry points.
pub use crate::{
    classify, BoundedQueue, Condition, ErrorKind, GapFiller, GlobalId, HttpRemoteWriteClient,
    Payload, PayloadKind, PublishError, Publisher, PublisherConfig, PublisherMetrics, PushError,
    RemoteWriteClient, RouteError, SendOutcome, TenantCache, TenantSource,
};
