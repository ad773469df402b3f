//! Shared black-box test support: stub collaborators and wire decoding.
//!
//! Not a test target itself (cargo only treats files directly under
//! `tests/` as integration test binaries); each scenario file pulls this
//! in with `mod common;`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tenant_publisher::{
    GlobalId, RemoteConfig, RemoteWriteClient, SendOutcome, TenantFetchError, TenantRecord,
    TenantSource, TenantStatus,
};
use tokio::sync::Mutex as AsyncMutex;

/// Remote-write collaborator that returns a scripted sequence of outcomes,
/// one per call, and records the exact bytes it was asked to send.
pub struct ScriptedRemote {
    outcomes: AsyncMutex<VecDeque<SendOutcome>>,
    bodies: AsyncMutex<Vec<Vec<u8>>>,
}

impl ScriptedRemote {
    pub fn new(outcomes: Vec<SendOutcome>) -> Self {
        Self { outcomes: AsyncMutex::new(outcomes.into()), bodies: AsyncMutex::new(Vec::new()) }
    }

    pub async fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.bodies.lock().await.len()
    }
}

#[async_trait]
impl RemoteWriteClient for ScriptedRemote {
    async fn send(&self, request: tenant_publisher::SendRequest<'_>) -> SendOutcome {
        self.bodies.lock().await.push(request.body);
        let mut outcomes = self.outcomes.lock().await;
        outcomes.pop_front().unwrap_or(SendOutcome::Success)
    }
}

/// Tenant source that always resolves the same tenant, counting fetches so
/// tests can assert how many times a re-fetch actually happened.
pub struct FixedSource {
    fetches: AtomicUsize,
}

impl FixedSource {
    pub fn new() -> Self {
        Self { fetches: AtomicUsize::new(0) }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantSource for FixedSource {
    async fn fetch(&self, id: GlobalId) -> Result<TenantRecord, TenantFetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(TenantRecord {
            id,
            metrics_remote: RemoteConfig {
                url: "http://metrics.example".into(),
                username: "tenant".into(),
                password: "secret".into(),
            },
            events_remote: RemoteConfig {
                url: "http://events.example".into(),
                username: "tenant".into(),
                password: "secret".into(),
            },
            status: TenantStatus::Active,
            modified: SystemTime::now(),
        })
    }
}

/// Mirrors the Prometheus remote-write `WriteRequest` wire shape so tests
/// can decode what actually went over the wire without reaching into the
/// crate's private `wire` module.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DecodedWriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<DecodedSeries>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecodedSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<DecodedLabel>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<DecodedSample>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecodedLabel {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecodedSample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp_ms: i64,
}

/// Decompresses a captured request body (one recombined Snappy raw block,
/// however many entries were concatenated into it) and decodes it as a
/// remote-write `WriteRequest`.
pub fn decode_write_request(body: &[u8]) -> DecodedWriteRequest {
    use prost::Message;
    let decompressed = snap::raw::Decoder::new().decompress_vec(body).expect("valid snappy block");
    DecodedWriteRequest::decode(decompressed.as_slice()).expect("valid WriteRequest")
}

/// Yields to the runtime enough times for spawned sending-loop tasks to
/// make progress through any non-blocking `.await` points.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

pub fn tenant(local: u64) -> GlobalId {
    GlobalId::encode(1, local)
}

pub fn metrics_payload(tenant: GlobalId, name: &str, value: f64, timestamp_ms: i64) -> tenant_publisher::Payload {
    tenant_publisher::Payload {
        tenant: Some(tenant),
        metrics: vec![tenant_publisher::TimeSeries {
            labels: vec![tenant_publisher::Label { name: "__name__".into(), value: name.into() }],
            samples: vec![tenant_publisher::Sample { timestamp_ms, value }],
            ..Default::default()
        }],
        streams: vec![],
    }
}
