//! HTTP client collaborator used to actually send an encoded, Snappy-framed
//! batch to a tenant's remote-write or push endpoint.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SendOutcome;
use crate::payload::PayloadKind;
use crate::tenant_cache::RemoteConfig;

/// What the sending loop hands to the HTTP collaborator: already-encoded
/// bytes (the concatenated Snappy frame, header included) ready to POST.
pub struct SendRequest<'a> {
    pub remote: &'a RemoteConfig,
    pub kind: PayloadKind,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

#[async_trait]
pub trait RemoteWriteClient: Send + Sync {
    async fn send(&self, request: SendRequest<'_>) -> SendOutcome;
}

/// Default [`RemoteWriteClient`] backed by `reqwest`.
pub struct HttpRemoteWriteClient {
    client: reqwest::Client,
}

impl HttpRemoteWriteClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self { client: reqwest::Client::builder().build()? })
    }
}

impl Default for HttpRemoteWriteClient {
    fn default() -> Self {
        Self::new().expect("default reqwest client configuration is always valid")
    }
}

#[async_trait]
impl RemoteWriteClient for HttpRemoteWriteClient {
    async fn send(&self, request: SendRequest<'_>) -> SendOutcome {
        let content_type = match request.kind {
            PayloadKind::Metrics => "application/x-protobuf",
            PayloadKind::Logs => "application/x-protobuf",
        };

        let result = self
            .client
            .post(&request.remote.url)
            .basic_auth(&request.remote.username, Some(&request.remote.password))
            .header("Content-Type", content_type)
            .header("Content-Encoding", "snappy")
            .header("X-Prometheus-Remote-Write-Version", "0.1.0")
            .timeout(request.timeout)
            .body(request.body)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    SendOutcome::Success
                } else {
                    let status_code = status.as_u16();
                    let body = response.text().await.unwrap_or_default();
                    SendOutcome::Http { status: status_code, body }
                }
            }
            Err(err) => {
                if err.is_timeout() {
                    SendOutcome::DeadlineExceeded
                } else {
                    SendOutcome::NoHttpCode(Box::new(err))
                }
            }
        }
    }
}
