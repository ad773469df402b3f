//! Error classification for remote-write/push send outcomes.
//!
//! Mirrors the tagged-variant-with-inner-cause style the resilience
//! primitives use for their own error type: one enum naming every outcome
//! a caller needs to branch on, with the underlying cause (if any) attached
//! rather than swallowed.

use std::fmt;

/// What a failed (or successful) send means for the tenant pusher's state
/// machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The send succeeded.
    NoError,
    /// Transport-level failure, or a 5xx: worth retrying without penalty.
    Network,
    /// The batch itself was rejected (4xx, structural): drop and move on.
    Payload,
    /// Rate limited: delay before the next attempt, but keep the batch.
    Wait,
    /// Tenant/auth trouble: re-fetch tenant info before the next attempt.
    Tenant,
    /// Unrecoverable for this batch or tenant: discard and back off hard.
    Fatal,
    /// The pusher is shutting down; stop without penalizing anything.
    Terminated,
}

/// The outcome of attempting one send, before classification.
#[derive(Debug)]
pub enum SendOutcome {
    Success,
    Cancelled,
    DeadlineExceeded,
    /// Transport failure that never produced an HTTP status code.
    NoHttpCode(Box<dyn std::error::Error + Send + Sync>),
    Http { status: u16, body: String },
}

/// A classified push result.
#[derive(Debug)]
pub struct PushError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    detail: Option<String>,
}

impl PushError {
    fn new(kind: ErrorKind, status: Option<u16>, detail: Option<String>) -> Self {
        Self { kind, status, detail }
    }

    pub fn is_retryable_without_delay(&self) -> bool {
        matches!(self.kind, ErrorKind::Network)
    }
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.detail) {
            (Some(status), Some(detail)) => {
                write!(f, "push failed ({:?}, status={status}): {detail}", self.kind)
            }
            (Some(status), None) => write!(f, "push failed ({:?}, status={status})", self.kind),
            (None, Some(detail)) => write!(f, "push failed ({:?}): {detail}", self.kind),
            (None, None) => write!(f, "push failed ({:?})", self.kind),
        }
    }
}

impl std::error::Error for PushError {}

/// Classifies a send outcome into an [`ErrorKind`], per the fixed-status
/// table with body-substring overrides below.
pub fn classify(outcome: SendOutcome) -> PushError {
    match outcome {
        SendOutcome::Success => PushError::new(ErrorKind::NoError, Some(200), None),
        SendOutcome::Cancelled => PushError::new(ErrorKind::Terminated, None, None),
        SendOutcome::DeadlineExceeded => {
            PushError::new(ErrorKind::Network, None, Some("deadline exceeded".into()))
        }
        SendOutcome::NoHttpCode(cause) => {
            PushError::new(ErrorKind::Network, None, Some(cause.to_string()))
        }
        SendOutcome::Http { status, body } => {
            let kind = classify_status(status, &body);
            PushError::new(kind, Some(status), Some(body))
        }
    }
}

fn classify_status(status: u16, body: &str) -> ErrorKind {
    match status {
        401 => ErrorKind::Tenant,
        403 | 404 | 405 => ErrorKind::Fatal,
        400 => {
            if body.contains("err-mimir-max-series-per-user") {
                ErrorKind::Fatal
            } else {
                ErrorKind::Payload
            }
        }
        429 => {
            if body.contains("limit: 0 ") || body.contains("Maximum active stream limit exceeded")
            {
                ErrorKind::Fatal
            } else {
                ErrorKind::Wait
            }
        }
        500 => {
            if body.contains("looks like there is an issue with this instance") {
                ErrorKind::Tenant
            } else {
                bucket(status)
            }
        }
        _ => bucket(status),
    }
}

fn bucket(status: u16) -> ErrorKind {
    match status / 100 {
        2 => ErrorKind::NoError,
        3 => ErrorKind::Fatal,
        4 => ErrorKind::Payload,
        5 => ErrorKind::Network,
        _ => ErrorKind::Fatal,
    }
}
