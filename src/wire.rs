//! Protobuf wire shapes for remote-write (metrics) and push (logs) requests,
//! plus conversions from the in-memory [`crate::payload`] model.

use crate::payload::{LogStream, Payload, TimeSeries};

#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<WireTimeSeries>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireTimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<WireLabel>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<WireSample>,
    #[prost(message, repeated, tag = "3")]
    pub exemplars: Vec<WireExemplar>,
    #[prost(message, repeated, tag = "4")]
    pub histograms: Vec<WireHistogramSample>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireExemplar {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp_ms: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireHistogramSample {
    #[prost(int64, tag = "1")]
    pub timestamp_ms: i64,
    #[prost(uint64, tag = "2")]
    pub count: u64,
    #[prost(double, tag = "3")]
    pub sum: f64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireLabel {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireSample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp_ms: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PushRequest {
    #[prost(message, repeated, tag = "1")]
    pub streams: Vec<WireStream>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireStream {
    #[prost(string, tag = "1")]
    pub labels: String,
    #[prost(message, repeated, tag = "2")]
    pub entries: Vec<WireEntry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireEntry {
    #[prost(int64, tag = "1")]
    pub timestamp_unix_nano: i64,
    #[prost(string, tag = "2")]
    pub line: String,
}

impl From<&TimeSeries> for WireTimeSeries {
    fn from(ts: &TimeSeries) -> Self {
        WireTimeSeries {
            labels: ts
                .labels
                .iter()
                .map(|l| WireLabel { name: l.name.clone(), value: l.value.clone() })
                .collect(),
            samples: ts
                .samples
                .iter()
                .map(|s| WireSample { value: s.value, timestamp_ms: s.timestamp_ms })
                .collect(),
            exemplars: ts
                .exemplars
                .iter()
                .map(|e| WireExemplar { value: e.value, timestamp_ms: e.timestamp_ms })
                .collect(),
            histograms: ts
                .histograms
                .iter()
                .map(|h| WireHistogramSample { timestamp_ms: h.timestamp_ms, count: h.count, sum: h.sum })
                .collect(),
        }
    }
}

impl From<&LogStream> for WireStream {
    fn from(stream: &LogStream) -> Self {
        WireStream {
            labels: stream.labels.clone(),
            entries: stream
                .entries
                .iter()
                .map(|e| WireEntry {
                    timestamp_unix_nano: e.timestamp_unix_nano,
                    line: e.line.clone(),
                })
                .collect(),
        }
    }
}

pub fn write_request(payload: &Payload) -> WriteRequest {
    WriteRequest { timeseries: payload.metrics.iter().map(WireTimeSeries::from).collect() }
}

pub fn push_request(payload: &Payload) -> PushRequest {
    PushRequest { streams: payload.streams.iter().map(WireStream::from).collect() }
}
