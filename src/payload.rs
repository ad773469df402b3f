//! Data model: the shape of a single publish for one tenant.

use crate::id::GlobalId;

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exemplar {
    pub timestamp_ms: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramSample {
    pub timestamp_ms: i64,
    pub count: u64,
    pub sum: f64,
}

/// One metric series: a label set plus the samples collected for it in this
/// publish.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    pub labels: Vec<Label>,
    pub samples: Vec<Sample>,
    pub exemplars: Vec<Exemplar>,
    pub histograms: Vec<HistogramSample>,
}

impl TimeSeries {
    /// Canonical key for this series' label set: labels sorted by name and
    /// joined, independent of the order the caller built them in.
    pub fn label_key(&self) -> String {
        let mut sorted: Vec<&Label> = self.labels.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        let mut key = String::new();
        for label in sorted {
            key.push_str(&label.name);
            key.push('=');
            key.push_str(&label.value);
            key.push('\x1f');
        }
        key
    }

    /// True when this series qualifies for gap-fill evaluation: exactly one
    /// sample, no exemplars, no histogram samples.
    pub fn is_gap_fill_candidate(&self) -> bool {
        self.samples.len() == 1 && self.exemplars.is_empty() && self.histograms.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp_unix_nano: i64,
    pub line: String,
}

/// A log stream: a logql-style label selector plus the entries collected
/// for it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogStream {
    pub labels: String,
    pub entries: Vec<LogEntry>,
}

/// Which sink kind a payload's data is destined for; used to select the
/// pusher's send loop and to curry metric label values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Metrics,
    Logs,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Metrics => "metrics",
            PayloadKind::Logs => "logs",
        }
    }
}

/// One tenant's publish: metric series and/or log streams produced by a
/// single probe run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    pub tenant: Option<GlobalId>,
    pub metrics: Vec<TimeSeries>,
    pub streams: Vec<LogStream>,
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.streams.is_empty()
    }
}
