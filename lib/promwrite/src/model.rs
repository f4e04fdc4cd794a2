//! Caller-facing time series types.

use chrono::{DateTime, Utc};

/// Name of the label holding the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A label.
///
/// Labels are passed through to the receiver exactly as given: names are not validated, and duplicates are not
/// removed.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Label {
    /// Label name.
    pub name: String,

    /// Label value.
    pub value: String,
}

impl Label {
    /// Creates a new `Label`.
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a new `Label` holding the metric name.
    pub fn metric_name<V: Into<String>>(value: V) -> Self {
        Self::new(METRIC_NAME_LABEL, value)
    }
}

/// A sample.
///
/// The timestamp keeps whatever precision it was given with, and is truncated to whole milliseconds when sent.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Point in time the value was observed.
    pub time: DateTime<Utc>,

    /// Observed value.
    pub value: f64,
}

impl Sample {
    /// Creates a new `Sample`.
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self { time, value }
    }

    /// Creates a new `Sample` observed at the current time.
    pub fn now(value: f64) -> Self {
        Self::new(Utc::now(), value)
    }
}

/// A time series with a single sample.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    /// Labels identifying the series, in the order they will be sent.
    pub labels: Vec<Label>,

    /// The sample.
    pub sample: Sample,
}

impl TimeSeries {
    /// Creates a new `TimeSeries`.
    pub fn new(labels: Vec<Label>, sample: Sample) -> Self {
        Self { labels, sample }
    }
}

/// A write request.
///
/// Series are sent in the order they were added.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteRequest {
    /// Time series to write.
    pub time_series: Vec<TimeSeries>,
}

impl WriteRequest {
    /// Creates a new `WriteRequest` from the given series.
    pub fn new(time_series: Vec<TimeSeries>) -> Self {
        Self { time_series }
    }

    /// Appends a series to the request.
    pub fn push(&mut self, series: TimeSeries) {
        self.time_series.push(series);
    }

    /// Returns the number of series in the request.
    pub fn len(&self) -> usize {
        self.time_series.len()
    }

    /// Returns `true` if the request contains no series.
    pub fn is_empty(&self) -> bool {
        self.time_series.is_empty()
    }
}

impl FromIterator<TimeSeries> for WriteRequest {
    fn from_iter<I: IntoIterator<Item = TimeSeries>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
