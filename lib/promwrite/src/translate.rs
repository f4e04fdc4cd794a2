//! Translation from caller-facing types to the remote write wire model.
//!
//! Translation is infallible and performs no validation: empty label sets, empty requests, non-finite values and
//! duplicate labels are all passed through, since the receiver is the authority on what it accepts.

use chrono::{DateTime, Utc};
use prometheus_protos as proto;

use crate::model::{Label, Sample, TimeSeries, WriteRequest};

const NANOS_PER_SEC: i128 = 1_000_000_000;
const NANOS_PER_MILLI: i128 = 1_000_000;

/// Converts a point in time to milliseconds since the Unix epoch.
///
/// The nanosecond timestamp is divided by 1,000,000, truncating toward zero, across the whole range of `DateTime`.
pub fn timestamp_millis(time: &DateTime<Utc>) -> i64 {
    let nanos = i128::from(time.timestamp()) * NANOS_PER_SEC + i128::from(time.timestamp_subsec_nanos());

    // Any `DateTime` is within a few hundred thousand years of the epoch, which always fits in an `i64` of millis.
    (nanos / NANOS_PER_MILLI) as i64
}

impl From<&Label> for proto::Label {
    fn from(label: &Label) -> Self {
        proto::Label {
            name: label.name.clone(),
            value: label.value.clone(),
        }
    }
}

impl From<&Sample> for proto::Sample {
    fn from(sample: &Sample) -> Self {
        proto::Sample {
            value: sample.value,
            timestamp: timestamp_millis(&sample.time),
        }
    }
}

impl From<&TimeSeries> for proto::TimeSeries {
    fn from(series: &TimeSeries) -> Self {
        proto::TimeSeries {
            labels: series.labels.iter().map(proto::Label::from).collect(),
            samples: vec![proto::Sample::from(&series.sample)],
        }
    }
}

impl From<&WriteRequest> for proto::WriteRequest {
    fn from(request: &WriteRequest) -> Self {
        proto::WriteRequest {
            timeseries: request.time_series.iter().map(proto::TimeSeries::from).collect(),
        }
    }
}
