//! Prometheus remote write Protocol Buffers definitions.
//!
//! This crate contains the message types of the remote write 1.0 protocol, matching `prompb/remote.proto` and
//! `prompb/types.proto` from the Prometheus repository. Only the fields used by the 1.0 protocol are defined: metadata,
//! exemplars and native histograms are not.
//!
//! The types are written by hand with `prost` derives rather than generated from `.proto` files, so building this crate
//! does not require `protoc`.
#![deny(warnings)]
#![deny(missing_docs)]

/// A write request.
///
/// ```protobuf
/// message WriteRequest {
///   repeated TimeSeries timeseries = 1;
///   reserved 2;
///   reserved 3;
/// }
/// ```
#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteRequest {
    /// Time series to write, in the order they should be seen by the receiver.
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

/// A time series.
///
/// ```protobuf
/// message TimeSeries {
///   repeated Label labels   = 1;
///   repeated Sample samples = 2;
/// }
/// ```
#[derive(Clone, PartialEq, prost::Message)]
pub struct TimeSeries {
    /// Labels identifying the series.
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,

    /// Samples of the series.
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

/// A label.
///
/// ```protobuf
/// message Label {
///   string name  = 1;
///   string value = 2;
/// }
/// ```
#[derive(Clone, Eq, Hash, PartialEq, prost::Message)]
pub struct Label {
    /// Label name.
    #[prost(string, tag = "1")]
    pub name: String,

    /// Label value.
    #[prost(string, tag = "2")]
    pub value: String,
}

/// A sample.
///
/// ```protobuf
/// message Sample {
///   double value    = 1;
///   int64 timestamp = 2;
/// }
/// ```
#[derive(Clone, PartialEq, prost::Message)]
pub struct Sample {
    /// Sample value.
    #[prost(double, tag = "1")]
    pub value: f64,

    /// Timestamp, in milliseconds since the Unix epoch.
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}
