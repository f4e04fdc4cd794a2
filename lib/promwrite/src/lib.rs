//! A client for the Prometheus remote write protocol.
//!
//! Time series are translated into the remote write wire model, serialized as protocol buffers, compressed with the
//! Snappy block format, and sent to a remote write receiver in a single HTTP POST. The response is classified as
//! either success or a typed [`Error`].
//!
//! ```no_run
//! use promwrite::{Client, Label, Sample, TimeSeries, WriteOptions, WriteRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("http://localhost:9090/api/v1/write")?;
//!
//! let request = WriteRequest::new(vec![TimeSeries::new(
//!     vec![Label::metric_name("metric_a"), Label::new("job", "app")],
//!     Sample::now(123.0),
//! )]);
//! client.write(&request, WriteOptions::new()).await?;
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]

mod client;
pub use self::client::{Client, ClientBuilder};

pub mod codec;

pub mod config;
pub use self::config::ClientConfiguration;

mod error;
pub use self::error::{ConfigurationError, DecodeError, Error};

pub mod http;
pub use self::http::{HttpClient, HttpClientBuilder};

mod model;
pub use self::model::{Label, Sample, TimeSeries, WriteRequest, METRIC_NAME_LABEL};

mod options;
pub use self::options::{parse_headers, AcceptedStatuses, WriteOptions};

mod telemetry;

mod translate;
pub use self::translate::timestamp_millis;

mod transport;
pub use self::transport::WriteResponse;

/// Remote write wire model.
pub use prometheus_protos as proto;
