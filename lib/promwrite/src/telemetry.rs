use http::Uri;
use metrics::{counter, Counter};

use crate::{error::Error, transport::WriteResponse};

/// Write telemetry.
///
/// ## Metrics
///
/// - `promwrite_requests_total`: The total number of writes, broken down by the `outcome` label:
///   - `success`: the receiver accepted the write
///   - `rejected`: the receiver answered with a status code outside of the accepted set
///   - `error`: the request could not be built, sent, or its response could not be read
///   - `cancelled`: the write was cancelled, or its deadline passed, before completing
/// - `promwrite_sent_bytes_total`: The total number of compressed payload bytes in accepted writes.
///
/// All metrics are emitted with a `domain` tag: the scheme, host, and port of the endpoint, excluding any credentials.
#[derive(Clone)]
pub(crate) struct Telemetry {
    success: Counter,
    rejected: Counter,
    error: Counter,
    cancelled: Counter,
    sent_bytes: Counter,
}

impl Telemetry {
    pub fn new(endpoint: &Uri) -> Self {
        let domain = domain(endpoint);

        Self {
            success: counter!("promwrite_requests_total", "domain" => domain.clone(), "outcome" => "success"),
            rejected: counter!("promwrite_requests_total", "domain" => domain.clone(), "outcome" => "rejected"),
            error: counter!("promwrite_requests_total", "domain" => domain.clone(), "outcome" => "error"),
            cancelled: counter!("promwrite_requests_total", "domain" => domain.clone(), "outcome" => "cancelled"),
            sent_bytes: counter!("promwrite_sent_bytes_total", "domain" => domain),
        }
    }

    pub fn record(&self, result: &Result<WriteResponse, Error>, payload_len: usize) {
        match result {
            Ok(_) => {
                self.success.increment(1);
                self.sent_bytes.increment(payload_len as u64);
            }
            Err(e) if e.is_remote_write_failure() => self.rejected.increment(1),
            Err(e) if e.is_cancellation() => self.cancelled.increment(1),
            Err(_) => self.error.increment(1),
        }
    }
}

fn domain(endpoint: &Uri) -> String {
    let mut domain = format!("{}://{}", endpoint.scheme_str().unwrap_or("http"), endpoint.host().unwrap_or(""));
    if let Some(port) = endpoint.port() {
        domain.push(':');
        domain.push_str(port.as_str());
    }
    domain
}
