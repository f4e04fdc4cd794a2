use http::{uri::InvalidUri, StatusCode};
use snafu::Snafu;
use tower::{timeout::error::Elapsed, BoxError};

/// A write error.
///
/// Callers that implement their own retry policy can branch on the error classification:
///
/// - [`Error::RemoteWriteFailed`] means the request was delivered and rejected by the receiver
/// - [`Error::Transport`] means the request could not be delivered, or the response could not be read
/// - [`Error::Cancelled`] and [`Error::DeadlineExceeded`] mean the caller's context ended before the exchange completed
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum Error {
    /// The receiver answered with a status code outside of the accepted set.
    #[snafu(display("promwrite: expected status 200, got {}: {}", status.as_u16(), body))]
    RemoteWriteFailed {
        /// Status code of the response.
        status: StatusCode,

        /// Response body, with trailing whitespace removed.
        body: String,
    },

    /// The HTTP exchange could not be completed.
    #[snafu(display("promwrite: failed to send request: {}", source))]
    Transport {
        /// Error source.
        source: BoxError,
    },

    /// The write was cancelled by the caller.
    #[snafu(display("promwrite: write cancelled"))]
    Cancelled,

    /// The deadline for the write passed before the exchange completed.
    #[snafu(display("promwrite: deadline exceeded"))]
    DeadlineExceeded,

    /// The HTTP request could not be constructed.
    #[snafu(display("promwrite: failed to build request: {}", source))]
    InvalidRequest {
        /// Error source.
        source: http::Error,
    },

    /// The serialized payload could not be compressed.
    ///
    /// This only happens when the serialized write request exceeds the maximum size of a Snappy block (~4GiB).
    #[snafu(display("promwrite: failed to compress payload: {}", source))]
    Encode {
        /// Error source.
        source: snap::Error,
    },
}

impl Error {
    /// Returns the status code of the response, if the receiver rejected the write.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::RemoteWriteFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the request was delivered but rejected by the receiver.
    pub fn is_remote_write_failure(&self) -> bool {
        matches!(self, Self::RemoteWriteFailed { .. })
    }

    /// Returns `true` if the HTTP exchange itself failed.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns `true` if the write was cancelled, or its deadline passed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns `true` if the HTTP client's own request timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport { source } => source.is::<Elapsed>(),
            _ => false,
        }
    }
}

/// A decode error.
///
/// Only returned when turning a payload back into a write request, which receivers and tests do, but never the send
/// path.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum DecodeError {
    /// The payload was not a valid Snappy block.
    #[snafu(display("failed to decompress payload: {}", source))]
    Decompress {
        /// Error source.
        source: snap::Error,
    },

    /// The decompressed payload was not a valid write request.
    #[snafu(display("failed to decode write request: {}", source))]
    Parse {
        /// Error source.
        source: prost::DecodeError,
    },
}

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum ConfigurationError {
    /// The endpoint could not be parsed as a URI.
    #[snafu(display("Invalid endpoint '{}': {}", endpoint, source))]
    InvalidEndpoint {
        /// The endpoint as given.
        endpoint: String,

        /// Error source.
        source: InvalidUri,
    },

    /// The endpoint was missing a scheme or authority.
    #[snafu(display("Endpoint '{}' must be an absolute URI, including scheme and host.", endpoint))]
    RelativeEndpoint {
        /// The endpoint as given.
        endpoint: String,
    },

    /// A header name was invalid.
    #[snafu(display("Invalid header name '{}': {}", name, source))]
    InvalidHeaderName {
        /// The header name as given.
        name: String,

        /// Error source.
        source: http::header::InvalidHeaderName,
    },

    /// A header value was invalid.
    #[snafu(display("Invalid value for header '{}': {}", name, source))]
    InvalidHeaderValue {
        /// Name of the header.
        name: String,

        /// Error source.
        source: http::header::InvalidHeaderValue,
    },

    /// An accepted status code was invalid.
    #[snafu(display("Invalid accepted status code {}: {}", code, source))]
    InvalidStatusCode {
        /// The status code as given.
        code: u16,

        /// Error source.
        source: http::status::InvalidStatusCode,
    },

    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// The configuration could not be extracted from its sources.
    #[snafu(display("Failed to load configuration: {}", source))]
    Extract {
        /// Error source.
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_write_failed_display() {
        let error = Error::RemoteWriteFailed {
            status: StatusCode::BAD_REQUEST,
            body: "ups".to_string(),
        };

        assert_eq!(error.to_string(), "promwrite: expected status 200, got 400: ups");
        assert_eq!(error.status_code(), Some(StatusCode::BAD_REQUEST));
        assert!(error.is_remote_write_failure());
        assert!(!error.is_transport());
        assert!(!error.is_cancellation());
    }

    #[test]
    fn cancellation_classification() {
        assert!(Error::Cancelled.is_cancellation());
        assert!(Error::DeadlineExceeded.is_cancellation());
        assert_eq!(Error::Cancelled.status_code(), None);
        assert!(!Error::DeadlineExceeded.is_remote_write_failure());
    }

    #[test]
    fn timeout_classification() {
        let timed_out = Error::Transport {
            source: Box::new(Elapsed::new()),
        };
        assert!(timed_out.is_transport());
        assert!(timed_out.is_timeout());

        let refused = Error::Transport {
            source: "connection refused".into(),
        };
        assert!(refused.is_transport());
        assert!(!refused.is_timeout());
    }
}
