//! Remote write payload encoding.
//!
//! Payloads are protobuf-serialized write requests compressed with the Snappy block format. Note that this is the raw
//! block format, not the framed/streaming format.

use bytes::Bytes;
use http::{HeaderName, HeaderValue};
use prometheus_protos as proto;
use prost::Message as _;
use snafu::ResultExt as _;

use crate::error::{DecodeError, Decompress, Encode, Error, Parse};

/// Content type of remote write payloads.
pub static CONTENT_TYPE_PROTOBUF: HeaderValue = HeaderValue::from_static("application/x-protobuf");

/// Content encoding of remote write payloads.
pub static CONTENT_ENCODING_SNAPPY: HeaderValue = HeaderValue::from_static("snappy");

/// Header carrying the remote write protocol version.
pub static REMOTE_WRITE_VERSION_HEADER: HeaderName = HeaderName::from_static("x-prometheus-remote-write-version");

/// Remote write protocol version implemented by this crate.
pub static REMOTE_WRITE_VERSION: HeaderValue = HeaderValue::from_static("0.1.0");

/// An encoded write request, ready to be sent.
#[derive(Clone, Debug)]
pub struct EncodedWriteRequest {
    payload: Bytes,
    uncompressed_len: usize,
}

impl EncodedWriteRequest {
    /// Returns the compressed payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consumes `self` and returns the compressed payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Returns the size of the serialized write request before compression, in bytes.
    pub fn uncompressed_len(&self) -> usize {
        self.uncompressed_len
    }

    /// Returns the size of the compressed payload, in bytes.
    pub fn compressed_len(&self) -> usize {
        self.payload.len()
    }
}

/// Serializes and compresses a write request.
///
/// # Errors
///
/// If the serialized request is larger than the maximum size of a Snappy block (~4GiB), an error is returned.
pub fn encode(request: &proto::WriteRequest) -> Result<EncodedWriteRequest, Error> {
    let serialized = request.encode_to_vec();
    let compressed = snap::raw::Encoder::new().compress_vec(&serialized).context(Encode)?;

    Ok(EncodedWriteRequest {
        payload: Bytes::from(compressed),
        uncompressed_len: serialized.len(),
    })
}

/// Decompresses and parses a write request.
///
/// # Errors
///
/// If the payload is not a valid Snappy block, or does not decompress to a valid write request, an error is returned.
pub fn decode(payload: &[u8]) -> Result<proto::WriteRequest, DecodeError> {
    let decompressed = snap::raw::Decoder::new().decompress_vec(payload).context(Decompress)?;
    proto::WriteRequest::decode(decompressed.as_slice()).context(Parse)
}
