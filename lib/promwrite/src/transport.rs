//! Remote write HTTP exchange.

use bytes::Bytes;
use http::{
    header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT},
    HeaderMap, HeaderValue, Method, Request, StatusCode, Uri,
};
use http_body_util::{BodyExt as _, Full};
use snafu::ResultExt as _;
use tracing::trace;

use crate::{
    codec::{CONTENT_ENCODING_SNAPPY, CONTENT_TYPE_PROTOBUF, REMOTE_WRITE_VERSION, REMOTE_WRITE_VERSION_HEADER},
    error::{Error, InvalidRequest, Transport},
    http::{HttpClient, RequestBody, ResponseBody},
    options::{overlay_headers, AcceptedStatuses},
};

/// Maximum number of bytes read from the body of a rejected write.
const MAX_ERROR_BODY_LEN: usize = 64 * 1024;

static USER_AGENT_VALUE: HeaderValue = HeaderValue::from_static(concat!("promwrite/", env!("CARGO_PKG_VERSION")));

/// Response to a successful write.
#[derive(Clone, Debug)]
pub struct WriteResponse {
    status: StatusCode,
    headers: HeaderMap,
}

impl WriteResponse {
    /// Returns the status code of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers of the response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Consumes `self` and returns the status code and headers of the response.
    pub fn into_parts(self) -> (StatusCode, HeaderMap) {
        (self.status, self.headers)
    }
}

/// Builds the HTTP request carrying the given payload.
///
/// Protocol headers are set first, and `headers` are overlaid on top of them. `Content-Length` always reflects the
/// payload, whatever `headers` holds.
pub(crate) fn build_request(
    endpoint: &Uri, headers: &HeaderMap, payload: Bytes,
) -> Result<Request<RequestBody>, Error> {
    let payload_len = payload.len();
    let mut request = Request::builder()
        .method(Method::POST)
        .uri(endpoint.clone())
        .header(CONTENT_TYPE, CONTENT_TYPE_PROTOBUF.clone())
        .header(CONTENT_ENCODING, CONTENT_ENCODING_SNAPPY.clone())
        .header(REMOTE_WRITE_VERSION_HEADER.clone(), REMOTE_WRITE_VERSION.clone())
        .header(USER_AGENT, USER_AGENT_VALUE.clone())
        .body(Full::new(payload))
        .context(InvalidRequest)?;

    overlay_headers(request.headers_mut(), headers);
    request
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(payload_len));
    Ok(request)
}

/// Sends the request, and classifies the response.
///
/// Exactly one request is sent. The response body is fully read: drained when the write was accepted, or collected
/// into the returned error when it was rejected.
pub(crate) async fn send(
    http_client: &HttpClient, request: Request<RequestBody>, accepted_statuses: &AcceptedStatuses,
) -> Result<WriteResponse, Error> {
    let response = http_client.send(request).await.context(Transport)?;
    let (parts, body) = response.into_parts();

    if accepted_statuses.contains(parts.status) {
        drain_body(body).await;

        Ok(WriteResponse {
            status: parts.status,
            headers: parts.headers,
        })
    } else {
        let body = read_error_body(body).await?;
        Err(Error::RemoteWriteFailed {
            status: parts.status,
            body,
        })
    }
}

async fn drain_body(mut body: ResponseBody) {
    while let Some(frame) = body.frame().await {
        if let Err(e) = frame {
            trace!(error = %e, "Failed to drain response body.");
            break;
        }
    }
}

async fn read_error_body(mut body: ResponseBody) -> Result<String, Error> {
    let mut buf = Vec::new();
    while buf.len() < MAX_ERROR_BODY_LEN {
        let Some(frame) = body.frame().await else {
            break;
        };

        if let Ok(data) = frame.context(Transport)?.into_data() {
            let remaining = MAX_ERROR_BODY_LEN - buf.len();
            buf.extend_from_slice(&data[..data.len().min(remaining)]);
        }
    }

    Ok(String::from_utf8_lossy(&buf).trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        io,
        pin::Pin,
        task::{Context, Poll},
    };

    use http::Response;
    use http_body::{Body, Frame};
    use tower::service_fn;

    use super::*;

    fn endpoint() -> Uri {
        Uri::from_static("http://localhost:9090/api/v1/write")
    }

    fn fixed_response(status: StatusCode, body: &'static [u8]) -> HttpClient {
        HttpClient::from_service(service_fn(move |_: Request<RequestBody>| async move {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(status)
                    .body(Full::new(Bytes::from_static(body)))
                    .unwrap(),
            )
        }))
    }

    #[test]
    fn request_carries_protocol_headers() {
        let request = build_request(&endpoint(), &HeaderMap::new(), Bytes::from_static(b"payload")).unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri(), &endpoint());

        let headers = request.headers();
        assert_eq!(headers[CONTENT_TYPE], "application/x-protobuf");
        assert_eq!(headers[CONTENT_ENCODING], "snappy");
        assert_eq!(headers["x-prometheus-remote-write-version"], "0.1.0");
        assert_eq!(headers[CONTENT_LENGTH], "7");
        assert!(headers[USER_AGENT].to_str().unwrap().starts_with("promwrite/"));
    }

    #[test]
    fn caller_headers_are_overlaid_on_protocol_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-scope-orgid", HeaderValue::from_static("tenant1"));
        headers.insert(USER_AGENT, HeaderValue::from_static("custom/1.0"));

        let request = build_request(&endpoint(), &headers, Bytes::new()).unwrap();
        assert_eq!(request.headers()["x-scope-orgid"], "tenant1");
        assert_eq!(request.headers()[USER_AGENT], "custom/1.0");
        assert_eq!(request.headers().get_all(USER_AGENT).iter().count(), 1);
    }

    #[test]
    fn caller_content_length_is_replaced_by_payload_length() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("999"));

        let request = build_request(&endpoint(), &headers, Bytes::from_static(b"payload")).unwrap();
        assert_eq!(request.headers()[CONTENT_LENGTH], "7");
        assert_eq!(request.headers().get_all(CONTENT_LENGTH).iter().count(), 1);
    }

    #[tokio::test]
    async fn accepted_status_yields_response() {
        let client = fixed_response(StatusCode::ACCEPTED, b"");
        let request = build_request(&endpoint(), &HeaderMap::new(), Bytes::new()).unwrap();

        let response = send(&client, request, &AcceptedStatuses::default()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn rejected_status_yields_trimmed_body() {
        let client = fixed_response(StatusCode::BAD_REQUEST, b"ups\n");
        let request = build_request(&endpoint(), &HeaderMap::new(), Bytes::new()).unwrap();

        let error = send(&client, request, &AcceptedStatuses::default()).await.unwrap_err();
        assert_eq!(error.to_string(), "promwrite: expected status 200, got 400: ups");
        assert_eq!(error.status_code(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn status_outside_explicit_set_is_rejected() {
        let client = fixed_response(StatusCode::ACCEPTED, b"queued");
        let request = build_request(&endpoint(), &HeaderMap::new(), Bytes::new()).unwrap();
        let accepted = AcceptedStatuses::Only(vec![StatusCode::OK]);

        let error = send(&client, request, &accepted).await.unwrap_err();
        assert_eq!(error.to_string(), "promwrite: expected status 200, got 202: queued");
    }

    #[tokio::test]
    async fn error_body_is_bounded_and_lossy() {
        static BODY: [u8; 2 * MAX_ERROR_BODY_LEN] = [0xff; 2 * MAX_ERROR_BODY_LEN];

        let client = fixed_response(StatusCode::INTERNAL_SERVER_ERROR, &BODY);
        let request = build_request(&endpoint(), &HeaderMap::new(), Bytes::new()).unwrap();

        let error = send(&client, request, &AcceptedStatuses::default()).await.unwrap_err();
        let Error::RemoteWriteFailed { body, .. } = error else {
            panic!("expected remote write failure, got {:?}", error);
        };
        assert_eq!(body.chars().count(), MAX_ERROR_BODY_LEN);
        assert!(body.chars().all(|c| c == char::REPLACEMENT_CHARACTER));
    }

    #[tokio::test]
    async fn error_body_read_failure_is_transport_error() {
        let client = HttpClient::from_service(service_fn(|_: Request<RequestBody>| async move {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .body(ResetBody { sent: false })
                    .unwrap(),
            )
        }));
        let request = build_request(&endpoint(), &HeaderMap::new(), Bytes::new()).unwrap();

        let error = send(&client, request, &AcceptedStatuses::default()).await.unwrap_err();
        assert!(error.is_transport());
    }

    /// Yields a single data frame, and then fails as if the connection was reset.
    struct ResetBody {
        sent: bool,
    }

    impl Body for ResetBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            mut self: Pin<&mut Self>, _: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            if self.sent {
                Poll::Ready(Some(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))))
            } else {
                self.sent = true;
                Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(b"partial")))))
            }
        }
    }
}
