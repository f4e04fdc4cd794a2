use http::{HeaderMap, HeaderName, HeaderValue, Request, Uri};
use prometheus_protos as proto;
use snafu::{ensure, ResultExt as _};
use tracing::debug;

use crate::{
    codec,
    error::{ConfigurationError, Error, InvalidEndpoint, RelativeEndpoint},
    http::{HttpClient, RequestBody},
    model::WriteRequest,
    options::{overlay_headers, AcceptedStatuses, WriteContext, WriteOptions},
    telemetry::Telemetry,
    transport::{self, WriteResponse},
};

/// A remote write client.
///
/// Each call to [`write`][Client::write] sends exactly one HTTP request to the endpoint, and never retries. The client
/// is cheap to clone, and can be shared freely between tasks: clones share the same HTTP client, and so the same
/// connection pool.
#[derive(Clone)]
pub struct Client {
    endpoint: Uri,
    http_client: HttpClient,
    headers: HeaderMap,
    accepted_statuses: AcceptedStatuses,
    telemetry: Telemetry,
}

impl Client {
    /// Creates a new `Client` for the given endpoint, with default settings.
    ///
    /// # Errors
    ///
    /// If the endpoint is not a valid absolute URI, an error is returned.
    pub fn new<E: Into<String>>(endpoint: E) -> Result<Self, ConfigurationError> {
        Self::builder(endpoint).build()
    }

    /// Creates a new builder for a client writing to the given endpoint.
    pub fn builder<E: Into<String>>(endpoint: E) -> ClientBuilder {
        ClientBuilder {
            endpoint: endpoint.into(),
            http_client: None,
            headers: HeaderMap::new(),
            accepted_statuses: AcceptedStatuses::default(),
        }
    }

    /// Returns the endpoint written to.
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Returns the headers sent with every write.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Writes the given time series to the endpoint.
    ///
    /// # Errors
    ///
    /// If the receiver rejects the write, [`Error::RemoteWriteFailed`] is returned with the response status code and
    /// body. If the write is cancelled, or its deadline passes, before the exchange completes, [`Error::Cancelled`] or
    /// [`Error::DeadlineExceeded`] is returned; when that is already the case on entry, no request is sent at all. If
    /// the request cannot be sent, or the response cannot be read, [`Error::Transport`] is returned.
    pub async fn write(&self, request: &WriteRequest, options: WriteOptions) -> Result<WriteResponse, Error> {
        let context = options.context();

        let (result, payload_len) = match self.build_request(request, &options, &context) {
            Ok((http_request, payload_len)) => {
                let accepted_statuses = options.accepted_statuses().unwrap_or(&self.accepted_statuses);
                let exchange = transport::send(&self.http_client, http_request, accepted_statuses);
                (context.run(exchange).await, payload_len)
            }
            Err(e) => (Err(e), 0),
        };

        self.telemetry.record(&result, payload_len);
        match &result {
            Ok(response) => debug!(endpoint = %self.endpoint, status = %response.status(), "Write accepted."),
            Err(e) => debug!(endpoint = %self.endpoint, error = %e, "Write failed."),
        }

        result
    }

    fn build_request(
        &self, request: &WriteRequest, options: &WriteOptions, context: &WriteContext,
    ) -> Result<(Request<RequestBody>, usize), Error> {
        context.check()?;

        let encoded = codec::encode(&proto::WriteRequest::from(request))?;
        let payload_len = encoded.compressed_len();
        debug!(
            endpoint = %self.endpoint,
            series = request.len(),
            uncompressed_len = encoded.uncompressed_len(),
            compressed_len = payload_len,
            "Sending write request."
        );

        let mut headers = self.headers.clone();
        overlay_headers(&mut headers, options.headers());

        let http_request = transport::build_request(&self.endpoint, &headers, encoded.into_payload())?;
        Ok((http_request, payload_len))
    }
}

/// A [`Client`] builder.
///
/// # Defaults
///
/// - the default [`HttpClient`] (see [`HttpClientBuilder`][crate::HttpClientBuilder] for its settings)
/// - no additional headers
/// - any 2xx status code is accepted as success
pub struct ClientBuilder {
    endpoint: String,
    http_client: Option<HttpClient>,
    headers: HeaderMap,
    accepted_statuses: AcceptedStatuses,
}

impl ClientBuilder {
    /// Sets the HTTP client used to send requests.
    pub fn with_http_client(mut self, http_client: HttpClient) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Adds a header sent with every write.
    ///
    /// Adding the same header name more than once sends every value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the given headers, sent with every write.
    ///
    /// Each name in `headers` replaces every value already set for that name, including values added with
    /// [`with_header`][Self::with_header]. Names not in `headers` are left untouched.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        overlay_headers(&mut self.headers, &headers);
        self
    }

    /// Sets the status codes treated as a successful write.
    pub fn with_accepted_statuses(mut self, accepted_statuses: AcceptedStatuses) -> Self {
        self.accepted_statuses = accepted_statuses;
        self
    }

    /// Builds the `Client`.
    ///
    /// # Errors
    ///
    /// If the endpoint is not a valid URI, or is missing a scheme or host, an error is returned.
    pub fn build(self) -> Result<Client, ConfigurationError> {
        let endpoint = Uri::try_from(self.endpoint.as_str()).context(InvalidEndpoint {
            endpoint: self.endpoint.as_str(),
        })?;
        ensure!(
            endpoint.scheme().is_some() && endpoint.authority().is_some(),
            RelativeEndpoint { endpoint: self.endpoint }
        );

        let http_client = self.http_client.unwrap_or_else(|| HttpClient::builder().build());
        let telemetry = Telemetry::new(&endpoint);

        Ok(Client {
            endpoint,
            http_client,
            headers: self.headers,
            accepted_statuses: self.accepted_statuses,
            telemetry,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use bytes::Bytes;
    use http::{Response, StatusCode};
    use http_body_util::Full;
    use tokio_util::sync::CancellationToken;
    use tower::service_fn;

    use super::*;
    use crate::model::{Label, Sample, TimeSeries};

    const ENDPOINT: &str = "http://localhost:9090/api/v1/write";

    fn counting_client(status: StatusCode) -> (HttpClient, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let http_client = HttpClient::from_service(service_fn(move |_: Request<RequestBody>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, Infallible>(Response::builder().status(status).body(Full::new(Bytes::new())).unwrap()) }
        }));

        (http_client, calls)
    }

    fn request() -> WriteRequest {
        WriteRequest::new(vec![TimeSeries::new(
            vec![Label::metric_name("metric_a")],
            Sample::now(1.0),
        )])
    }

    #[test]
    fn build_rejects_invalid_endpoints() {
        let error = Client::builder("http://bad host/").build().err().unwrap();
        assert!(matches!(error, ConfigurationError::InvalidEndpoint { .. }));

        let error = Client::builder("/api/v1/write").build().err().unwrap();
        assert!(matches!(error, ConfigurationError::RelativeEndpoint { ref endpoint } if endpoint == "/api/v1/write"));
    }

    #[tokio::test]
    async fn build_keeps_endpoint_and_headers() {
        let (http_client, _) = counting_client(StatusCode::OK);
        let client = Client::builder(ENDPOINT)
            .with_http_client(http_client)
            .with_header(HeaderName::from_static("x-scope-orgid"), HeaderValue::from_static("tenant1"))
            .build()
            .unwrap();

        assert_eq!(client.endpoint(), &Uri::from_static(ENDPOINT));
        assert_eq!(client.headers()["x-scope-orgid"], "tenant1");
    }

    #[tokio::test]
    async fn builder_with_headers_replaces_same_named_values() {
        let (http_client, _) = counting_client(StatusCode::OK);
        let mut replacements = HeaderMap::new();
        replacements.insert("x-scope-orgid", HeaderValue::from_static("tenant2"));

        let client = Client::builder(ENDPOINT)
            .with_http_client(http_client)
            .with_header(HeaderName::from_static("x-scope-orgid"), HeaderValue::from_static("tenant1"))
            .with_header(HeaderName::from_static("x-extra"), HeaderValue::from_static("kept"))
            .with_headers(replacements)
            .build()
            .unwrap();

        let values = client.headers().get_all("x-scope-orgid").iter().collect::<Vec<_>>();
        assert_eq!(values, vec!["tenant2"]);
        assert_eq!(client.headers()["x-extra"], "kept");
    }

    #[tokio::test]
    async fn write_sends_exactly_one_request() {
        let (http_client, calls) = counting_client(StatusCode::OK);
        let client = Client::builder(ENDPOINT).with_http_client(http_client).build().unwrap();

        let response = client.write(&request(), WriteOptions::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_write_is_not_retried() {
        let (http_client, calls) = counting_client(StatusCode::SERVICE_UNAVAILABLE);
        let client = Client::builder(ENDPOINT).with_http_client(http_client).build().unwrap();

        let error = client.write(&request(), WriteOptions::new()).await.unwrap_err();
        assert_eq!(error.status_code(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn write_options_override_accepted_statuses() {
        let (http_client, _) = counting_client(StatusCode::ACCEPTED);
        let client = Client::builder(ENDPOINT)
            .with_http_client(http_client)
            .with_accepted_statuses(AcceptedStatuses::Only(vec![StatusCode::OK]))
            .build()
            .unwrap();

        let error = client.write(&request(), WriteOptions::new()).await.unwrap_err();
        assert!(error.is_remote_write_failure());

        let options = WriteOptions::new().with_accepted_statuses(AcceptedStatuses::Successful);
        let response = client.write(&request(), options).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn done_context_sends_nothing() {
        let (http_client, calls) = counting_client(StatusCode::OK);
        let client = Client::builder(ENDPOINT).with_http_client(http_client).build().unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let error = client
            .write(&request(), WriteOptions::new().with_cancellation_token(token))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Cancelled));

        let error = client
            .write(&request(), WriteOptions::new().with_timeout(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::DeadlineExceeded));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
