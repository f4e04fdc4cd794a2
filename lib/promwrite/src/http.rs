//! HTTP client.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use http::{Request, Response};
use http_body::{Body, Frame, SizeHint};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt as _, Full};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use tokio::time::{sleep_until, timeout_at, Instant, Sleep};
use tower::{timeout::error::Elapsed, util::BoxCloneSyncService, BoxError, Service, ServiceBuilder, ServiceExt as _};
use tracing::warn;

/// Body type of requests sent by [`HttpClient`].
pub type RequestBody = Full<Bytes>;

/// Body type of responses returned by [`HttpClient`].
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Future returned by [`HttpClient`] when used as a [`Service`].
pub type ResponseFuture = Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, BoxError>> + Send>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_IDLE_CONNS_PER_HOST: usize = 5;
const DEFAULT_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(45);

/// An HTTP client.
///
/// Wraps any [`Service`] that can send `http` requests, type-erasing it so that clients with different middleware
/// stacks can be used interchangeably. The client is cheap to clone, and clones share the underlying service, including
/// its connection pool.
#[derive(Clone)]
pub struct HttpClient {
    inner: BoxCloneSyncService<Request<RequestBody>, Response<ResponseBody>, BoxError>,
}

impl HttpClient {
    /// Creates a new builder for configuring an HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Creates a new `HttpClient` from the given service.
    ///
    /// This allows overriding how requests are sent entirely, such as adding middleware for authentication, or
    /// routing requests to an in-process receiver.
    pub fn from_service<S, B>(service: S) -> Self
    where
        S: Service<Request<RequestBody>, Response = Response<B>> + Clone + Send + Sync + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send + 'static,
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let inner = ServiceBuilder::new()
            .map_response(|response: Response<B>| {
                response.map(|body| body.map_err(|e| -> BoxError { e.into() }).boxed_unsync())
            })
            .map_err(|e: S::Error| -> BoxError { e.into() })
            .service(service);

        Self {
            inner: BoxCloneSyncService::new(inner),
        }
    }

    /// Sends a request to the server, and waits for a response.
    ///
    /// # Errors
    ///
    /// If there was an error sending the request, an error will be returned.
    pub async fn send(&self, request: Request<RequestBody>) -> Result<Response<ResponseBody>, BoxError> {
        let mut inner = self.inner.clone();
        inner.ready().await?.call(request).await
    }
}

impl Service<Request<RequestBody>> for HttpClient {
    type Response = Response<ResponseBody>;
    type Error = BoxError;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<RequestBody>) -> Self::Future {
        self.inner.call(request)
    }
}

/// An HTTP client builder.
///
/// # Defaults
///
/// - support for both HTTP and HTTPS (uses platform's root certificates for server certificate validation, falling back
///   to the bundled Mozilla root certificates if none can be loaded)
/// - support for both HTTP/1.1 and HTTP/2 (automatically negotiated via ALPN)
/// - 30 second connect timeout, and 30 second per-request timeout
/// - connection pool for reusing connections (45 second idle connection timeout, and a maximum of 5 idle connections
///   per host)
#[derive(Clone, Debug)]
pub struct HttpClientBuilder {
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
    max_idle_conns_per_host: usize,
    idle_conn_timeout: Duration,
}

impl HttpClientBuilder {
    /// Sets the timeout when connecting to the remote host.
    ///
    /// Defaults to 30 seconds.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-request timeout.
    ///
    /// The timeout covers the whole exchange, from sending the request to reading the end of the response body. When
    /// it elapses, the request or response body fails with [`Elapsed`].
    ///
    /// Defaults to 30 seconds.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Allow requests to run indefinitely.
    ///
    /// Requests are still bounded by the connect timeout, and by any deadline given when writing.
    pub fn without_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    /// Sets the maximum number of idle connections per host.
    ///
    /// Defaults to 5.
    pub fn with_max_idle_conns_per_host(mut self, max: usize) -> Self {
        self.max_idle_conns_per_host = max;
        self
    }

    /// Sets the idle connection timeout.
    ///
    /// Once a connection has been idle in the pool for longer than this duration, it will be closed and removed from
    /// the pool.
    ///
    /// Defaults to 45 seconds.
    pub fn with_idle_conn_timeout(mut self, timeout: Duration) -> Self {
        self.idle_conn_timeout = timeout;
        self
    }

    /// Builds the `HttpClient`.
    ///
    /// Requests can only be sent from within a Tokio runtime, as the connection pool relies on the Tokio executor and
    /// timer.
    pub fn build(self) -> HttpClient {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(Some(self.connect_timeout));

        let tls_builder = match HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                warn!(error = %e, "Failed to load native root certificates. Falling back to bundled Mozilla roots.");
                HttpsConnectorBuilder::new().with_webpki_roots()
            }
        };
        let connector = tls_builder
            .https_or_http()
            .enable_all_versions()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.max_idle_conns_per_host)
            .pool_idle_timeout(self.idle_conn_timeout)
            .build::<_, RequestBody>(connector);

        let client = client.map_err(BoxError::from);
        match self.request_timeout {
            Some(timeout) => HttpClient::from_service(ExchangeTimeout::new(client, timeout)),
            None => HttpClient::from_service(client),
        }
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            max_idle_conns_per_host: DEFAULT_MAX_IDLE_CONNS_PER_HOST,
            idle_conn_timeout: DEFAULT_IDLE_CONN_TIMEOUT,
        }
    }
}

/// Bounds a whole exchange, from sending the request to reading the end of the response body.
#[derive(Clone)]
struct ExchangeTimeout<S> {
    inner: S,
    timeout: Duration,
}

impl<S> ExchangeTimeout<S> {
    fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<S, B> Service<Request<RequestBody>> for ExchangeTimeout<S>
where
    S: Service<Request<RequestBody>, Response = Response<B>>,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response<DeadlineBody>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<RequestBody>) -> Self::Future {
        // A timeout too large to represent is no timeout at all.
        let deadline = Instant::now().checked_add(self.timeout);
        let fut = self.inner.call(request);

        Box::pin(async move {
            let response = match deadline {
                Some(deadline) => timeout_at(deadline, fut)
                    .await
                    .map_err(|_| -> BoxError { Box::new(Elapsed::new()) })?,
                None => fut.await,
            }
            .map_err(|e| -> BoxError { e.into() })?;

            Ok::<_, BoxError>(response.map(|body| DeadlineBody {
                inner: body.map_err(|e| -> BoxError { e.into() }).boxed_unsync(),
                deadline: deadline.map(|deadline| Box::pin(sleep_until(deadline))),
            }))
        })
    }
}

/// A response body that fails with [`Elapsed`] once the exchange deadline passes.
struct DeadlineBody {
    inner: ResponseBody,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl Body for DeadlineBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        if let Poll::Ready(frame) = Pin::new(&mut self.inner).poll_frame(cx) {
            return Poll::Ready(frame);
        }

        if let Some(deadline) = self.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Some(Err(Box::new(Elapsed::new()))));
            }
        }

        Poll::Pending
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
