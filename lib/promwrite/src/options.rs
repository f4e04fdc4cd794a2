//! Per-write options.

use std::{future::Future, time::Duration};

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use snafu::ResultExt as _;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigurationError, Error, InvalidHeaderName, InvalidHeaderValue};

/// Set of response status codes treated as a successful write.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum AcceptedStatuses {
    /// Any 2xx status code.
    #[default]
    Successful,

    /// Only the given status codes.
    Only(Vec<StatusCode>),
}

impl AcceptedStatuses {
    /// Returns `true` if the given status code is accepted.
    pub fn contains(&self, status: StatusCode) -> bool {
        match self {
            Self::Successful => status.is_success(),
            Self::Only(statuses) => statuses.contains(&status),
        }
    }
}

impl FromIterator<StatusCode> for AcceptedStatuses {
    fn from_iter<I: IntoIterator<Item = StatusCode>>(iter: I) -> Self {
        Self::Only(iter.into_iter().collect())
    }
}

/// Options for a single write.
///
/// All options are optional. Headers given here are merged over the client's default headers: a header set here
/// replaces every value the client has for the same name, and headers with other names are added alongside.
///
/// When both a timeout and a deadline are set, whichever ends first applies. Cancellation and deadlines bound the whole
/// exchange, including reading the response body.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    headers: HeaderMap,
    cancellation_token: Option<CancellationToken>,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    accepted_statuses: Option<AcceptedStatuses>,
}

impl WriteOptions {
    /// Creates a new `WriteOptions` with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header to send with this write.
    ///
    /// Adding the same header name more than once sends every value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the given headers to send with this write.
    ///
    /// Each name in `headers` replaces every value already set for that name, including values added with
    /// [`with_header`][Self::with_header]. Names not in `headers` are left untouched.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        overlay_headers(&mut self.headers, &headers);
        self
    }

    /// Sets the token used to cancel this write.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Sets the maximum duration of this write, starting when the write is called.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the point in time by which this write must have completed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Overrides the client's accepted status codes for this write.
    pub fn with_accepted_statuses(mut self, accepted_statuses: AcceptedStatuses) -> Self {
        self.accepted_statuses = Some(accepted_statuses);
        self
    }

    /// Returns the headers to send with this write.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn accepted_statuses(&self) -> Option<&AcceptedStatuses> {
        self.accepted_statuses.as_ref()
    }

    pub(crate) fn context(&self) -> WriteContext {
        let timeout_deadline = self.timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let deadline = match (self.deadline, timeout_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        WriteContext {
            cancellation_token: self.cancellation_token.clone(),
            deadline,
        }
    }
}

/// Cancellation state of a single write.
pub(crate) struct WriteContext {
    cancellation_token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl WriteContext {
    /// Returns an error if the write has already been cancelled, or its deadline has already passed.
    pub(crate) fn check(&self) -> Result<(), Error> {
        if self.cancellation_token.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Err(Error::Cancelled);
        }

        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(Error::DeadlineExceeded);
        }

        Ok(())
    }

    /// Runs the given future to completion, unless the write is cancelled or its deadline passes first.
    ///
    /// The future is dropped as soon as either happens.
    pub(crate) async fn run<F, T>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let cancelled = async {
            match &self.cancellation_token {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            _ = cancelled => Err(Error::Cancelled),
            _ = expired => Err(Error::DeadlineExceeded),
            result = fut => result,
        }
    }
}

/// Parses a list of header name/value pairs.
///
/// # Errors
///
/// If any name or value is not a valid header name or value, an error is returned.
pub fn parse_headers<I, K, V>(headers: I) -> Result<HeaderMap, ConfigurationError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut parsed = HeaderMap::new();
    for (name, value) in headers {
        let name = name.as_ref();
        let header_name = HeaderName::from_bytes(name.as_bytes()).context(InvalidHeaderName { name })?;
        let header_value = HeaderValue::from_str(value.as_ref()).context(InvalidHeaderValue { name })?;
        parsed.append(header_name, header_value);
    }

    Ok(parsed)
}

/// Overlays `overrides` onto `target`.
///
/// Every name present in `overrides` replaces all values for that name in `target`. Names not present in `overrides`
/// are left untouched.
pub(crate) fn overlay_headers(target: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        target.remove(name);
        for value in overrides.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}
