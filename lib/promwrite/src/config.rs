//! Client configuration.

use std::{collections::BTreeMap, path::Path, time::Duration};

use figment::{
    providers::{Env, Format as _, Yaml},
    Figment,
};
use http::StatusCode;
use serde::Deserialize;
use snafu::{ensure, ResultExt as _};

use crate::{
    client::Client,
    error::{ConfigurationError, EmptyPrefix, Extract, InvalidStatusCode},
    http::HttpClient,
    options::{parse_headers, AcceptedStatuses},
};

const fn default_timeout_secs() -> u64 {
    30
}

/// Client configuration.
///
/// ## YAML
///
/// ```yaml
/// endpoint: "http://localhost:9090/api/v1/write"
/// headers:
///   X-Scope-OrgID: tenant1
/// request_timeout_secs: 30
/// connect_timeout_secs: 30
/// accepted_status_codes: [200, 204]
/// ```
///
/// Only `endpoint` is required.
///
/// ## Environment
///
/// Each field can be set from an environment variable made of the prefix and the uppercased field name, such as
/// `PROMWRITE_ENDPOINT`. Nested keys are separated by a double underscore, such as `PROMWRITE_HEADERS__AUTHORIZATION`.
/// Environment variable names are lowercased when read, which makes no difference for header names.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ClientConfiguration {
    /// Remote write endpoint.
    ///
    /// Must be an absolute URI, including scheme and host.
    pub endpoint: String,

    /// Headers sent with every write.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout of the HTTP client, in seconds.
    ///
    /// A value of zero disables the timeout. Defaults to 30 seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connect timeout of the HTTP client, in seconds.
    ///
    /// Defaults to 30 seconds.
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Status codes treated as a successful write.
    ///
    /// Defaults to any 2xx status code.
    #[serde(default)]
    pub accepted_status_codes: Option<Vec<u16>>,
}

impl ClientConfiguration {
    /// Creates a new `ClientConfiguration` for the given endpoint, with everything else set to its default.
    pub fn new<E: Into<String>>(endpoint: E) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: BTreeMap::new(),
            request_timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_timeout_secs(),
            accepted_status_codes: None,
        }
    }

    /// Loads the configuration from the given YAML file.
    ///
    /// # Errors
    ///
    /// If the file is not valid YAML, or does not contain a valid configuration, an error is returned.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        Self::from_figment(&Figment::from(Yaml::file(path.as_ref())))
    }

    /// Loads the configuration from environment variables with the given prefix.
    ///
    /// The prefix given will have an underscore appended to it if it does not already end with one. The prefix is
    /// case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, or the environment does not contain a valid configuration, an error is returned.
    pub fn from_environment(prefix: &str) -> Result<Self, ConfigurationError> {
        Self::from_figment(&Figment::from(environment(prefix)?))
    }

    /// Extracts the configuration from the given figment.
    ///
    /// This allows combining any sources, such as a YAML file overridden by environment variables.
    ///
    /// # Errors
    ///
    /// If the figment does not contain a valid configuration, an error is returned.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigurationError> {
        figment.extract().context(Extract)
    }

    /// Builds a [`Client`] from this configuration.
    ///
    /// # Errors
    ///
    /// If the endpoint, any header, or any status code is invalid, an error is returned.
    pub fn build_client(&self) -> Result<Client, ConfigurationError> {
        let mut http_client = HttpClient::builder().with_connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        http_client = match self.request_timeout_secs {
            0 => http_client.without_request_timeout(),
            secs => http_client.with_request_timeout(Duration::from_secs(secs)),
        };

        let mut builder = Client::builder(self.endpoint.as_str())
            .with_http_client(http_client.build())
            .with_headers(parse_headers(&self.headers)?);

        if let Some(codes) = &self.accepted_status_codes {
            let statuses = codes
                .iter()
                .map(|&code| StatusCode::from_u16(code).context(InvalidStatusCode { code }))
                .collect::<Result<AcceptedStatuses, _>>()?;
            builder = builder.with_accepted_statuses(statuses);
        }

        builder.build()
    }
}

/// Creates a provider for environment variables with the given prefix.
///
/// Nested keys are separated by a double underscore.
///
/// # Errors
///
/// If the prefix is empty, an error is returned.
pub fn environment(prefix: &str) -> Result<Env, ConfigurationError> {
    ensure!(!prefix.is_empty(), EmptyPrefix);

    let prefix = if prefix.ends_with('_') {
        prefix.to_string()
    } else {
        format!("{}_", prefix)
    };

    Ok(Env::prefixed(&prefix).split("__"))
}
