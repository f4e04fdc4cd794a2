use std::path::Path;

use anyhow::{Context as _, Error};
use chrono::{DateTime, Utc};
use figment::{
    providers::{Format as _, Yaml},
    Figment,
};
use indexmap::IndexMap;
use promwrite::{config::environment, ClientConfiguration, Label, Sample, TimeSeries, WriteRequest};
use serde::Deserialize;

/// Prefix of environment variables overriding the configuration file.
const ENV_PREFIX: &str = "PROMWRITE_SEND";

#[derive(Deserialize)]
pub struct SeriesConfig {
    /// Metric name.
    pub name: String,

    /// Additional labels, sent in the order given, after the metric name.
    #[serde(default)]
    pub labels: IndexMap<String, String>,

    /// Sample value.
    pub value: f64,

    /// Sample timestamp, in RFC 3339 format.
    ///
    /// Defaults to the time the configuration is loaded.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SeriesConfig {
    fn to_time_series(&self, now: DateTime<Utc>) -> TimeSeries {
        let labels = std::iter::once(Label::metric_name(self.name.as_str()))
            .chain(self.labels.iter().map(|(name, value)| Label::new(name.as_str(), value.as_str())))
            .collect();

        TimeSeries::new(labels, Sample::new(self.timestamp.unwrap_or(now), self.value))
    }
}

#[derive(Deserialize)]
pub struct Config {
    /// The remote write client.
    pub client: ClientConfiguration,

    /// The series to send.
    ///
    /// All series are sent in a single write request.
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

impl Config {
    /// Attempts to load a `Config` from the given file path.
    ///
    /// Any field can be overridden with an environment variable prefixed with `PROMWRITE_SEND_`, using a double
    /// underscore to separate nested keys, such as `PROMWRITE_SEND_CLIENT__ENDPOINT`.
    ///
    /// # Errors
    ///
    /// If an error occurs while reading the file, or deserializing the configuration data, it will be returned.
    pub fn try_from_file<P>(config_path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let config_path = config_path.as_ref();
        let config_file_raw = std::fs::read_to_string(config_path).with_context(|| {
            format!(
                "Failed to read configuration file '{}'.",
                config_path.display()
            )
        })?;

        Self::from_figment(Figment::from(Yaml::string(&config_file_raw)).merge(environment(ENV_PREFIX)?))
    }

    fn from_figment(figment: Figment) -> Result<Self, Error> {
        figment.extract().context("Failed to parse configuration file.")
    }

    /// Builds the write request holding every configured series.
    pub fn write_request(&self) -> WriteRequest {
        let now = Utc::now();
        self.series.iter().map(|series| series.to_time_series(now)).collect()
    }
}
