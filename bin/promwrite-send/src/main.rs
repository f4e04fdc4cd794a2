//! Sends a fixed set of time series to a Prometheus remote write endpoint, once.
//!
//! The configuration file describes both the endpoint and the series to send:
//!
//! ```yaml
//! client:
//!   endpoint: "http://localhost:9090/api/v1/write"
//!   headers:
//!     X-Scope-OrgID: tenant1
//! series:
//!   - name: metric_a
//!     labels:
//!       job: app
//!     value: 123
//! ```

#![deny(missing_docs)]

use anyhow::{Context as _, Error};
use promwrite::WriteOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod config;
use self::config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(true)
        .with_target(true)
        .init();

    if let Err(e) = run().await {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    // We only accept a single command line argument: the path to the configuration file.
    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            error!("Path to the configuration file must be passed as the first (and only) argument to `promwrite-send`.");
            std::process::exit(1);
        }
    };

    let config = Config::try_from_file(&config_path)?;
    let client = config.client.build_client()?;

    let request = config.write_request();
    if request.is_empty() {
        warn!("No series configured. Sending an empty write request.");
    }

    info!(endpoint = %client.endpoint(), series = request.len(), "Sending write request...");
    let response = client
        .write(&request, WriteOptions::new())
        .await
        .context("Failed to send write request.")?;
    info!(status = %response.status(), "Write request accepted.");

    Ok(())
}
