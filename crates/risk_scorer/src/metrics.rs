use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "scorer_api_requests_total",
        "Number of explorer API requests made."
    );
    describe_counter!(
        "scorer_api_errors_total",
        "Number of explorer API requests that yielded no data, by failure kind."
    );
    describe_histogram!(
        "scorer_api_latency_ms",
        "Explorer API request latency in milliseconds."
    );
    describe_counter!(
        "scorer_wallets_processed_total",
        "Number of wallets whose history was fetched and featurized."
    );
    describe_counter!(
        "scorer_wallets_scored_total",
        "Number of wallets assigned a score, by score band."
    );
}

/// Install the global recorder and serve `/metrics` on `port`.
/// Must be called from within the Tokio runtime.
pub fn install_prometheus(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}
