use anyhow::Result;

mod cli;
mod clustering;
mod fetcher;
mod metrics;
mod pipeline;
mod report;
mod wallet_features;
mod wallet_scoring;
mod wallets;

#[tokio::main]
async fn main() -> Result<()> {
    let config = common::config::Config::load()?;

    let dispatch =
        common::observability::build_dispatch(&config.general.log_level, config.general.log_format);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    let cmd = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;

    let api = common::etherscan::EtherscanClient::new(
        &config.etherscan.api_url,
        &config.etherscan.api_key,
    )?;

    if let cli::Command::Wallet { address } = &cmd {
        return cli::show_wallet(&api, address).await;
    }

    if let Some(port) = config.prometheus_port() {
        metrics::install_prometheus(port)?;
        tracing::info!(port, "prometheus exporter listening");
    }
    metrics::describe();

    tracing::info!(api_url = api.api_url(), "wallet risk scoring starting");

    let wallet_ids = wallets::load_wallets(&config.input.wallets_path)?;
    tracing::info!(
        wallets = wallet_ids.len(),
        path = %config.input.wallets_path,
        "loaded wallet addresses"
    );

    let rows = pipeline::run(&api, &wallet_ids, fetcher::WALLET_PACING_DELAY).await;

    let paths = report::write_reports(&config.output.dir, &rows)?;
    tracing::info!(
        wallets = rows.len(),
        scores = %paths.scores.display(),
        detailed = %paths.detailed.display(),
        "reports written"
    );
    pipeline::log_distribution(&rows);

    Ok(())
}
