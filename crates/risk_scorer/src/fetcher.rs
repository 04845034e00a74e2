use common::etherscan::{is_protocol_contract, EtherscanClient, FetchError};
use common::types::ApiTx;
use std::time::{Duration, Instant};

/// Pause after each wallet's fetch pair, to stay under the explorer's rate limit.
pub const WALLET_PACING_DELAY: Duration = Duration::from_millis(200);

/// Result of one explorer call.
///
/// `Failed` is never propagated as an error: the pipeline degrades it to an
/// empty list, but keeps the reason so "no data" and "no answer" stay distinct.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Vec<ApiTx>),
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn into_txs(self) -> Vec<ApiTx> {
        match self {
            Self::Fetched(txs) => txs,
            Self::Failed(_) => Vec::new(),
        }
    }
}

impl From<Result<Vec<ApiTx>, FetchError>> for FetchOutcome {
    fn from(res: Result<Vec<ApiTx>, FetchError>) -> Self {
        match res {
            Ok(txs) => Self::Fetched(txs),
            Err(e) => Self::Failed(e),
        }
    }
}

pub trait TxHistoryFetcher {
    /// Normal transactions sent to one of the protocol contracts.
    fn fetch_normal_txs(&self, address: &str)
        -> impl std::future::Future<Output = FetchOutcome> + Send;

    /// Every internal transaction touching `address`.
    fn fetch_internal_txs(
        &self,
        address: &str,
    ) -> impl std::future::Future<Output = FetchOutcome> + Send;
}

pub fn protocol_txs_only(txs: Vec<ApiTx>) -> Vec<ApiTx> {
    txs.into_iter()
        .filter(|tx| is_protocol_contract(&tx.to_lower()))
        .collect()
}

fn record_outcome(endpoint: &'static str, address: &str, started: Instant, outcome: &FetchOutcome) {
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!("scorer_api_latency_ms", "endpoint" => endpoint).record(ms);
    match outcome {
        FetchOutcome::Fetched(txs) => {
            metrics::counter!("scorer_api_requests_total", "endpoint" => endpoint, "status" => "ok")
                .increment(1);
            tracing::debug!(wallet = address, endpoint, count = txs.len(), "fetched transactions");
        }
        FetchOutcome::Failed(e) => {
            metrics::counter!("scorer_api_requests_total", "endpoint" => endpoint, "status" => "error")
                .increment(1);
            metrics::counter!("scorer_api_errors_total", "endpoint" => endpoint, "kind" => e.kind())
                .increment(1);
            tracing::warn!(
                wallet = address,
                endpoint,
                kind = e.kind(),
                error = %e,
                "fetch failed, treating as no data"
            );
        }
    }
}

impl TxHistoryFetcher for EtherscanClient {
    async fn fetch_normal_txs(&self, address: &str) -> FetchOutcome {
        let start = Instant::now();
        let outcome = match self.fetch_txlist(address).await {
            Ok(txs) => FetchOutcome::Fetched(protocol_txs_only(txs)),
            Err(e) => FetchOutcome::Failed(e),
        };
        record_outcome("txlist", address, start, &outcome);
        outcome
    }

    async fn fetch_internal_txs(&self, address: &str) -> FetchOutcome {
        let start = Instant::now();
        let outcome = FetchOutcome::from(self.fetch_txlist_internal(address).await);
        record_outcome("txlistinternal", address, start, &outcome);
        outcome
    }
}
