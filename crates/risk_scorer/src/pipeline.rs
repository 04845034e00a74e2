use crate::clustering::KMeans;
use crate::fetcher::TxHistoryFetcher;
use crate::report::ScoredWallet;
use crate::wallet_features::{compute_wallet_features, WalletFeatures};
use crate::wallet_scoring::{score_distribution, score_wallets, RiskLevel, RiskWeights};
use std::time::Duration;

const PROGRESS_EVERY: usize = 10;

/// Counts from the per-wallet phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub wallets: usize,
    pub failed_fetches: usize,
    pub empty_wallets: usize,
}

/// Fetch history and extract features for one wallet.
/// Fetch failures have already been logged by the fetcher and read as no data.
pub async fn collect_wallet<F: TxHistoryFetcher + Sync>(
    fetcher: &F,
    wallet: &str,
) -> (WalletFeatures, usize) {
    let normal = fetcher.fetch_normal_txs(wallet).await;
    let internal = fetcher.fetch_internal_txs(wallet).await;
    let failed = usize::from(normal.is_failed()) + usize::from(internal.is_failed());
    let features = compute_wallet_features(wallet, &normal.into_txs(), &internal.into_txs());
    (features, failed)
}

/// Per-wallet phase: sequential fetch + extract, pausing `pacing` after each wallet.
/// Returns one record per input wallet, in input order.
pub async fn collect_features<F: TxHistoryFetcher + Sync>(
    fetcher: &F,
    wallets: &[String],
    pacing: Duration,
) -> (Vec<WalletFeatures>, CollectStats) {
    let mut features = Vec::with_capacity(wallets.len());
    let mut stats = CollectStats::default();
    let total = wallets.len();

    for (i, wallet) in wallets.iter().enumerate() {
        let (f, failed) = collect_wallet(fetcher, wallet).await;
        stats.wallets += 1;
        stats.failed_fetches += failed;
        if f.tx_count == 0 {
            stats.empty_wallets += 1;
        }
        metrics::counter!("scorer_wallets_processed_total").increment(1);
        features.push(f);

        if (i + 1) % PROGRESS_EVERY == 0 {
            tracing::info!(processed = i + 1, total, "progress");
        }
        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }

    (features, stats)
}

/// Batch phase: score the complete population. Must only run once every
/// wallet's features are known.
pub fn score_population(features: Vec<WalletFeatures>, kmeans: &KMeans, weights: &RiskWeights) -> Vec<ScoredWallet> {
    let outcome = score_wallets(&features, kmeans, weights);
    for c in &outcome.clusters {
        tracing::info!(
            cluster = c.cluster,
            members = c.members,
            risk_factor = c.risk_factor,
            score = c.score,
            "cluster ranked"
        );
    }

    features
        .into_iter()
        .zip(outcome.scores)
        .zip(outcome.labels)
        .map(|((features, score), cluster)| {
            tracing::debug!(wallet = %features.wallet_id, cluster, score, "wallet scored");
            metrics::counter!("scorer_wallets_scored_total", "score" => score.to_string()).increment(1);
            ScoredWallet { features, score }
        })
        .collect()
}

/// Full run over `wallets`: collect, barrier, score.
pub async fn run<F: TxHistoryFetcher + Sync>(
    fetcher: &F,
    wallets: &[String],
    pacing: Duration,
) -> Vec<ScoredWallet> {
    let (features, stats) = collect_features(fetcher, wallets, pacing).await;
    tracing::info!(
        wallets = stats.wallets,
        failed_fetches = stats.failed_fetches,
        empty_wallets = stats.empty_wallets,
        "transaction collection finished"
    );
    score_population(features, &KMeans::default(), &RiskWeights::default())
}

pub fn log_distribution(rows: &[ScoredWallet]) {
    let scores: Vec<u32> = rows.iter().map(|r| r.score).collect();
    for (score, count) in score_distribution(&scores) {
        tracing::info!(
            score,
            count,
            risk = RiskLevel::from_score(score).as_str(),
            "score distribution"
        );
    }
}
