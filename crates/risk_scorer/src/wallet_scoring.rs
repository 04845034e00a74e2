use crate::clustering::{KMeans, MinMaxScaler};
use crate::wallet_features::{col, WalletFeatures};

/// Score bands handed out in cluster rank order (lowest risk first).
pub const SCORE_BANDS: [u32; 5] = [900, 750, 600, 400, 200];

#[derive(Debug, Clone, Copy)]
pub struct RiskWeights {
    pub liquidation_weight: f64,
    pub repay_shortfall_weight: f64,
    pub failed_tx_weight: f64,
    pub net_position_weight: f64,
    pub inactivity_weight: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            liquidation_weight: 0.30,
            repay_shortfall_weight: 0.25,
            failed_tx_weight: 0.20,
            net_position_weight: 0.15,
            inactivity_weight: 0.10,
        }
    }
}

/// Risk factor of a cluster from the mean of its normalized feature vectors.
/// Higher is riskier.
pub fn cluster_risk_factor(mean: &[f64], w: &RiskWeights) -> f64 {
    w.liquidation_weight * mean[col::LIQUIDATION_COUNT]
        + w.repay_shortfall_weight * (1.0 - mean[col::REPAY_RATIO])
        + w.failed_tx_weight * mean[col::FAILED_TX_RATIO]
        + w.net_position_weight * mean[col::NET_POSITION]
        + w.inactivity_weight * (1.0 - mean[col::DAYS_ACTIVE].min(1.0))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub members: usize,
    pub risk_factor: f64,
    pub score: u32,
}

#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    /// One score per input record, in input order.
    pub scores: Vec<u32>,
    pub labels: Vec<usize>,
    /// Non-empty clusters in rank order.
    pub clusters: Vec<ClusterSummary>,
}

/// Per-cluster mean of normalized vectors. `None` for clusters with no members.
fn cluster_means(normalized: &[Vec<f64>], labels: &[usize], k: usize) -> Vec<Option<(usize, Vec<f64>)>> {
    let dims = normalized.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dims]; k];
    let mut counts = vec![0_usize; k];
    for (row, &label) in normalized.iter().zip(labels) {
        counts[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(row) {
            *s += v;
        }
    }
    sums.into_iter()
        .zip(counts)
        .map(|(sum, n)| {
            (n > 0).then(|| (n, sum.into_iter().map(|s| s / n as f64).collect::<Vec<f64>>()))
        })
        .collect()
}

/// Rank clusters ascending by risk factor and attach score bands.
/// The sort is stable, so equal risk factors keep cluster-id order.
pub fn rank_clusters(mut risks: Vec<(usize, usize, f64)>) -> Vec<ClusterSummary> {
    risks.sort_by(|a, b| a.2.total_cmp(&b.2));
    risks
        .into_iter()
        .zip(SCORE_BANDS)
        .map(|((cluster, members, risk_factor), score)| ClusterSummary {
            cluster,
            members,
            risk_factor,
            score,
        })
        .collect()
}

/// Score a whole population of wallets at once.
///
/// Scores are population-relative: normalization and clustering both depend
/// on which other wallets are in the batch.
pub fn score_wallets(features: &[WalletFeatures], kmeans: &KMeans, w: &RiskWeights) -> ScoringOutcome {
    if features.is_empty() {
        return ScoringOutcome {
            scores: Vec::new(),
            labels: Vec::new(),
            clusters: Vec::new(),
        };
    }

    let raw: Vec<Vec<f64>> = features.iter().map(|f| f.as_vector().to_vec()).collect();
    let normalized = MinMaxScaler::fit_transform(&raw);

    let fit = kmeans.fit(&normalized);
    if fit.n_clusters() < kmeans.n_clusters {
        tracing::warn!(
            requested = kmeans.n_clusters,
            effective = fit.n_clusters(),
            wallets = features.len(),
            "too few distinct wallets, reducing cluster count"
        );
    }

    let risks: Vec<(usize, usize, f64)> = cluster_means(&normalized, &fit.labels, fit.n_clusters())
        .into_iter()
        .enumerate()
        .filter_map(|(cluster, mean)| {
            mean.map(|(members, m)| (cluster, members, cluster_risk_factor(&m, w)))
        })
        .collect();
    let clusters = rank_clusters(risks);

    let mut score_by_cluster = vec![SCORE_BANDS[SCORE_BANDS.len() - 1]; fit.n_clusters()];
    for c in &clusters {
        score_by_cluster[c.cluster] = c.score;
    }
    let scores = fit.labels.iter().map(|&l| score_by_cluster[l]).collect();

    ScoringOutcome {
        scores,
        labels: fit.labels,
        clusters,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        if score >= 700 {
            Self::Low
        } else if score >= 500 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// Wallet count per score band, ascending by score. Bands with no wallets are omitted.
pub fn score_distribution(scores: &[u32]) -> Vec<(u32, usize)> {
    let mut bands = SCORE_BANDS;
    bands.sort_unstable();
    bands
        .iter()
        .map(|&band| (band, scores.iter().filter(|&&s| s == band).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
}
