use crate::wallet_features::{WalletFeatures, FEATURE_COLUMNS};
use anyhow::{ensure, Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const SCORES_FILE: &str = "risk_scores.csv";
pub const DETAILED_FILE: &str = "detailed_analysis.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredWallet {
    pub features: WalletFeatures,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub scores: PathBuf,
    pub detailed: PathBuf,
}

/// Quote a field only when it would otherwise break the row.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn render_scores_csv(rows: &[ScoredWallet]) -> String {
    let mut out = String::from("wallet_id,score\n");
    for r in rows {
        let _ = writeln!(out, "{},{}", csv_field(&r.features.wallet_id), r.score);
    }
    out
}

pub fn render_detailed_csv(rows: &[ScoredWallet]) -> String {
    let mut out = format!("wallet_id,{},score\n", FEATURE_COLUMNS.join(","));
    for r in rows {
        let f = &r.features;
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            csv_field(&f.wallet_id),
            f.total_borrowed,
            f.total_supplied,
            f.repay_ratio,
            f.liquidation_count,
            f.days_active,
            f.net_position,
            f.tx_count,
            f.avg_gas_used,
            f.unique_markets,
            f.failed_tx_ratio,
            r.score,
        );
    }
    out
}

/// Write both report files into `dir`, creating it if needed.
pub fn write_reports(dir: impl AsRef<Path>, rows: &[ScoredWallet]) -> Result<ReportPaths> {
    let dir = dir.as_ref();
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), "created output directory");
    }
    ensure!(dir.is_dir(), "output path {} is not a directory", dir.display());

    let paths = ReportPaths {
        scores: dir.join(SCORES_FILE),
        detailed: dir.join(DETAILED_FILE),
    };
    std::fs::write(&paths.scores, render_scores_csv(rows))
        .with_context(|| format!("failed to write {}", paths.scores.display()))?;
    std::fs::write(&paths.detailed, render_detailed_csv(rows))
        .with_context(|| format!("failed to write {}", paths.detailed.display()))?;
    Ok(paths)
}
