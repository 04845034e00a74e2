use anyhow::{bail, Context, Result};
use std::path::Path;

pub const WALLET_ID_COLUMN: &str = "wallet_id";

/// Parse wallet ids out of CSV text with a `wallet_id` header column.
///
/// Blank rows are skipped; every other data row yields one id, in file
/// order, duplicates included.
pub fn parse_wallets_csv(content: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers().context("failed to read wallet file header")?.clone();
    if headers.iter().all(str::is_empty) {
        bail!("wallet file is empty");
    }
    let Some(idx) = headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == WALLET_ID_COLUMN)
    else {
        bail!("wallet file has no `{WALLET_ID_COLUMN}` column (header: {headers:?})");
    };

    let mut wallets = Vec::new();
    for record in reader.records() {
        let record = record.context("malformed wallet file row")?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map_or(0, csv::Position::line);
        let wallet = record
            .get(idx)
            .with_context(|| format!("row {line} has no `{WALLET_ID_COLUMN}` field"))?;
        wallets.push(wallet.to_string());
    }
    Ok(wallets)
}

pub fn load_wallets(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read wallet file {}", path.display()))?;
    parse_wallets_csv(&content).with_context(|| format!("invalid wallet file {}", path.display()))
}
