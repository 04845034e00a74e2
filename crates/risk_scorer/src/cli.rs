use crate::fetcher::TxHistoryFetcher;
use crate::wallet_features::{compute_wallet_features, WalletFeatures};
use anyhow::Result;
use common::etherscan::protocol_market;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Wallet { address: String },
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let Some(cmd) = args.next() else {
        return Ok(Command::Run);
    };

    match cmd.as_str() {
        "run" => Ok(Command::Run),
        "wallet" => {
            let address = args
                .next()
                .ok_or_else(|| "usage: risk_scorer wallet <address>".to_string())?;
            Ok(Command::Wallet { address })
        }
        other => Err(format!("unknown command: {other}")),
    }
}

pub fn format_features(f: &WalletFeatures) -> String {
    format!(
        "Wallet: {}\n  total_borrowed={}  total_supplied={}  repay_ratio={:.3}\n  liquidation_count={}  days_active={:.1}  net_position={:.4}\n  tx_count={}  avg_gas_used={:.0}  unique_markets={}  failed_tx_ratio={:.3}",
        f.wallet_id,
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
    )
}

/// Fetch and print one wallet's feature record. Scores are population-relative,
/// so none is shown here.
pub async fn show_wallet<F: TxHistoryFetcher + Sync>(fetcher: &F, address: &str) -> Result<()> {
    let normal = fetcher.fetch_normal_txs(address).await;
    let internal = fetcher.fetch_internal_txs(address).await;
    let failed = usize::from(normal.is_failed()) + usize::from(internal.is_failed());
    let (normal, internal) = (normal.into_txs(), internal.into_txs());

    let mut markets: Vec<&str> = normal
        .iter()
        .filter_map(|tx| tx.to.as_deref().and_then(protocol_market))
        .collect();
    markets.sort_unstable();
    markets.dedup();

    let features = compute_wallet_features(address, &normal, &internal);
    println!("{}", format_features(&features));
    println!("  markets: {}", markets.join(", "));
    if failed > 0 {
        println!("  ({failed} fetch(es) failed; see logs)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_defaults_to_run() {
        let cmd = parse_args(vec!["risk_scorer".to_string()].into_iter()).unwrap();
        assert_eq!(cmd, Command::Run);
    }

    #[test]
    fn test_parse_explicit_run() {
        let cmd = parse_args(vec!["risk_scorer".to_string(), "run".to_string()].into_iter()).unwrap();
        assert_eq!(cmd, Command::Run);
    }

    #[test]
    fn test_parse_wallet_command() {
        let cmd = parse_args(
            vec![
                "risk_scorer".to_string(),
                "wallet".to_string(),
                "0xabc".to_string(),
            ]
            .into_iter(),
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::Wallet {
                address: "0xabc".to_string()
            }
        );
    }

    #[test]
    fn test_parse_wallet_without_address_is_error() {
        let err = parse_args(vec!["risk_scorer".to_string(), "wallet".to_string()].into_iter())
            .unwrap_err();
        assert!(err.contains("usage"));
    }

    #[test]
    fn test_parse_unknown_command() {
        let err = parse_args(vec!["risk_scorer".to_string(), "score".to_string()].into_iter())
            .unwrap_err();
        assert_eq!(err, "unknown command: score");
    }

    #[test]
    fn test_format_features_zero_record() {
        let text = format_features(&WalletFeatures::empty("0xabc"));
        assert!(text.starts_with("Wallet: 0xabc"));
        assert!(text.contains("tx_count=0"));
        assert!(text.contains("repay_ratio=0.000"));
    }
}
