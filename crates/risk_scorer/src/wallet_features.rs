use common::etherscan::is_protocol_contract;
use common::types::{ApiTx, WEI_PER_ETH};
use std::collections::HashSet;

/// Above this, a zero-value call is read as a borrow.
pub const HIGH_GAS_THRESHOLD: u64 = 100_000;
/// Above this, a value-carrying call is read as a supply.
pub const SUPPLY_GAS_THRESHOLD: u64 = 50_000;
/// Internal transactions above this are counted as liquidations.
pub const LIQUIDATION_GAS_THRESHOLD: u64 = 200_000;

const SECS_PER_DAY: f64 = 86_400.0;

/// Behavioural features for one wallet.
///
/// Borrow, supply and liquidation counts are gas-threshold heuristics, not
/// decoded protocol events.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletFeatures {
    pub wallet_id: String,
    pub total_borrowed: u32,
    pub total_supplied: u32,
    pub repay_ratio: f64,
    pub liquidation_count: u32,
    pub days_active: f64,
    pub net_position: f64,
    pub tx_count: u32,
    pub avg_gas_used: f64,
    pub unique_markets: u32,
    pub failed_tx_ratio: f64,
}

/// Column names in the order used for scaling, clustering and reports.
pub const FEATURE_COLUMNS: [&str; 10] = [
    "total_borrowed",
    "total_supplied",
    "repay_ratio",
    "liquidation_count",
    "days_active",
    "net_position",
    "tx_count",
    "avg_gas_used",
    "unique_markets",
    "failed_tx_ratio",
];

/// Positions inside `WalletFeatures::as_vector`.
pub mod col {
    pub const REPAY_RATIO: usize = 2;
    pub const LIQUIDATION_COUNT: usize = 3;
    pub const DAYS_ACTIVE: usize = 4;
    pub const NET_POSITION: usize = 5;
    pub const FAILED_TX_RATIO: usize = 9;
}

impl WalletFeatures {
    /// Record for a wallet with no observed activity: every field zero.
    pub fn empty(wallet_id: &str) -> Self {
        Self {
            wallet_id: wallet_id.to_string(),
            total_borrowed: 0,
            total_supplied: 0,
            repay_ratio: 0.0,
            liquidation_count: 0,
            days_active: 0.0,
            net_position: 0.0,
            tx_count: 0,
            avg_gas_used: 0.0,
            unique_markets: 0,
            failed_tx_ratio: 0.0,
        }
    }

    /// Feature values in `FEATURE_COLUMNS` order. Non-finite values read as 0.
    pub fn as_vector(&self) -> [f64; 10] {
        [
            f64::from(self.total_borrowed),
            f64::from(self.total_supplied),
            self.repay_ratio,
            f64::from(self.liquidation_count),
            self.days_active,
            self.net_position,
            f64::from(self.tx_count),
            self.avg_gas_used,
            f64::from(self.unique_markets),
            self.failed_tx_ratio,
        ]
        .map(|v| if v.is_finite() { v } else { 0.0 })
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Derive the feature record for `wallet` from its protocol transactions
/// (`normal`, already filtered to contract recipients) and its internal
/// transactions.
pub fn compute_wallet_features(wallet: &str, normal: &[ApiTx], internal: &[ApiTx]) -> WalletFeatures {
    if normal.is_empty() && internal.is_empty() {
        return WalletFeatures::empty(wallet);
    }

    let (min_ts, max_ts, observed) = normal.iter().chain(internal).filter_map(ApiTx::timestamp).fold(
        (i64::MAX, i64::MIN, 0_usize),
        |(lo, hi, n), ts| (lo.min(ts), hi.max(ts), n + 1),
    );
    let days_active = if observed > 1 {
        (max_ts - min_ts) as f64 / SECS_PER_DAY
    } else {
        0.0
    };

    let failed = normal.iter().filter(|tx| tx.is_failed()).count();
    let failed_tx_ratio = if normal.is_empty() {
        0.0
    } else {
        failed as f64 / normal.len() as f64
    };

    let gas: Vec<u64> = normal.iter().filter_map(ApiTx::recorded_gas_used).collect();
    let avg_gas_used = if gas.is_empty() {
        0.0
    } else {
        gas.iter().map(|&g| g as f64).sum::<f64>() / gas.len() as f64
    };

    let markets: HashSet<String> = normal
        .iter()
        .map(ApiTx::to_lower)
        .filter(|to| is_protocol_contract(to))
        .collect();

    let borrow_estimate = normal
        .iter()
        .filter(|tx| tx.gas_used_or_zero() > HIGH_GAS_THRESHOLD && tx.value_wei() == 0.0)
        .count();
    let supply_txs = normal
        .iter()
        .filter(|tx| tx.value_wei() > 0.0 && tx.gas_used_or_zero() > SUPPLY_GAS_THRESHOLD)
        .count();

    let liquidation_count = internal
        .iter()
        .filter(|tx| tx.gas_used_or_zero() > LIQUIDATION_GAS_THRESHOLD)
        .count();

    let repay_ratio = if borrow_estimate > 0 {
        supply_txs as f64 / borrow_estimate as f64
    } else {
        1.0
    };

    let value_in: f64 = normal
        .iter()
        .filter(|tx| tx.is_to(wallet))
        .map(ApiTx::value_wei)
        .sum();
    let value_out: f64 = normal
        .iter()
        .filter(|tx| tx.is_from(wallet))
        .map(ApiTx::value_wei)
        .sum();
    let net_position = (value_out - value_in) / WEI_PER_ETH;

    WalletFeatures {
        wallet_id: wallet.to_string(),
        total_borrowed: count_u32(borrow_estimate),
        total_supplied: count_u32(supply_txs),
        repay_ratio,
        liquidation_count: count_u32(liquidation_count),
        days_active,
        net_position,
        tx_count: count_u32(normal.len() + internal.len()),
        avg_gas_used,
        unique_markets: count_u32(markets.len()),
        failed_tx_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0x7a16ff8270133f063aab6c9977183d9e72835428";
    const CDAI: &str = "0x5d3a536e4d6dbd6114cc1ead35777bab948e3643";
    const CETH: &str = "0x4ddc2d193948926d02f9b1fe9e1daa0718270ed5";

    fn tx(to: &str, value: &str, gas_used: &str, ts: i64, is_error: bool) -> ApiTx {
        ApiTx {
            from: Some(WALLET.to_string()),
            to: Some(to.to_string()),
            value: Some(value.to_string()),
            gas_used: Some(gas_used.to_string()),
            time_stamp: Some(ts.to_string()),
            is_error: Some(if is_error { "1" } else { "0" }.to_string()),
            ..ApiTx::default()
        }
    }

    fn internal(gas_used: &str, ts: i64) -> ApiTx {
        ApiTx {
            from: Some(CETH.to_string()),
            to: Some(WALLET.to_string()),
            value: Some("1000".to_string()),
            gas_used: Some(gas_used.to_string()),
            time_stamp: Some(ts.to_string()),
            ..ApiTx::default()
        }
    }

    #[test]
    fn test_no_transactions_yields_zero_record() {
        let f = compute_wallet_features(WALLET, &[], &[]);
        assert_eq!(f, WalletFeatures::empty(WALLET));
        assert_eq!(f.as_vector(), [0.0; 10]);
    }

    #[test]
    fn test_borrow_supply_estimates() {
        let normal = vec![
            tx(CDAI, "0", "150000", 1, false),
            tx(CDAI, "0", "120000", 2, false),
            tx(CETH, "0", "100001", 3, false),
            tx(CETH, "500000000000000000", "60000", 4, false),
            tx(CETH, "700000000000000000", "150000", 5, false),
            // neither: zero value and low gas
            tx(CDAI, "0", "90000", 6, false),
        ];
        let f = compute_wallet_features(WALLET, &normal, &[]);
        assert_eq!(f.total_borrowed, 3);
        assert_eq!(f.total_supplied, 2);
        assert!((f.repay_ratio - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_repay_ratio_defaults_to_one_without_borrows() {
        let normal = vec![
            tx(CETH, "1000000000000000000", "80000", 1, false),
            tx(CETH, "1000000000000000000", "80000", 2, false),
        ];
        let f = compute_wallet_features(WALLET, &normal, &[]);
        assert_eq!(f.total_borrowed, 0);
        assert_eq!(f.total_supplied, 2);
        assert!((f.repay_ratio - 1.0).abs() < f64::EPSILON);

        // Only internal activity: still computed path, still 1.0.
        let f = compute_wallet_features(WALLET, &[], &[internal("10", 1)]);
        assert!((f.repay_ratio - 1.0).abs() < f64::EPSILON);
        assert!(f.failed_tx_ratio.abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_ratio_all_and_none() {
        let good: Vec<ApiTx> = (0..10)
            .map(|i| tx(CETH, "2000000000000000000", "150000", i, false))
            .collect();
        let bad: Vec<ApiTx> = (0..10).map(|i| tx(CDAI, "0", "30000", i, true)).collect();

        let g = compute_wallet_features(WALLET, &good, &[]);
        let b = compute_wallet_features(WALLET, &bad, &[]);
        assert!(g.failed_tx_ratio.abs() < f64::EPSILON);
        assert!((b.failed_tx_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_days_active_spans_normal_and_internal() {
        let normal = vec![tx(CDAI, "0", "50000", 1_600_000_000, false)];
        let internals = vec![internal("0", 1_600_000_000 + 3 * 86_400)];
        let f = compute_wallet_features(WALLET, &normal, &internals);
        assert!((f.days_active - 3.0).abs() < 1e-12);
        assert_eq!(f.tx_count, 2);
    }

    #[test]
    fn test_single_timestamp_means_zero_days() {
        let mut only = tx(CDAI, "0", "50000", 1_600_000_000, false);
        let f = compute_wallet_features(WALLET, std::slice::from_ref(&only), &[]);
        assert!(f.days_active.abs() < f64::EPSILON);

        only.time_stamp = None;
        let f = compute_wallet_features(WALLET, &[only.clone(), only], &[]);
        assert!(f.days_active.abs() < f64::EPSILON);
    }

    #[test]
    fn test_avg_gas_skips_unrecorded_values() {
        let mut missing = tx(CDAI, "0", "", 3, false);
        missing.gas_used = None;
        let normal = vec![
            tx(CDAI, "0", "100000", 1, false),
            tx(CDAI, "0", "0", 2, false),
            missing,
        ];
        let f = compute_wallet_features(WALLET, &normal, &[]);
        assert!((f.avg_gas_used - 50_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_unique_markets_counts_distinct_contracts_case_insensitively() {
        let normal = vec![
            tx(CDAI, "0", "1", 1, false),
            tx(&CDAI.to_uppercase().replace("0X", "0x"), "0", "1", 2, false),
            tx(CETH, "0", "1", 3, false),
            tx("0x1f9840a85d5af5bf1d1762f925bdaddc4201f984", "0", "1", 4, false),
        ];
        let f = compute_wallet_features(WALLET, &normal, &[]);
        assert_eq!(f.unique_markets, 2);
        assert!(f.unique_markets <= 8);
    }

    #[test]
    fn test_liquidations_from_high_gas_internal_txs() {
        let internals = vec![internal("200000", 1), internal("200001", 2), internal("950000", 3)];
        let f = compute_wallet_features(WALLET, &[], &internals);
        assert_eq!(f.liquidation_count, 2);
    }

    #[test]
    fn test_net_position_in_whole_eth() {
        let mut inbound = tx(CETH, "500000000000000000", "21000", 2, false);
        inbound.from = Some(CETH.to_string());
        inbound.to = Some(WALLET.to_uppercase().replace("0X", "0x"));
        let normal = vec![tx(CETH, "3000000000000000000", "90000", 1, false), inbound];
        let f = compute_wallet_features(WALLET, &normal, &[]);
        assert!((f.net_position - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_fixture_wallet_features() {
        let normal_body = include_bytes!("../../../tests/fixtures/txlist_sample.json");
        let internal_body = include_bytes!("../../../tests/fixtures/txlistinternal_sample.json");
        let normal = crate::fetcher::protocol_txs_only(
            common::etherscan::parse_account_response(normal_body).unwrap(),
        );
        let internals = common::etherscan::parse_account_response(internal_body).unwrap();

        let f = compute_wallet_features(WALLET, &normal, &internals);
        // UNI transfer is dropped by the protocol filter.
        assert_eq!(f.tx_count, 5);
        assert_eq!(f.unique_markets, 3);
        assert_eq!(f.total_borrowed, 2);
        assert_eq!(f.total_supplied, 1);
        assert!((f.repay_ratio - 0.5).abs() < 1e-12);
        assert_eq!(f.liquidation_count, 1);
        assert!(f.failed_tx_ratio.abs() < f64::EPSILON);
        assert!((f.net_position - 2.5).abs() < 1e-9);
        assert!((f.days_active - 400_000.0 / 86_400.0).abs() < 1e-9);
    }
}
