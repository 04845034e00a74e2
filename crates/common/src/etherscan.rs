use crate::types::{ApiEnvelope, ApiTx};
use anyhow::{Context, Result};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// Per-request timeout for every explorer call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Full historical block range queried for every wallet.
pub const START_BLOCK: u64 = 0;
pub const END_BLOCK: u64 = 99_999_999;

/// Compound V2 contracts whose interactions count as protocol activity.
/// Addresses are stored lower-cased; lookups are case-insensitive.
pub const COMPOUND_CONTRACTS: [(&str, &str); 8] = [
    ("0x3d9819210a31b4961b30ef54be2aed79b9c9cd3b", "Comptroller"),
    ("0x5d3a536e4d6dbd6114cc1ead35777bab948e3643", "cDAI"),
    ("0x4ddc2d193948926d02f9b1fe9e1daa0718270ed5", "cETH"),
    ("0x39aa39c021dfbadb8c4e6b5b7c0d7c4c8c69d8a", "cUSDC"),
    ("0xf650c3d88d12db855b8bf7d11be6c55a4e07dcc9", "cUSDT"),
    ("0x70e36f6bf80a52b3b46b3af8e106cc0ed743e8e4", "cLEND"),
    ("0x35a18000230da775cac24873d00ff85bccded550", "cUNI"),
    ("0xc11b1268c1a384e55c48c2391d8d480264a3a7f4", "cWBTC"),
];

/// Market name for a known protocol contract.
pub fn protocol_market(address: &str) -> Option<&'static str> {
    COMPOUND_CONTRACTS
        .iter()
        .find(|(addr, _)| addr.eq_ignore_ascii_case(address))
        .map(|(_, name)| *name)
}

pub fn is_protocol_contract(address: &str) -> bool {
    protocol_market(address).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAction {
    TxList,
    TxListInternal,
}

impl AccountAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TxList => "txlist",
            Self::TxListInternal => "txlistinternal",
        }
    }
}

/// Why a single explorer call produced no data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("explorer returned HTTP {0}")]
    HttpStatus(u16),

    #[error("explorer reported failure: {message}")]
    Api { message: String },

    #[error("failed to decode explorer response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(e) if e.is_timeout() => "timeout",
            Self::Transport(_) => "transport",
            Self::HttpStatus(429) => "rate_limited",
            Self::HttpStatus(_) => "http_status",
            Self::Api { .. } => "api_status",
            Self::Decode(_) => "decode",
        }
    }
}

pub struct EtherscanClient {
    api_url: Url,
    api_key: String,
    client: reqwest::Client,
}

impl EtherscanClient {
    pub fn new(api_url: &str, api_key: &str) -> Result<Self> {
        Self::with_timeout(api_url, api_key, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(api_url.trim_end_matches('/'))
            .with_context(|| format!("invalid explorer URL: {api_url}"))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_url,
            api_key: api_key.to_string(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_str()
    }

    pub fn account_url(&self, action: AccountAction, address: &str) -> Url {
        let mut url = self.api_url.clone();
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("module", "account");
            qp.append_pair("action", action.as_str());
            qp.append_pair("address", address);
            qp.append_pair("startblock", &START_BLOCK.to_string());
            qp.append_pair("endblock", &END_BLOCK.to_string());
            qp.append_pair("sort", "asc");
            qp.append_pair("apikey", &self.api_key);
        }
        url
    }

    /// Normal (externally submitted) transactions for `address`, unfiltered.
    pub async fn fetch_txlist(&self, address: &str) -> std::result::Result<Vec<ApiTx>, FetchError> {
        self.fetch_account_action(AccountAction::TxList, address).await
    }

    /// Internal (contract-triggered) transactions for `address`.
    pub async fn fetch_txlist_internal(
        &self,
        address: &str,
    ) -> std::result::Result<Vec<ApiTx>, FetchError> {
        self.fetch_account_action(AccountAction::TxListInternal, address)
            .await
    }

    async fn fetch_account_action(
        &self,
        action: AccountAction,
        address: &str,
    ) -> std::result::Result<Vec<ApiTx>, FetchError> {
        let url = self.account_url(action, address);
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        let body = resp.bytes().await?;
        parse_account_response(&body)
    }
}

/// Decode an explorer response body into transactions.
///
/// An empty history ("No transactions found") is a successful empty list.
pub fn parse_account_response(body: &[u8]) -> std::result::Result<Vec<ApiTx>, FetchError> {
    let envelope: ApiEnvelope = serde_json::from_slice(body)?;
    if envelope.is_ok() {
        return Ok(serde_json::from_value(envelope.result)?);
    }
    if envelope.is_empty_history() {
        return Ok(Vec::new());
    }
    Err(FetchError::Api {
        message: envelope.failure_reason(),
    })
}
