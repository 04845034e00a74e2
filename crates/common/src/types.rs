use serde::{Deserialize, Serialize};

/// Wei per whole ETH.
pub const WEI_PER_ETH: f64 = 1e18;

/// Response envelope shared by every Etherscan `module=account` action.
///
/// `result` is a list of transactions on success but a plain string
/// ("Invalid API Key", "Max rate limit reached", ...) on failure, so it is
/// kept as raw JSON until the status has been checked.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub status: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub result: serde_json::Value,
}

impl ApiEnvelope {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("1")
    }

    /// Etherscan reports an empty history as status "0" rather than an empty list.
    pub fn is_empty_history(&self) -> bool {
        self.status.as_deref() == Some("0")
            && self
                .message
                .as_deref()
                .is_some_and(|m| m.starts_with("No transactions found"))
    }

    /// Human-readable failure reason: the `result` string when present, else `message`.
    pub fn failure_reason(&self) -> String {
        match &self.result {
            serde_json::Value::String(s) if !s.is_empty() => s.clone(),
            _ => self
                .message
                .clone()
                .unwrap_or_else(|| "unknown API error".to_string()),
        }
    }
}

/// Transaction from `action=txlist` or `action=txlistinternal`.
///
/// Every field arrives as a string; the accessors below apply the numeric
/// fallbacks the feature extractor relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTx {
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(rename = "timeStamp", default)]
    pub time_stamp: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(rename = "gasUsed", default)]
    pub gas_used: Option<String>,
    #[serde(rename = "isError", default)]
    pub is_error: Option<String>,
}

fn non_empty(field: Option<&String>) -> Option<&str> {
    field.map(String::as_str).filter(|s| !s.trim().is_empty())
}

impl ApiTx {
    /// Unix timestamp in seconds, if the field is present and numeric.
    pub fn timestamp(&self) -> Option<i64> {
        non_empty(self.time_stamp.as_ref()).and_then(|s| s.trim().parse().ok())
    }

    /// Gas used, only when the API actually reported a value.
    pub fn recorded_gas_used(&self) -> Option<u64> {
        non_empty(self.gas_used.as_ref()).and_then(|s| s.trim().parse().ok())
    }

    /// Gas used with missing values read as 0.
    pub fn gas_used_or_zero(&self) -> u64 {
        self.recorded_gas_used().unwrap_or(0)
    }

    /// Transferred value in wei. Missing or unparsable values read as 0.
    pub fn value_wei(&self) -> f64 {
        let Some(raw) = non_empty(self.value.as_ref()) else {
            return 0.0;
        };
        let raw = raw.trim();
        raw.parse::<u128>()
            .map(|v| v as f64)
            .or_else(|_| raw.parse::<f64>())
            .unwrap_or(0.0)
    }

    pub fn is_failed(&self) -> bool {
        self.is_error.as_deref() == Some("1")
    }

    /// Lower-cased recipient address, empty when absent (contract creation).
    pub fn to_lower(&self) -> String {
        self.to.as_deref().unwrap_or_default().to_lowercase()
    }

    pub fn is_from(&self, address: &str) -> bool {
        self.from
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case(address))
    }

    pub fn is_to(&self, address: &str) -> bool {
        self.to
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(address))
    }
}
