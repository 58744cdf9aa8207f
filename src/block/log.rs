//! Raw event log records

use serde::Deserialize;
use serde_json::Value;

use crate::convert::{hex_to_u64, strip_hex_prefix};
use crate::error::TransformError;

/// One emitted log as persisted in a receipt. Hex quantities stay in their
/// wire form; conversion happens at column extraction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    /// Log index relative to the block, decimal or hex
    #[serde(default)]
    pub log_index: Option<Value>,
    #[serde(default)]
    pub block_number: Option<Value>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub transaction_index: Option<Value>,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl EthLog {
    /// The signature topic, when the log has any topics at all
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    /// The signature topic without its hex prefix
    pub fn topic0_hash(&self) -> Option<&str> {
        self.topic0().map(strip_hex_prefix)
    }

    /// Block-relative log index as a number
    pub fn log_index(&self) -> Result<u64, TransformError> {
        match &self.log_index {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| TransformError::transform(format!("invalid logIndex: {n}"))),
            Some(Value::String(s)) => hex_to_u64(s),
            other => Err(TransformError::transform(format!(
                "missing or invalid logIndex: {other:?}"
            ))),
        }
    }
}
