//! Transaction receipt records

use serde::Deserialize;
use serde_json::Value;

use crate::block::log::EthLog;
use crate::convert::hex_to_u64;
use crate::error::TransformError;

/// A persisted transaction receipt. Status can be absent pre-Byzantium and
/// is fixed up from trace errors when the transaction is assembled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub gas_used: Option<Value>,
    #[serde(default)]
    pub cumulative_gas_used: Option<Value>,
    #[serde(default)]
    pub effective_gas_price: Option<Value>,
    /// Set when the transaction created a contract
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub logs: Vec<EthLog>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EthReceipt {
    /// Receipt status as a number; requires the fixup to have run for
    /// pre-Byzantium receipts
    pub fn status(&self) -> Result<u64, TransformError> {
        match &self.status {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| TransformError::transform(format!("invalid status: {n}"))),
            Some(Value::String(s)) => hex_to_u64(s),
            other => Err(TransformError::transform(format!(
                "missing or invalid receipt status: {other:?}"
            ))),
        }
    }
}
