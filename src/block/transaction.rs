//! One transaction with its receipt, traces, and detected transfers

use std::sync::OnceLock;

use serde::Deserialize;
use serde_json::Value;

use crate::block::log::EthLog;
use crate::block::receipt::EthReceipt;
use crate::block::trace::{EthTrace, EthTransactionTraces};
use crate::block::transfer::{self, TokenTransfer};
use crate::chain::EvmChain;
use crate::convert::{normalize_hex, strip_hex_prefix};
use crate::error::{BlockError, TransformError};

/// The raw transaction record from the block body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionJson {
    pub hash: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub gas: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub transaction_index: Option<Value>,
}

/// A transaction with everything the transform pipeline reads: the raw
/// record, its receipt, optional traces, and lazily detected token
/// transfers
#[derive(Debug)]
pub struct EthTransaction {
    pub chain: EvmChain,
    pub raw: TransactionJson,
    pub receipt: EthReceipt,
    pub traces: Option<EthTransactionTraces>,
    transfers: OnceLock<Vec<TokenTransfer>>,
}

impl EthTransaction {
    pub fn new(
        chain: EvmChain,
        raw: TransactionJson,
        mut receipt: EthReceipt,
        traces: Option<EthTransactionTraces>,
    ) -> EthTransaction {
        // status is a post-Byzantium addition; reconstruct it from the root
        // trace error when absent, otherwise assume success
        if receipt.status.is_none() || receipt.status == Some(Value::Null) {
            let status = match &traces {
                Some(traces) => {
                    if traces.root.error.is_none() {
                        1
                    } else {
                        0
                    }
                }
                None => 1,
            };
            receipt.status = Some(Value::from(status));
        }

        EthTransaction {
            chain,
            raw,
            receipt,
            traces,
            transfers: OnceLock::new(),
        }
    }

    pub fn hash(&self) -> String {
        normalize_hex(&self.raw.hash)
    }

    pub fn from_address(&self) -> String {
        normalize_hex(&self.raw.from)
    }

    /// The to address, or the created contract's address for contract
    /// creations
    pub fn to_address(&self) -> Result<String, TransformError> {
        if let Some(to) = &self.raw.to {
            return Ok(normalize_hex(to));
        }
        if let Some(contract_address) = &self.receipt.contract_address {
            return Ok(normalize_hex(contract_address));
        }
        Err(TransformError::transform(format!(
            "transaction missing to and receipt contract address: {}",
            self.hash()
        )))
    }

    pub fn is_contract_creation(&self) -> bool {
        self.receipt.contract_address.is_some()
    }

    pub fn logs(&self) -> &[EthLog] {
        &self.receipt.logs
    }

    /// Logs whose signature topic equals the given hash (no `0x`)
    pub fn logs_for_topic(&self, topic: &str) -> Vec<&EthLog> {
        self.receipt
            .logs
            .iter()
            .filter(|log| log.topic0_hash() == Some(topic))
            .collect()
    }

    /// Traces whose input selector equals the given hash (no `0x`)
    pub fn traces_for_topic(&self, topic: &str) -> Vec<&EthTrace> {
        if topic.is_empty() {
            return Vec::new();
        }
        match &self.traces {
            None => Vec::new(),
            Some(traces) => traces
                .traces()
                .filter(|trace| {
                    trace
                        .signature()
                        .map(strip_hex_prefix)
                        .is_some_and(|signature| signature == topic)
                })
                .collect(),
        }
    }

    /// Whether any log or trace in this transaction carries the hash
    pub fn has_topic(&self, topic: &str) -> bool {
        !self.logs_for_topic(topic).is_empty() || !self.traces_for_topic(topic).is_empty()
    }

    /// All token transfers detected in this transaction's logs, decoded on
    /// first access and cached
    pub fn transfers(&self) -> &[TokenTransfer] {
        self.transfers.get_or_init(|| {
            self.receipt
                .logs
                .iter()
                .enumerate()
                .flat_map(|(log_position, log)| transfer::decode_transfers(log, log_position))
                .collect()
        })
    }

    pub fn status(&self) -> Result<u64, TransformError> {
        self.receipt.status()
    }

    /// Validate the receipt belongs to this transaction
    pub fn check_receipt(&self) -> Result<(), BlockError> {
        if self.hash() != normalize_hex(&self.receipt.transaction_hash) {
            return Err(BlockError::invalid(format!(
                "Transaction and receipt hash mismatch: {}",
                self.hash()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transaction(receipt: EthReceipt, traces: Option<EthTransactionTraces>) -> EthTransaction {
        EthTransaction::new(
            EvmChain::Ethereum,
            TransactionJson {
                hash: "0xABC".to_string(),
                from: "0xF1".to_string(),
                to: Some("0xT1".to_string()),
                ..TransactionJson::default()
            },
            receipt,
            traces,
        )
    }

    #[test]
    fn test_status_fixup_without_traces() {
        let tx = transaction(EthReceipt::default(), None);
        assert_eq!(tx.status().unwrap(), 1);
    }

    #[test]
    fn test_status_fixup_from_root_trace_error() {
        let root = EthTrace {
            transaction_hash: "0xabc".to_string(),
            error: Some("Reverted".to_string()),
            ..EthTrace::default()
        };
        let tx = transaction(EthReceipt::default(), Some(EthTransactionTraces::new(root)));
        assert_eq!(tx.status().unwrap(), 0);
    }

    #[test]
    fn test_existing_status_untouched() {
        let receipt: EthReceipt = serde_json::from_value(json!({
            "transactionHash": "0xabc", "status": "0x0"
        }))
        .unwrap();
        let tx = transaction(receipt, None);
        assert_eq!(tx.status().unwrap(), 0);
    }

    #[test]
    fn test_to_address_falls_back_to_contract_creation() {
        let mut receipt = EthReceipt::default();
        receipt.contract_address = Some("0xNEW".to_string());
        let mut tx = transaction(receipt, None);
        tx.raw.to = None;
        assert_eq!(tx.to_address().unwrap(), "0xnew");
        assert!(tx.is_contract_creation());
    }

    #[test]
    fn test_logs_for_topic() {
        let receipt: EthReceipt = serde_json::from_value(json!({
            "transactionHash": "0xabc",
            "status": "0x1",
            "logs": [
                {"address": "0x1", "topics": ["0xaa11"], "data": "0x"},
                {"address": "0x2", "topics": ["0xbb22"], "data": "0x"},
                {"address": "0x3", "topics": [], "data": "0x"}
            ]
        }))
        .unwrap();
        let tx = transaction(receipt, None);

        assert_eq!(tx.logs_for_topic("aa11").len(), 1);
        assert_eq!(tx.logs_for_topic("cc33").len(), 0);
        assert!(tx.has_topic("bb22"));
        assert!(!tx.has_topic("cc33"));
    }

    #[test]
    fn test_traces_for_topic() {
        let mut traces = EthTransactionTraces::new(EthTrace {
            transaction_hash: "0xabc".to_string(),
            input: Some("0xa9059cbb0011".to_string()),
            ..EthTrace::default()
        });
        traces.add_trace(EthTrace {
            transaction_hash: "0xabc".to_string(),
            trace_address: vec![0],
            input: Some("0x095ea7b3".to_string()),
            ..EthTrace::default()
        });

        let tx = transaction(EthReceipt::default(), Some(traces));
        assert_eq!(tx.traces_for_topic("a9059cbb").len(), 1);
        assert_eq!(tx.traces_for_topic("095ea7b3").len(), 1);
        assert_eq!(tx.traces_for_topic("").len(), 0);
    }
}
