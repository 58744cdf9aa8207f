//! Block, transaction, receipt, log, and trace data models

mod log;
mod receipt;
mod trace;
mod transaction;
pub mod transfer;

use serde_json::Value;

pub use log::EthLog;
pub use receipt::EthReceipt;
pub use trace::{BlockTraces, CallKind, EthTrace, EthTransactionTraces, TraceKind};
pub use transaction::{EthTransaction, TransactionJson};
pub use transfer::{TokenKind, TokenTransfer};

use crate::chain::EvmChain;
use crate::convert::{hex_to_u64, normalize_hex};
use crate::error::BlockError;

const BURN_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// A block assembled from the `{block, receipts, traces}` document: the
/// chain it came from, header fields the pipeline reads, and fully paired
/// transactions
#[derive(Debug)]
pub struct EthBlock {
    pub chain: EvmChain,
    pub number: u64,
    pub timestamp: u64,
    pub hash: String,
    pub transactions: Vec<EthTransaction>,
}

impl EthBlock {
    /// Parse and validate a block document. The trace backend is detected
    /// by the presence of `traceAddress` at the first trace's root: erigon
    /// traces are a flat list, geth traces are per-transaction call trees.
    pub fn from_json(chain: EvmChain, block_json: &Value) -> Result<EthBlock, BlockError> {
        let block = block_json
            .get("block")
            .ok_or_else(|| BlockError::invalid("missing 'block' section"))?;

        let number = header_quantity(block, "number")?;
        let timestamp = header_quantity(block, "timestamp")?;
        let hash = block
            .get("hash")
            .and_then(Value::as_str)
            .map(normalize_hex)
            .ok_or_else(|| BlockError::invalid("block is missing a hash"))?;

        let transactions_json: Vec<TransactionJson> = serde_json::from_value(
            block
                .get("transactions")
                .cloned()
                .ok_or_else(|| BlockError::invalid("block is missing transactions"))?,
        )?;
        let receipts: Vec<EthReceipt> = serde_json::from_value(
            block_json
                .get("receipts")
                .cloned()
                .ok_or_else(|| BlockError::invalid("missing 'receipts' section"))?,
        )?;

        if transactions_json.len() != receipts.len() {
            return Err(BlockError::invalid(format!(
                "differing number of transactions and receipts for block: {number}"
            )));
        }

        let mut traces = match block_json.get("traces") {
            None => None,
            Some(traces_json) => {
                let trace_list = traces_json
                    .as_array()
                    .ok_or_else(|| BlockError::invalid("'traces' must be an array"))?;

                if trace_list.is_empty() {
                    // an empty list deserializes as either backend
                    Some(BlockTraces::default())
                } else if trace_list[0].get("traceAddress").is_some() {
                    // only erigon has traceAddress at the record root
                    Some(BlockTraces::from_erigon(trace_list)?)
                } else {
                    let hashes: Vec<String> = transactions_json
                        .iter()
                        .map(|tx| tx.hash.clone())
                        .collect();
                    Some(BlockTraces::from_geth(&hash, &hashes, trace_list)?)
                }
            }
        };

        let mut trace_hashes = traces
            .as_ref()
            .map(|t| t.transaction_hashes())
            .unwrap_or_default();

        let mut transactions = Vec::with_capacity(transactions_json.len());
        for (raw, receipt) in transactions_json.into_iter().zip(receipts) {
            let transaction_hash = normalize_hex(&raw.hash);
            let transaction_traces = traces
                .as_mut()
                .and_then(|traces| traces.take(&transaction_hash));

            let transaction = EthTransaction::new(chain, raw, receipt, transaction_traces);
            transaction.check_receipt()?;

            // polygon state syncs legitimately have no traces
            if chain == EvmChain::Polygon
                && transaction.from_address() == BURN_ADDRESS
                && transaction.to_address().ok().as_deref() == Some(BURN_ADDRESS)
            {
                trace_hashes.insert(transaction_hash.clone());
            }

            transactions.push(transaction);
        }

        if traces.is_some() {
            let transaction_hashes: std::collections::HashSet<String> =
                transactions.iter().map(EthTransaction::hash).collect();
            if transaction_hashes != trace_hashes {
                return Err(BlockError::invalid(format!(
                    "differing transactions in the receipts and traces for block: {number}"
                )));
            }
        }

        Ok(EthBlock {
            chain,
            number,
            timestamp,
            hash,
            transactions,
        })
    }
}

fn header_quantity(block: &Value, key: &str) -> Result<u64, BlockError> {
    match block.get(key) {
        Some(Value::String(s)) => {
            hex_to_u64(s).map_err(|e| BlockError::invalid(format!("bad block {key}: {e}")))
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| BlockError::invalid(format!("bad block {key}: {n}"))),
        other => Err(BlockError::invalid(format!(
            "missing block {key}: {other:?}"
        ))),
    }
}
