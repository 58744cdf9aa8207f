//! Pipeline head: select a transaction's occurrences of one item

use std::sync::Arc;

use crate::abi::semantic::{SemanticAbi, SemanticAbiItem};
use crate::block::{EthBlock, EthTransaction};
use crate::schema::{Row, Schema};
use crate::transform::item::TransformItem;
use crate::transform::step::{ItemRows, Step};

/// Filters the transaction's logs or traces down to those matching the
/// item's signature hash and the ABI's contract-address allow-list,
/// emitting one empty row per surviving occurrence.
pub struct InitStep {
    abi: Arc<SemanticAbi>,
    item: Arc<SemanticAbiItem>,
    schema: Schema,
}

impl InitStep {
    pub fn new(abi: Arc<SemanticAbi>, item: Arc<SemanticAbiItem>) -> InitStep {
        InitStep {
            abi,
            item,
            schema: Schema::new(),
        }
    }

    pub fn abi(&self) -> &Arc<SemanticAbi> {
        &self.abi
    }

    pub fn item(&self) -> &Arc<SemanticAbiItem> {
        &self.item
    }
}

impl Step for InitStep {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn inner_transform<'a>(
        &self,
        _block: &'a EthBlock,
        transaction: &'a EthTransaction,
    ) -> Vec<ItemRows<'a>> {
        let mut results = Vec::new();

        if self.item.is_event() {
            for log in transaction.logs_for_topic(self.item.hash()) {
                let item = TransformItem::event(log, self.item.clone());
                if self.abi.should_consider(&item.contract_address()) {
                    results.push(ItemRows {
                        item,
                        rows: vec![Row::new()],
                    });
                }
            }
        } else {
            for trace in transaction.traces_for_topic(self.item.hash()) {
                let item = TransformItem::function(trace, self.item.clone());
                if self.abi.should_consider(&item.contract_address()) {
                    results.push(ItemRows {
                        item,
                        rows: vec![Row::new()],
                    });
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::EvmChain;
    use crate::error::BlockError;
    use serde_json::json;

    fn abi_with_filter(addresses: serde_json::Value) -> Arc<SemanticAbi> {
        let mut metadata = json!({"chains": ["ethereum"]});
        if !addresses.is_null() {
            metadata["contractAddresses"] = addresses;
        }
        Arc::new(
            SemanticAbi::from_json(&json!({
                "metadata": metadata,
                "abi": [{
                    "type": "event",
                    "name": "Ping",
                    "@isPrimary": true,
                    "inputs": [{"name": "value", "type": "uint256"}]
                }]
            }))
            .unwrap(),
        )
    }

    fn block_with_ping(abi: &SemanticAbi, address: &str) -> Result<EthBlock, BlockError> {
        let hash = abi.primary_items()[0].hash().to_string();
        EthBlock::from_json(
            EvmChain::Ethereum,
            &json!({
                "block": {
                    "number": "0x1",
                    "timestamp": "0x64",
                    "hash": "0xb1",
                    "transactions": [{"hash": "0xt1", "from": "0xf1", "to": "0xa1"}]
                },
                "receipts": [{
                    "transactionHash": "0xt1",
                    "status": "0x1",
                    "logs": [{
                        "address": address,
                        "topics": [format!("0x{hash}")],
                        "data": format!("0x{:0>64}", "2a"),
                        "logIndex": "0x0"
                    }]
                }]
            }),
        )
    }

    #[test]
    fn test_emits_one_empty_row_per_occurrence() {
        let abi = abi_with_filter(serde_json::Value::Null);
        let block = block_with_ping(&abi, "0xc0ffee").unwrap();
        let step = InitStep::new(abi.clone(), abi.primary_items()[0].clone());

        let results = step.inner_transform(&block, &block.transactions[0]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rows, vec![Row::new()]);
    }

    #[test]
    fn test_contract_filter_drops_occurrences() {
        let abi = abi_with_filter(json!(["0xdec0de"]));
        let block = block_with_ping(&abi, "0xc0ffee").unwrap();
        let step = InitStep::new(abi.clone(), abi.primary_items()[0].clone());

        assert!(step.inner_transform(&block, &block.transactions[0]).is_empty());
    }
}
