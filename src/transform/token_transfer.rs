//! The synthetic token-transfer match source

use serde_json::Value;

use crate::block::{EthBlock, EthTransaction};
use crate::schema::{Column, ColumnTransform, DataType, Row, Schema};
use crate::transform::item::TransformItem;
use crate::transform::step::{ItemRows, Step};

/// Produces one row per token transfer detected in the transaction, with
/// the fixed `fromAddress`/`toAddress`/`value`/`tokenId`/`tokenType`
/// schema. Used as the source for `transfer`-type matches.
pub struct TokenTransferStep {
    schema: Schema,
}

impl TokenTransferStep {
    pub fn new() -> TokenTransferStep {
        TokenTransferStep {
            schema: Schema::from_columns(vec![
                Column::hash_string("fromAddress"),
                Column::hash_string("toAddress"),
                Column::new("value", DataType::Int256),
                Column::with_transform("tokenId", DataType::String, ColumnTransform::ToString(None)),
                Column::new("tokenType", DataType::String),
            ]),
        }
    }
}

impl Default for TokenTransferStep {
    fn default() -> Self {
        TokenTransferStep::new()
    }
}

impl Step for TokenTransferStep {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn inner_transform<'a>(
        &self,
        _block: &'a EthBlock,
        transaction: &'a EthTransaction,
    ) -> Vec<ItemRows<'a>> {
        transaction
            .transfers()
            .iter()
            .map(|transfer| {
                let mut row = Row::new();
                row.insert(
                    "fromAddress".to_string(),
                    Value::from(transfer.from_address.clone()),
                );
                row.insert(
                    "toAddress".to_string(),
                    Value::from(transfer.to_address.clone()),
                );
                row.insert("value".to_string(), transfer.value.clone());
                row.insert(
                    "tokenId".to_string(),
                    transfer.token_id.clone().unwrap_or(Value::Null),
                );
                row.insert(
                    "tokenType".to_string(),
                    Value::from(transfer.token_kind.code()),
                );

                ItemRows {
                    item: TransformItem::transfer(transfer),
                    rows: vec![row],
                }
            })
            .collect()
    }
}
