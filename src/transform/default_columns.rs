//! Chain, block, transaction, and item metadata columns

use serde_json::Value;

use crate::block::{EthBlock, EthTransaction};
use crate::convert::{hex_to_float, normalize_hex};
use crate::error::{AbiError, TransformError};
use crate::schema::{Column, ColumnTransform, DataType, Schema};
use crate::transform::item::TransformItem;
use crate::transform::step::{propagate, ItemRows, Step};

type Extractor =
    fn(&EthBlock, &EthTransaction, &TransformItem<'_>) -> Result<Value, TransformError>;

/// The fixed metadata columns present on every row, independent of the
/// decode result
fn default_columns() -> Vec<(Column, Extractor)> {
    vec![
        (Column::new("chain", DataType::String), |block, _, _| {
            Ok(Value::from(block.chain.name()))
        }),
        (Column::hash_string("blockHash"), |block, _, _| {
            Ok(Value::from(block.hash.clone()))
        }),
        (Column::new("blockNumber", DataType::UInt32), |block, _, _| {
            Ok(Value::from(block.number))
        }),
        (
            Column::new("blockTimestamp", DataType::Timestamp),
            |block, _, _| Ok(Value::from(block.timestamp)),
        ),
        (Column::hash_string("transactionHash"), |_, transaction, _| {
            Ok(Value::from(transaction.hash()))
        }),
        (Column::hash_string("transactionFrom"), |_, transaction, _| {
            Ok(Value::from(transaction.from_address()))
        }),
        (Column::hash_string("transactionTo"), |_, transaction, _| {
            Ok(Value::from(transaction.to_address()?))
        }),
        (Column::hash_string("contractAddress"), |_, _, item| {
            Ok(Value::from(normalize_hex(&item.contract_address())))
        }),
        (Column::new("status", DataType::UInt8), |_, transaction, _| {
            Ok(Value::from(transaction.status()?))
        }),
        (
            Column::new("gasUsed", DataType::Float64),
            |_, transaction, _| {
                hex_to_float(
                    transaction
                        .receipt
                        .gas_used
                        .as_ref()
                        .unwrap_or(&Value::Null),
                )
            },
        ),
        (Column::new("itemType", DataType::String), |_, _, item| {
            Ok(Value::from(item.item_type()))
        }),
        // a string: function calls are identified by their trace path, not
        // an integer index
        (
            Column::with_transform(
                "internalIndex",
                DataType::String,
                ColumnTransform::ToString(None),
            ),
            |_, _, item| Ok(Value::from(item.internal_index()?)),
        ),
    ]
}

/// Appends the default metadata columns to every row
pub struct DefaultColumnsStep {
    previous: Box<dyn Step>,
    columns: Vec<(Column, Extractor)>,
    schema: Schema,
}

impl DefaultColumnsStep {
    pub fn new(previous: Box<dyn Step>) -> Result<DefaultColumnsStep, AbiError> {
        let columns = default_columns();
        let schema = previous.schema().with_columns(
            columns.iter().map(|(column, _)| column.clone()).collect(),
            false,
        )?;

        Ok(DefaultColumnsStep {
            previous,
            columns,
            schema,
        })
    }
}

impl Step for DefaultColumnsStep {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn inner_transform<'a>(
        &self,
        block: &'a EthBlock,
        transaction: &'a EthTransaction,
    ) -> Vec<ItemRows<'a>> {
        propagate(
            self.previous.as_ref(),
            block,
            transaction,
            true,
            |item, mut rows| {
                for row in &mut rows {
                    for (column, extract) in &self.columns {
                        row.insert(column.name.clone(), extract(block, transaction, item)?);
                    }
                }
                Ok(rows)
            },
        )
    }
}
