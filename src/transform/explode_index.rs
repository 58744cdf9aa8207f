//! Row-sequence index over exploded and matched rows

use serde_json::Value;

use crate::block::{EthBlock, EthTransaction};
use crate::error::AbiError;
use crate::schema::{Column, DataType, Schema};
use crate::transform::step::{propagate, ItemRows, Step};

const EXPLODE_INDEX_COLUMN: &str = "explodeIndex";

/// Appends a zero-based index reflecting each item's final row
/// multiplicity after the explode and match stages
pub struct ExplodeIndexStep {
    previous: Box<dyn Step>,
    schema: Schema,
}

impl ExplodeIndexStep {
    pub fn new(previous: Box<dyn Step>) -> Result<ExplodeIndexStep, AbiError> {
        let schema = previous.schema().with_columns(
            vec![Column::new(EXPLODE_INDEX_COLUMN, DataType::UInt16)],
            false,
        )?;
        Ok(ExplodeIndexStep { previous, schema })
    }
}

impl Step for ExplodeIndexStep {
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
            |_item, mut rows| {
                for (index, row) in rows.iter_mut().enumerate() {
                    row.insert(EXPLODE_INDEX_COLUMN.to_string(), Value::from(index));
                }
                Ok(rows)
            },
        )
    }
}
