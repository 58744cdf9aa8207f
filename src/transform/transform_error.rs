//! Reserved transform-error column

use crate::block::{EthBlock, EthTransaction};
use crate::error::AbiError;
use crate::schema::{Column, ColumnTransform, DataType, Schema};
use crate::transform::step::{ItemRows, Step, TRANSFORM_ERROR_COLUMN};

/// Appends the reserved error column to the schema. The value itself is
/// written by row finalization from the item's accumulated errors; this
/// stage only makes the column part of the output.
pub struct TransformErrorStep {
    previous: Box<dyn Step>,
    schema: Schema,
}

impl TransformErrorStep {
    pub fn new(previous: Box<dyn Step>) -> Result<TransformErrorStep, AbiError> {
        let schema = previous.schema().with_columns(
            vec![Column::with_transform(
                TRANSFORM_ERROR_COLUMN,
                DataType::String,
                ColumnTransform::ToString(None),
            )],
            false,
        )?;
        Ok(TransformErrorStep { previous, schema })
    }
}

impl Step for TransformErrorStep {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn inner_transform<'a>(
        &self,
        block: &'a EthBlock,
        transaction: &'a EthTransaction,
    ) -> Vec<ItemRows<'a>> {
        self.previous.inner_transform(block, transaction)
    }
}
