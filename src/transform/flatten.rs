//! Flatten stage: one column per included parameter

use crate::block::{EthBlock, EthTransaction};
use crate::error::AbiError;
use crate::schema::Schema;
use crate::transform::flattener::{DefaultFlattenPredicate, ParameterFlattener};
use crate::transform::init::InitStep;
use crate::transform::step::{propagate, ItemRows, Step};

/// Appends every included (non-array, non-excluded) parameter of the item
/// to the schema and fills its value on each row from the decoded result
pub struct FlattenStep {
    previous: Box<dyn Step>,
    flattener: ParameterFlattener,
    schema: Schema,
}

impl FlattenStep {
    pub fn new(previous: InitStep) -> Result<FlattenStep, AbiError> {
        let flattener = ParameterFlattener::new(previous.item(), &DefaultFlattenPredicate);
        let schema = previous
            .schema()
            .with_columns(flattener.columns()?, false)?;

        Ok(FlattenStep {
            previous: Box::new(previous),
            flattener,
            schema,
        })
    }

    /// Chain after an arbitrary previous step (the default pipeline puts
    /// this after the default-columns stage)
    pub fn chain(
        previous: Box<dyn Step>,
        item: &crate::abi::semantic::SemanticAbiItem,
    ) -> Result<FlattenStep, AbiError> {
        let flattener = ParameterFlattener::new(item, &DefaultFlattenPredicate);
        let schema = previous
            .schema()
            .with_columns(flattener.columns()?, false)?;

        Ok(FlattenStep {
            previous,
            flattener,
            schema,
        })
    }
}

impl Step for FlattenStep {
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
                let decoded = item.decoded_result()?;
                for row in &mut rows {
                    for parameter in self.flattener.parameters() {
                        row.insert(
                            parameter.final_column_name().to_string(),
                            parameter.flattened_value(decoded)?,
                        );
                    }
                }
                Ok(rows)
            },
        )
    }
}
