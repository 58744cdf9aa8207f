//! The pipeline step contract and row finalization

use serde_json::Value;

use crate::block::{EthBlock, EthTransaction};
use crate::error::TransformError;
use crate::schema::{Row, Schema};
use crate::transform::item::TransformItem;

/// Reserved column that carries an item's accumulated transform errors.
/// The base finalization writes it whenever the schema includes it, which
/// is done by ending a pipeline with the transform-error step.
pub const TRANSFORM_ERROR_COLUMN: &str = "transform_error";

/// The rows produced for one item by the steps up to some point
#[derive(Debug)]
pub struct ItemRows<'a> {
    pub item: TransformItem<'a>,
    pub rows: Vec<Row>,
}

/// A step in the transform pipeline. Each step consumes the previous
/// step's per-item rows and owns the schema of everything produced so far.
pub trait Step: Send + Sync {
    /// The schema of all steps up to and including this one
    fn schema(&self) -> &Schema;

    /// Produce per-item row groups for one transaction
    fn inner_transform<'a>(
        &self,
        block: &'a EthBlock,
        transaction: &'a EthTransaction,
    ) -> Vec<ItemRows<'a>>;

    /// Run the pipeline and finalize rows against the schema: every column
    /// is populated by name, the reserved error column from the item's
    /// accumulated errors, everything else through its column transform.
    /// Per-column failures are recorded as transform errors, not raised.
    fn transform(&self, block: &EthBlock, transaction: &EthTransaction) -> Vec<Row> {
        let schema = self.schema();
        let mut results = Vec::new();

        for ItemRows { mut item, rows } in self.inner_transform(block, transaction) {
            for row in rows {
                let mut final_row = Row::with_capacity(schema.len());
                for column in schema.columns() {
                    if column.name == TRANSFORM_ERROR_COLUMN {
                        let error = item
                            .transform_error()
                            .map(Value::String)
                            .unwrap_or(Value::Null);
                        final_row.insert(column.name.clone(), error);
                        continue;
                    }

                    match column.extract(&row) {
                        Ok(value) => {
                            final_row.insert(column.name.clone(), value);
                        }
                        Err(error) => {
                            // keep writing the remaining columns for the row
                            item.add_transform_error(error);
                        }
                    }
                }
                results.push(final_row);
            }
        }

        results
    }
}

/// Shared propagation for steps that follow another step: run the previous
/// step, skip items already carrying an error, and catch this step's
/// per-item failures onto the item while passing its rows through
/// unchanged.
pub(crate) fn propagate<'a>(
    previous: &dyn Step,
    block: &'a EthBlock,
    transaction: &'a EthTransaction,
    should_transform: bool,
    mut transform_item: impl FnMut(
        &mut TransformItem<'a>,
        Vec<Row>,
    ) -> Result<Vec<Row>, TransformError>,
) -> Vec<ItemRows<'a>> {
    let previous_results = previous.inner_transform(block, transaction);
    if !should_transform {
        return previous_results;
    }

    previous_results
        .into_iter()
        .map(|ItemRows { mut item, rows }| {
            if item.has_transform_error() {
                return ItemRows { item, rows };
            }

            match transform_item(&mut item, rows.clone()) {
                Ok(new_rows) => ItemRows {
                    item,
                    rows: new_rows,
                },
                Err(error) => {
                    log::debug!(
                        "transform error in transaction {}: {error}",
                        transaction.hash()
                    );
                    item.add_transform_error(&error);
                    ItemRows { item, rows }
                }
            }
        })
        .collect()
}
