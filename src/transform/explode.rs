//! Explode stage: one row per element of the configured array paths

use crate::abi::semantic::{SemanticAbiItem, SemanticParameter};
use crate::block::{EthBlock, EthTransaction};
use crate::error::{AbiError, TransformError};
use crate::schema::Schema;
use crate::transform::flattener::{FlattenPredicate, ParameterFlattener};
use crate::transform::step::{propagate, ItemRows, Step};

/// Includes a parameter iff its full path lies on one of the explode
/// paths: a prefix of the path, the path itself, or a non-array component
/// below it (nested arrays would multiply combinatorially and are cut off)
pub struct ExplodeFlattenPredicate {
    explode_paths: Vec<Vec<String>>,
}

impl ExplodeFlattenPredicate {
    pub fn new(explode_paths: Vec<Vec<String>>) -> ExplodeFlattenPredicate {
        ExplodeFlattenPredicate { explode_paths }
    }
}

impl FlattenPredicate for ExplodeFlattenPredicate {
    fn should_flatten(&self, parameter: &SemanticParameter, path: &[&SemanticParameter]) -> bool {
        for parts in &self.explode_paths {
            let mut path_matches = true;
            for (i, path_parameter) in path.iter().copied().chain([parameter]).enumerate() {
                if i >= parts.len() {
                    // below the explode path: components of an exploded
                    // tuple are included unless they are arrays themselves
                    if path_parameter.parameter.is_array() {
                        path_matches = false;
                        break;
                    }
                } else if parts[i] != path_parameter.name() {
                    path_matches = false;
                    break;
                }
            }
            if path_matches {
                return true;
            }
        }
        false
    }
}

/// Explodes the configured array parameters into one row per element. All
/// exploded arrays of an item must agree on their length; the arrays are
/// transposed and merged over the single input row.
pub struct ExplodeStep {
    previous: Box<dyn Step>,
    flattener: ParameterFlattener,
    schema: Schema,
    active: bool,
}

impl ExplodeStep {
    pub fn new(previous: Box<dyn Step>, item: &SemanticAbiItem) -> Result<ExplodeStep, AbiError> {
        let explode_paths = item
            .properties()
            .explode
            .as_ref()
            .map(|explode| explode.path_parts())
            .unwrap_or_default();
        let active = !explode_paths.is_empty();

        let flattener =
            ParameterFlattener::new(item, &ExplodeFlattenPredicate::new(explode_paths));
        let schema = previous
            .schema()
            .with_columns(flattener.columns()?, false)?;

        Ok(ExplodeStep {
            previous,
            flattener,
            schema,
            active,
        })
    }
}

impl Step for ExplodeStep {
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
            self.active,
            |item, rows| {
                // explode runs before anything that multiplies rows
                if rows.len() > 1 {
                    return Err(TransformError::transform(
                        "Can only explode a single row of data",
                    ));
                }

                let decoded = item.decoded_result()?;
                let parameters = self.flattener.parameters();

                let mut new_rows = Vec::new();
                for row in rows {
                    let mut flattened_arrays: Vec<Vec<serde_json::Value>> = Vec::new();
                    let mut array_length: Option<usize> = None;

                    for parameter in parameters {
                        let flattened = parameter.flattened_array(decoded)?;
                        match array_length {
                            None => array_length = Some(flattened.len()),
                            Some(expected) if expected != flattened.len() => {
                                return Err(TransformError::transform(format!(
                                    "Parameter '{}' has a different number of elements than the other exploded parameters",
                                    parameter.final_column_name()
                                )));
                            }
                            Some(_) => {}
                        }
                        flattened_arrays.push(flattened);
                    }

                    // transpose: one output row per element index
                    for element in 0..array_length.unwrap_or(0) {
                        let mut new_row = row.clone();
                        for (parameter, values) in parameters.iter().zip(&flattened_arrays) {
                            new_row.insert(
                                parameter.final_column_name().to_string(),
                                values[element].clone(),
                            );
                        }
                        new_rows.push(new_row);
                    }
                }

                Ok(new_rows)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::semantic::SemanticAbi;
    use crate::chain::EvmChain;
    use crate::transform::flatten::FlattenStep;
    use crate::transform::init::InitStep;
    use serde_json::json;
    use std::sync::Arc;

    fn batch_abi(paths: &[&str]) -> Arc<SemanticAbi> {
        Arc::new(
            SemanticAbi::from_json(&json!({
                "metadata": {"chains": ["ethereum"]},
                "abi": [{
                    "type": "event",
                    "name": "Batch",
                    "@isPrimary": true,
                    "@explode": {"paths": paths},
                    "inputs": [
                        {"name": "operator", "type": "address", "indexed": true},
                        {"name": "ids", "type": "uint256[]"},
                        {"name": "amounts", "type": "uint256[]"}
                    ]
                }]
            }))
            .unwrap(),
        )
    }

    fn batch_block(abi: &SemanticAbi, ids: &[&str], amounts: &[&str]) -> EthBlock {
        let hash = abi.primary_items()[0].hash().to_string();

        let mut data = "0x".to_string();
        let ids_offset = 0x40;
        let amounts_offset = ids_offset + 0x20 * (1 + ids.len());
        data.push_str(&format!("{ids_offset:0>64x}"));
        data.push_str(&format!("{amounts_offset:0>64x}"));
        data.push_str(&format!("{:0>64x}", ids.len()));
        for id in ids {
            data.push_str(&format!("{id:0>64}"));
        }
        data.push_str(&format!("{:0>64x}", amounts.len()));
        for amount in amounts {
            data.push_str(&format!("{amount:0>64}"));
        }

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
                        "address": "0xc0",
                        "topics": [format!("0x{hash}"), format!("0x{:0>64}", "99")],
                        "data": data,
                        "logIndex": "0x0"
                    }]
                }]
            }),
        )
        .unwrap()
    }

    fn pipeline(abi: &Arc<SemanticAbi>) -> ExplodeStep {
        let item = abi.primary_items()[0].clone();
        let init = InitStep::new(abi.clone(), item.clone());
        let flatten = FlattenStep::new(init).unwrap();
        ExplodeStep::new(Box::new(flatten), &item).unwrap()
    }

    #[test]
    fn test_explode_produces_one_row_per_element() {
        let abi = batch_abi(&["ids", "amounts"]);
        let block = batch_block(&abi, &["1", "2", "3"], &["a", "b", "c"]);
        let step = pipeline(&abi);

        let names: Vec<&str> = step
            .schema()
            .columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["operator", "ids", "amounts"]);

        let rows = step.transform(&block, &block.transactions[0]);
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row["ids"], json!(i + 1));
            assert_eq!(row["amounts"], json!(10 + i));
            // non-array fields replicate across exploded rows
            assert_eq!(
                row["operator"],
                json!("0x0000000000000000000000000000000000000099")
            );
        }
    }

    #[test]
    fn test_explode_length_mismatch_is_transform_error() {
        let abi = batch_abi(&["ids", "amounts"]);
        let block = batch_block(&abi, &["1", "2"], &["a"]);
        let step = pipeline(&abi);

        let results = step.inner_transform(&block, &block.transactions[0]);
        assert_eq!(results.len(), 1);
        assert!(results[0].item.has_transform_error());
        assert!(results[0]
            .item
            .transform_error()
            .unwrap()
            .contains("different number of elements"));
    }

    #[test]
    fn test_inactive_without_explode_paths() {
        let abi = Arc::new(
            SemanticAbi::from_json(&json!({
                "metadata": {"chains": ["ethereum"]},
                "abi": [{
                    "type": "event",
                    "name": "Plain",
                    "@isPrimary": true,
                    "inputs": [{"name": "value", "type": "uint256"}]
                }]
            }))
            .unwrap(),
        );
        let item = abi.primary_items()[0].clone();
        let init = InitStep::new(abi.clone(), item.clone());
        let flatten = FlattenStep::new(init).unwrap();
        let step = ExplodeStep::new(Box::new(flatten), &item).unwrap();

        // no explode paths: the predicate matches nothing, the schema is
        // unchanged
        assert_eq!(step.schema().len(), 1);
    }
}
