//! The top-level transformer: one pipeline per primary item, one union
//! schema, one flat row set per block

use std::sync::Arc;

use serde_json::Value;

use crate::abi::semantic::{SemanticAbi, SemanticAbiItem};
use crate::block::EthBlock;
use crate::chain::EvmChain;
use crate::error::AbiError;
use crate::schema::{Row, Schema};
use crate::transform::default_columns::DefaultColumnsStep;
use crate::transform::explode::ExplodeStep;
use crate::transform::explode_index::ExplodeIndexStep;
use crate::transform::flatten::FlattenStep;
use crate::transform::init::InitStep;
use crate::transform::matches::{MatchSources, MatchStep};
use crate::transform::step::Step;
use crate::transform::transform_error::TransformErrorStep;

/// Built once from a semantic ABI document, then applied to any number of
/// blocks. Construction runs every validation and agrees on the union
/// schema before any data is processed; configuration defects never make
/// it past this point.
pub struct SemanticTransformer {
    abi: Arc<SemanticAbi>,
    pipelines: Vec<Pipeline>,
    schema: Schema,
}

struct Pipeline {
    hash: String,
    step: Box<dyn Step>,
}

impl SemanticTransformer {
    pub fn from_json(abi_json: &Value) -> Result<SemanticTransformer, AbiError> {
        let abi = Arc::new(SemanticAbi::from_json(abi_json)?);
        let primary_items = abi.primary_items();
        let sources = MatchSources::from_abi(&abi, &primary_items)?;

        let mut pipelines = Vec::with_capacity(primary_items.len());
        for item in &primary_items {
            pipelines.push(Pipeline {
                hash: item.hash().to_string(),
                step: build_pipeline(&abi, item, &sources)?,
            });
        }

        // pipelines agree on one union schema, lenient across siblings
        let mut schema = Schema::new();
        for pipeline in &pipelines {
            schema = schema.with_columns(pipeline.step.schema().columns().to_vec(), true)?;
        }

        Ok(SemanticTransformer {
            abi,
            pipelines,
            schema,
        })
    }

    pub fn from_str(text: &str) -> Result<SemanticTransformer, AbiError> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| AbiError::Invalid(format!("malformed ABI document: {e}")))?;
        SemanticTransformer::from_json(&document)
    }

    /// The deterministic union schema across all primary items; column
    /// order is first-declaration order in pipeline order
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn abi(&self) -> &Arc<SemanticAbi> {
        &self.abi
    }

    /// Does this ABI apply to the given chain?
    pub fn is_valid_for_chain(&self, chain: EvmChain) -> bool {
        self.abi.chains.contains(&chain)
    }

    /// Transform every transaction of a block into rows, transaction by
    /// transaction with pipelines applied in registry order. Each row
    /// carries every union-schema column, null-padded where its pipeline
    /// did not produce the column.
    pub fn transform(&self, block: &EthBlock) -> Vec<Row> {
        let mut results = Vec::new();

        if !self.is_valid_for_chain(block.chain) {
            return results;
        }

        for transaction in &block.transactions {
            for pipeline in &self.pipelines {
                if !transaction.has_topic(&pipeline.hash) {
                    continue;
                }

                let mut rows = pipeline.step.transform(block, transaction);
                for row in &mut rows {
                    for column in self.schema.columns() {
                        if !row.contains_key(&column.name) {
                            row.insert(column.name.clone(), Value::Null);
                        }
                    }
                }
                results.append(&mut rows);
            }
        }

        results
    }
}

/// The fixed stage order for one primary item
fn build_pipeline(
    abi: &Arc<SemanticAbi>,
    item: &Arc<SemanticAbiItem>,
    sources: &MatchSources,
) -> Result<Box<dyn Step>, AbiError> {
    let init = InitStep::new(abi.clone(), item.clone());
    let default_columns = DefaultColumnsStep::new(Box::new(init))?;
    let flatten = FlattenStep::chain(Box::new(default_columns), item)?;
    let explode = ExplodeStep::new(Box::new(flatten), item)?;

    let matches_and_steps = match &item.properties().matches {
        Some(matches) => sources.steps_for(matches)?,
        None => Vec::new(),
    };
    let match_step = MatchStep::new(Box::new(explode), matches_and_steps)?;

    let explode_index = ExplodeIndexStep::new(Box::new(match_step))?;
    let transform_error = TransformErrorStep::new(Box::new(explode_index))?;
    Ok(Box::new(transform_error))
}
