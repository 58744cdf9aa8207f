//! Match stage: predicate joins against other decoded items

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::abi::semantic::{Match, MatchCardinality, MatchKind, Matches, SemanticAbi, SemanticAbiItem};
use crate::block::{EthBlock, EthTransaction};
use crate::error::{AbiError, TransformError};
use crate::schema::{Row, Schema};
use crate::transform::flatten::FlattenStep;
use crate::transform::init::InitStep;
use crate::transform::step::{propagate, ItemRows, Step};
use crate::transform::token_transfer::TokenTransferStep;

/// Shared per-signature candidate pipelines. Multiple matches against the
/// same item reuse one Init→Flatten chain, which deliberately carries no
/// error or metadata columns of its own.
pub struct MatchSources {
    events: HashMap<String, Arc<dyn Step>>,
    functions: HashMap<String, Arc<dyn Step>>,
}

impl MatchSources {
    pub fn from_abi(
        abi: &Arc<SemanticAbi>,
        primary_items: &[Arc<SemanticAbiItem>],
    ) -> Result<MatchSources, AbiError> {
        let mut events: HashMap<String, Arc<dyn Step>> = HashMap::new();
        let mut functions: HashMap<String, Arc<dyn Step>> = HashMap::new();

        for item in primary_items {
            let Some(matches) = &item.properties().matches else {
                continue;
            };

            for item_match in &matches.matches {
                match item_match.kind {
                    MatchKind::Event => {
                        let signature = item_match.signature.clone().unwrap_or_default();
                        if !events.contains_key(&signature) {
                            let matched = abi.event_by_signature(&signature).ok_or_else(|| {
                                AbiError::Invalid(format!(
                                    "Unknown event signature to match: {signature}"
                                ))
                            })?;
                            events.insert(
                                signature,
                                Arc::new(FlattenStep::new(InitStep::new(
                                    abi.clone(),
                                    matched.clone(),
                                ))?),
                            );
                        }
                    }
                    MatchKind::Function => {
                        let signature = item_match.signature.clone().unwrap_or_default();
                        if !functions.contains_key(&signature) {
                            let matched =
                                abi.function_by_signature(&signature).ok_or_else(|| {
                                    AbiError::Invalid(format!(
                                        "Unknown function signature to match: {signature}"
                                    ))
                                })?;
                            functions.insert(
                                signature,
                                Arc::new(FlattenStep::new(InitStep::new(
                                    abi.clone(),
                                    matched.clone(),
                                ))?),
                            );
                        }
                    }
                    MatchKind::Transfer => {}
                }
            }
        }

        Ok(MatchSources { events, functions })
    }

    /// The (match, candidate source) pairs for one item's match list
    pub fn steps_for(&self, matches: &Matches) -> Result<Vec<(Match, Arc<dyn Step>)>, AbiError> {
        matches
            .matches
            .iter()
            .map(|item_match| {
                let step: Arc<dyn Step> = match item_match.kind {
                    MatchKind::Event => self
                        .events
                        .get(item_match.signature.as_deref().unwrap_or_default())
                        .ok_or_else(|| {
                            AbiError::Invalid(format!(
                                "Unknown event signature to match: {:?}",
                                item_match.signature
                            ))
                        })?
                        .clone(),
                    MatchKind::Function => self
                        .functions
                        .get(item_match.signature.as_deref().unwrap_or_default())
                        .ok_or_else(|| {
                            AbiError::Invalid(format!(
                                "Unknown function signature to match: {:?}",
                                item_match.signature
                            ))
                        })?
                        .clone(),
                    MatchKind::Transfer => Arc::new(TokenTransferStep::new()),
                };
                Ok((item_match.clone(), step))
            })
            .collect()
    }
}

/// Joins each current row against the candidate rows of every configured
/// match, in declaration order, enforcing the cardinality assertions
pub struct MatchStep {
    previous: Box<dyn Step>,
    matches_and_steps: Vec<(Match, Arc<dyn Step>)>,
    schema: Schema,
}

impl MatchStep {
    pub fn new(
        previous: Box<dyn Step>,
        matches_and_steps: Vec<(Match, Arc<dyn Step>)>,
    ) -> Result<MatchStep, AbiError> {
        let schema = MatchStep::build_schema(previous.schema(), &matches_and_steps)?;
        Ok(MatchStep {
            previous,
            matches_and_steps,
            schema,
        })
    }

    /// Merge every match's candidate schema under its prefix, after
    /// checking each predicate only references columns that exist on both
    /// sides. All of this runs before any data flows.
    fn build_schema(
        previous_schema: &Schema,
        matches_and_steps: &[(Match, Arc<dyn Step>)],
    ) -> Result<Schema, AbiError> {
        let mut schema = previous_schema.clone();
        for (item_match, step) in matches_and_steps {
            MatchStep::validate_predicates(item_match, &schema, step.schema())?;
            schema = schema.merge_schema(
                step.schema(),
                |name| item_match.prefixed_column_name(name),
                false,
            )?;
        }
        Ok(schema)
    }

    fn validate_predicates(
        item_match: &Match,
        source_schema: &Schema,
        matched_schema: &Schema,
    ) -> Result<(), AbiError> {
        for predicate in &item_match.predicates {
            for column in predicate.source_columns() {
                if !source_schema.has_column(column) {
                    return Err(AbiError::Invalid(format!(
                        "Unknown source column referenced in match predicate of prefix '{}': {column}",
                        item_match.prefix
                    )));
                }
            }
            for column in predicate.matched_columns() {
                if !matched_schema.has_column(column) {
                    return Err(AbiError::Invalid(format!(
                        "Unknown matched column referenced in match predicate of prefix '{}': {column}",
                        item_match.prefix
                    )));
                }
            }
        }
        Ok(())
    }

    fn handle_matches(
        row: &Row,
        matched_rows: Vec<&Row>,
        item_match: &Match,
        step: &dyn Step,
    ) -> Result<Vec<Row>, TransformError> {
        let mut updated = Vec::new();
        match item_match.cardinality {
            MatchCardinality::OnlyOne => {
                if matched_rows.is_empty() {
                    return Err(assert_error("No match found for 'onlyOne' match", item_match));
                }
                if matched_rows.len() > 1 {
                    return Err(assert_error(
                        "Multiple matches found for 'onlyOne' match",
                        item_match,
                    ));
                }
                let mut merged = row.clone();
                append_matched(&mut merged, matched_rows[0], item_match);
                updated.push(merged);
            }
            MatchCardinality::Many => {
                if matched_rows.is_empty() {
                    return Err(assert_error("No match found for 'many' match", item_match));
                }
                for matched_row in matched_rows {
                    let mut merged = row.clone();
                    append_matched(&mut merged, matched_row, item_match);
                    updated.push(merged);
                }
            }
            MatchCardinality::OptionalOne => {
                if matched_rows.len() > 1 {
                    return Err(assert_error(
                        "Multiple matches found for 'optionalOne' match",
                        item_match,
                    ));
                }
                let mut merged = row.clone();
                if let Some(matched_row) = matched_rows.first() {
                    append_matched(&mut merged, matched_row, item_match);
                } else {
                    // no match: null out every matched column under the prefix
                    for column in step.schema().columns() {
                        merged.insert(item_match.prefixed_column_name(&column.name), Value::Null);
                    }
                }
                updated.push(merged);
            }
        }
        Ok(updated)
    }
}

impl Step for MatchStep {
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
            !self.matches_and_steps.is_empty(),
            |_item, rows| {
                let mut current = rows;

                for (item_match, step) in &self.matches_and_steps {
                    // a many match multiplies rows, so it must start from one
                    if item_match.cardinality == MatchCardinality::Many && current.len() > 1 {
                        return Err(TransformError::transform(
                            "Only a single row of data can be matched with a 'many' match",
                        ));
                    }

                    // candidate rows are computed once per occurrence
                    let candidate_rows = step.transform(block, transaction);

                    let mut next = Vec::new();
                    for row in &current {
                        let mut matched_rows: Vec<&Row> = Vec::new();
                        for candidate in &candidate_rows {
                            let mut is_matched = true;
                            for predicate in &item_match.predicates {
                                if !predicate.matches(row, candidate)? {
                                    is_matched = false;
                                    break;
                                }
                            }
                            if is_matched {
                                matched_rows.push(candidate);
                            }
                        }

                        next.extend(MatchStep::handle_matches(
                            row,
                            matched_rows,
                            item_match,
                            step.as_ref(),
                        )?);
                    }

                    current = next;
                }

                Ok(current)
            },
        )
    }
}

fn append_matched(row: &mut Row, matched_row: &Row, item_match: &Match) {
    for (column, value) in matched_row {
        row.insert(item_match.prefixed_column_name(column), value.clone());
    }
}

fn assert_error(message: &str, item_match: &Match) -> TransformError {
    let mut error = format!("{message} of type '{}'", item_match.kind.name());
    if let Some(signature) = &item_match.signature {
        error.push_str(&format!(" with signature '{signature}'"));
    }
    TransformError::transform(error)
}
