//! The `@matches` annotation: predicate joins against other decoded items

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::convert::value_to_f64;
use crate::error::{AbiError, TransformError};
use crate::schema::Row;

/// What kind of item a match joins against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Event,
    Function,
    /// The synthetic token-transfer source
    Transfer,
}

impl MatchKind {
    pub fn parse(kind: &str) -> Result<MatchKind, AbiError> {
        match kind {
            "event" => Ok(MatchKind::Event),
            "function" => Ok(MatchKind::Function),
            "transfer" => Ok(MatchKind::Transfer),
            other => Err(AbiError::Invalid(format!(
                "Invalid value for \"type\": {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MatchKind::Event => "event",
            MatchKind::Function => "function",
            MatchKind::Transfer => "transfer",
        }
    }
}

/// Constraint on how many candidate rows a match may resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCardinality {
    /// Exactly one
    OnlyOne,
    /// At least one; the only place rows multiply after explode
    Many,
    /// At most one; zero null-fills the matched columns
    OptionalOne,
}

impl MatchCardinality {
    pub fn parse(name: &str) -> Result<MatchCardinality, AbiError> {
        match name {
            "onlyOne" => Ok(MatchCardinality::OnlyOne),
            "many" => Ok(MatchCardinality::Many),
            "optionalOne" => Ok(MatchCardinality::OptionalOne),
            other => Err(AbiError::Invalid(format!(
                "Invalid value for \"assert\": {other}"
            ))),
        }
    }
}

/// A predicate evaluated between a source row and a candidate row
#[derive(Debug, Clone, PartialEq)]
pub enum MatchPredicate {
    /// Exact value equality between one source and one matched column
    Equal { source: String, matched: String },
    /// Matched value within `[lower, upper] * source value`
    Bound {
        source: String,
        matched: String,
        lower: Option<f64>,
        upper: Option<f64>,
    },
    /// Source value equals any of a set of matched columns
    InSet { source: String, matched: Vec<String> },
}

impl MatchPredicate {
    pub fn from_json(predicate_json: &Value) -> Result<MatchPredicate, AbiError> {
        let kind = predicate_json
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AbiError::Invalid("predicate requires a 'type'".to_string()))?;

        let source = |key: &str| -> Result<String, AbiError> {
            predicate_json
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| AbiError::Invalid(format!("predicate requires '{key}'")))
        };

        match kind {
            "equal" => Ok(MatchPredicate::Equal {
                source: source("source")?,
                matched: source("matched")?,
            }),
            "bound" => {
                let lower = predicate_json.get("lower").and_then(Value::as_f64);
                let upper = predicate_json.get("upper").and_then(Value::as_f64);
                if lower.is_none() && upper.is_none() {
                    return Err(AbiError::Invalid(
                        "Bound match must specify at least one of \"lower\" or \"upper\""
                            .to_string(),
                    ));
                }
                if let (Some(lower), Some(upper)) = (lower, upper) {
                    if lower > upper {
                        return Err(AbiError::Invalid(
                            "Bound match \"lower\" must be less than \"upper\"".to_string(),
                        ));
                    }
                }
                Ok(MatchPredicate::Bound {
                    source: source("source")?,
                    matched: source("matched")?,
                    lower,
                    upper,
                })
            }
            "in" => {
                let matched = predicate_json
                    .get("matched")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        AbiError::Invalid("'in' predicate requires a 'matched' array".to_string())
                    })?
                    .iter()
                    .map(|column| {
                        column.as_str().map(str::to_string).ok_or_else(|| {
                            AbiError::Invalid("'in' predicate columns must be strings".to_string())
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MatchPredicate::InSet {
                    source: source("source")?,
                    matched,
                })
            }
            other => Err(AbiError::Invalid(format!(
                "Unknown predicate type: {other}"
            ))),
        }
    }

    /// Whether the candidate row matches the source row
    pub fn matches(&self, source_row: &Row, matched_row: &Row) -> Result<bool, TransformError> {
        match self {
            MatchPredicate::Equal { source, matched } => {
                Ok(row_value(source_row, source) == row_value(matched_row, matched))
            }
            MatchPredicate::Bound {
                source,
                matched,
                lower,
                upper,
            } => {
                let source_value = value_to_f64(row_value(source_row, source))?;
                let matched_value = value_to_f64(row_value(matched_row, matched))?;

                if let Some(lower) = lower {
                    if matched_value < lower * source_value {
                        return Ok(false);
                    }
                }
                if let Some(upper) = upper {
                    if matched_value > upper * source_value {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            MatchPredicate::InSet { source, matched } => {
                let value = row_value(source_row, source);
                Ok(matched
                    .iter()
                    .any(|column| row_value(matched_row, column) == value))
            }
        }
    }

    /// Source-side columns this predicate reads
    pub fn source_columns(&self) -> Vec<&str> {
        match self {
            MatchPredicate::Equal { source, .. }
            | MatchPredicate::Bound { source, .. }
            | MatchPredicate::InSet { source, .. } => vec![source],
        }
    }

    /// Matched-side columns this predicate reads
    pub fn matched_columns(&self) -> Vec<&str> {
        match self {
            MatchPredicate::Equal { matched, .. } | MatchPredicate::Bound { matched, .. } => {
                vec![matched]
            }
            MatchPredicate::InSet { matched, .. } => {
                matched.iter().map(String::as_str).collect()
            }
        }
    }
}

const NULL: Value = Value::Null;

fn row_value<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL)
}

/// One configured match on a primary item
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Target signature; absent only for transfer matches
    pub signature: Option<String>,
    pub kind: MatchKind,
    pub prefix: String,
    pub cardinality: MatchCardinality,
    pub predicates: Vec<MatchPredicate>,
}

impl Match {
    pub fn from_json(match_json: &Value) -> Result<Match, AbiError> {
        let kind = MatchKind::parse(
            match_json
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| AbiError::Invalid("match requires a 'type'".to_string()))?,
        )?;
        let cardinality = MatchCardinality::parse(
            match_json
                .get("assert")
                .and_then(Value::as_str)
                .ok_or_else(|| AbiError::Invalid("match requires an 'assert'".to_string()))?,
        )?;
        let prefix = match_json
            .get("prefix")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AbiError::Invalid("match requires a 'prefix'".to_string()))?;
        let signature = match_json
            .get("signature")
            .and_then(Value::as_str)
            .map(str::to_string);

        if signature.is_none() && kind != MatchKind::Transfer {
            return Err(AbiError::Invalid(
                "Match must specify \"signature\" unless it is a \"transfer\" match".to_string(),
            ));
        }

        let predicates = match_json
            .get("predicates")
            .and_then(Value::as_array)
            .ok_or_else(|| AbiError::Invalid("match requires 'predicates'".to_string()))?
            .iter()
            .map(MatchPredicate::from_json)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Match {
            signature,
            kind,
            prefix,
            cardinality,
            predicates,
        })
    }

    /// The output column name with this match's prefix prepended
    pub fn prefixed_column_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }
}

/// The ordered list of matches on one item
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matches {
    pub matches: Vec<Match>,
}

impl Matches {
    pub fn from_json(matches_json: &Value) -> Result<Matches, AbiError> {
        let matches = matches_json
            .as_array()
            .ok_or_else(|| AbiError::Invalid("@matches must be an array".to_string()))?
            .iter()
            .map(Match::from_json)
            .collect::<Result<Vec<_>, _>>()?;

        let many_count = matches
            .iter()
            .filter(|m| m.cardinality == MatchCardinality::Many)
            .count();
        if many_count > 1 {
            return Err(AbiError::Invalid(
                "Cannot have multiple matches that assert \"many\"".to_string(),
            ));
        }

        let mut prefixes_by_signature: HashMap<&str, HashSet<&str>> = HashMap::new();
        for item_match in &matches {
            if let Some(signature) = &item_match.signature {
                let prefixes = prefixes_by_signature.entry(signature).or_default();
                if !prefixes.insert(&item_match.prefix) {
                    return Err(AbiError::Invalid(format!(
                        "Cannot have multiple matches of the same signature '{signature}' with the same prefix '{}'",
                        item_match.prefix
                    )));
                }
            }
        }

        Ok(Matches { matches })
    }
}
