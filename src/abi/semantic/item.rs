//! Semantic ABI items: raw events/functions plus their annotations

use std::sync::OnceLock;

use serde_json::{Map, Value};

use crate::abi::decoded::DecodedTuple;
use crate::abi::item::{AbiEvent, AbiFunction};
use crate::abi::semantic::explode::Explode;
use crate::abi::semantic::expressions::Expressions;
use crate::abi::semantic::matches::{MatchCardinality, Matches};
use crate::abi::semantic::parameter::SemanticParameters;
use crate::block::{EthLog, EthTrace};
use crate::error::{AbiError, TransformError};

const IS_PRIMARY_KEY: &str = "@isPrimary";
const EXPLODE_KEY: &str = "@explode";
const MATCHES_KEY: &str = "@matches";
const EXPRESSIONS_KEY: &str = "@expressions";

/// Per-item semantic properties. Only primary items, which produce rows,
/// may carry explode/match/expression annotations.
#[derive(Debug, Clone, Default)]
pub struct SemanticItemProperties {
    pub is_primary: bool,
    pub explode: Option<Explode>,
    pub matches: Option<Matches>,
    pub expressions: Option<Expressions>,
}

impl SemanticItemProperties {
    pub fn from_json(item_json: &Value) -> Result<SemanticItemProperties, AbiError> {
        let properties = SemanticItemProperties {
            is_primary: item_json.get(IS_PRIMARY_KEY).and_then(Value::as_bool) == Some(true),
            explode: item_json
                .get(EXPLODE_KEY)
                .map(Explode::from_json)
                .transpose()?,
            matches: item_json
                .get(MATCHES_KEY)
                .map(Matches::from_json)
                .transpose()?,
            expressions: item_json
                .get(EXPRESSIONS_KEY)
                .map(Expressions::from_json)
                .transpose()?,
        };

        if !properties.is_primary
            && (properties.explode.is_some()
                || properties.matches.is_some()
                || properties.expressions.is_some())
        {
            return Err(AbiError::Invalid(
                "Non-primary ABI item may not have \"explode\", \"matches\", or \"expressions\"."
                    .to_string(),
            ));
        }

        if properties.explode.is_some() {
            if let Some(matches) = &properties.matches {
                if matches
                    .matches
                    .iter()
                    .any(|m| m.cardinality == MatchCardinality::Many)
                {
                    return Err(AbiError::Invalid(
                        "Cannot have a match that asserts \"many\" and an explode on the same item."
                            .to_string(),
                    ));
                }
            }
        }

        Ok(properties)
    }
}

/// Result of decoding one occurrence of an item, with memoized JSON
/// projections of the value trees for path navigation
#[derive(Debug)]
pub struct DecodedResult {
    pub inputs: DecodedTuple,
    pub outputs: Option<DecodedTuple>,
    input_json: OnceLock<Value>,
    output_json: OnceLock<Value>,
}

impl DecodedResult {
    pub fn new(inputs: DecodedTuple, outputs: Option<DecodedTuple>) -> DecodedResult {
        DecodedResult {
            inputs,
            outputs,
            input_json: OnceLock::new(),
            output_json: OnceLock::new(),
        }
    }

    pub fn decoded_input_json(&self) -> &Value {
        self.input_json.get_or_init(|| self.inputs.to_json())
    }

    pub fn decoded_output_json(&self) -> &Value {
        self.output_json.get_or_init(|| match &self.outputs {
            Some(outputs) => outputs.to_json(),
            None => Value::Object(Map::new()),
        })
    }
}

/// An event with its semantic annotations
#[derive(Debug, Clone)]
pub struct SemanticAbiEvent {
    pub properties: SemanticItemProperties,
    pub input_parameters: SemanticParameters,
    pub event: AbiEvent,
}

/// A function with its semantic annotations over inputs and outputs
#[derive(Debug, Clone)]
pub struct SemanticAbiFunction {
    pub properties: SemanticItemProperties,
    pub input_parameters: SemanticParameters,
    pub output_parameters: SemanticParameters,
    pub function: AbiFunction,
}

/// Either kind of semantic item
#[derive(Debug, Clone)]
pub enum SemanticAbiItem {
    Event(SemanticAbiEvent),
    Function(SemanticAbiFunction),
}

impl SemanticAbiItem {
    pub fn event_from_json(item_json: &Value) -> Result<SemanticAbiItem, AbiError> {
        let event = AbiEvent::from_json(item_json)?;
        let properties = SemanticItemProperties::from_json(item_json)?;
        let input_parameters =
            SemanticParameters::from_parameters(event.inputs.as_slice(), &item_json["inputs"])?;

        let item = SemanticAbiItem::Event(SemanticAbiEvent {
            properties,
            input_parameters,
            event,
        });
        item.validate_explode()?;
        Ok(item)
    }

    pub fn function_from_json(item_json: &Value) -> Result<SemanticAbiItem, AbiError> {
        let function = AbiFunction::from_json(item_json)?;
        let properties = SemanticItemProperties::from_json(item_json)?;
        let input_parameters =
            SemanticParameters::from_parameters(function.inputs.as_slice(), &item_json["inputs"])?;
        let output_parameters = SemanticParameters::from_parameters(
            function.outputs.as_slice(),
            &item_json["outputs"],
        )?;

        // a flattened row holds inputs and outputs side by side, so top
        // level names may not repeat across the two
        let duplicates: Vec<&str> = input_parameters
            .names()
            .filter(|name| output_parameters.has_parameter(name))
            .collect();
        if !duplicates.is_empty() {
            return Err(AbiError::Invalid(format!(
                "Parameters are duplicated in inputs and outputs: {}",
                duplicates.join(", ")
            )));
        }

        let item = SemanticAbiItem::Function(SemanticAbiFunction {
            properties,
            input_parameters,
            output_parameters,
            function,
        });
        item.validate_explode()?;
        Ok(item)
    }

    fn validate_explode(&self) -> Result<(), AbiError> {
        if let Some(explode) = &self.properties().explode {
            explode.validate(&self.all_parameters())?;
        }
        Ok(())
    }

    pub fn properties(&self) -> &SemanticItemProperties {
        match self {
            SemanticAbiItem::Event(event) => &event.properties,
            SemanticAbiItem::Function(function) => &function.properties,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SemanticAbiItem::Event(event) => &event.event.name,
            SemanticAbiItem::Function(function) => &function.function.name,
        }
    }

    pub fn signature(&self) -> &str {
        match self {
            SemanticAbiItem::Event(event) => &event.event.signature,
            SemanticAbiItem::Function(function) => &function.function.signature,
        }
    }

    /// The lookup hash: full event topic or truncated function selector
    pub fn hash(&self) -> &str {
        match self {
            SemanticAbiItem::Event(event) => &event.event.hash,
            SemanticAbiItem::Function(function) => &function.function.hash,
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, SemanticAbiItem::Event(_))
    }

    pub fn input_parameters(&self) -> &SemanticParameters {
        match self {
            SemanticAbiItem::Event(event) => &event.input_parameters,
            SemanticAbiItem::Function(function) => &function.input_parameters,
        }
    }

    pub fn output_parameters(&self) -> Option<&SemanticParameters> {
        match self {
            SemanticAbiItem::Event(_) => None,
            SemanticAbiItem::Function(function) => Some(&function.output_parameters),
        }
    }

    pub fn all_parameters(&self) -> Vec<&SemanticParameters> {
        match self {
            SemanticAbiItem::Event(event) => vec![&event.input_parameters],
            SemanticAbiItem::Function(function) => {
                vec![&function.input_parameters, &function.output_parameters]
            }
        }
    }

    /// Decode a log occurrence of this item
    pub fn decode_log(&self, log: &EthLog) -> Result<DecodedResult, TransformError> {
        match self {
            SemanticAbiItem::Event(event) => {
                Ok(DecodedResult::new(event.event.decode(log)?, None))
            }
            SemanticAbiItem::Function(_) => {
                Err(TransformError::decode("can only decode logs with an event"))
            }
        }
    }

    /// Decode a trace occurrence of this item; output is decoded only when
    /// the trace carries one
    pub fn decode_trace(&self, trace: &EthTrace) -> Result<DecodedResult, TransformError> {
        match self {
            SemanticAbiItem::Event(_) => Err(TransformError::decode(
                "can only decode traces with a function",
            )),
            SemanticAbiItem::Function(function) => {
                let input = trace
                    .input
                    .as_deref()
                    .ok_or_else(|| TransformError::decode("trace has no input"))?;

                let outputs = match trace.output.as_deref() {
                    Some(output) if output.len() > 2 => {
                        Some(function.function.decode_output(output)?)
                    }
                    _ => None,
                };

                Ok(DecodedResult::new(
                    function.function.decode(input)?,
                    outputs,
                ))
            }
        }
    }
}
