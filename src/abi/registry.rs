//! Plain ABI registry: events and functions keyed by signature hash

use std::collections::HashMap;

use serde_json::Value;

use crate::abi::decoded::DecodedTuple;
use crate::abi::item::{AbiEvent, AbiFunction, ItemKind};
use crate::block::{EthLog, EthTrace};
use crate::convert::strip_hex_prefix;
use crate::error::{AbiError, TransformError};

/// A parsed contract ABI used for decoding logs and traces. Events are
/// grouped into lists per hash since signatures that differ only in
/// indexed-ness collide; functions use a truncated hash and collisions are
/// not handled.
#[derive(Debug, Clone)]
pub struct Abi {
    pub name: String,
    events: HashMap<String, Vec<AbiEvent>>,
    functions: HashMap<String, AbiFunction>,
}

/// A log matched to its event with the decoded value tree
#[derive(Debug)]
pub struct DecodedLog<'a> {
    pub event: &'a AbiEvent,
    pub data: DecodedTuple,
}

/// A trace matched to its function with decoded input and, when the trace
/// carries one, decoded output
#[derive(Debug)]
pub struct DecodedTrace<'a> {
    pub function: &'a AbiFunction,
    pub input: DecodedTuple,
    pub output: Option<DecodedTuple>,
}

impl Abi {
    pub fn new(name: impl Into<String>, abi_json: &Value) -> Result<Abi, AbiError> {
        let items = abi_json
            .as_array()
            .ok_or_else(|| AbiError::Invalid("ABI must be an array of items".to_string()))?;

        let mut events: HashMap<String, Vec<AbiEvent>> = HashMap::new();
        let mut functions = HashMap::new();

        for item in items {
            // skip if there are no inputs
            if item.get("inputs").is_none() {
                continue;
            }

            match item.get("type").and_then(Value::as_str) {
                Some("event") => {
                    let event = AbiEvent::from_json(item)?;
                    events.entry(event.hash.clone()).or_default().push(event);
                }
                Some("function") => {
                    let function = AbiFunction::from_json(item)?;
                    functions.insert(function.hash.clone(), function);
                }
                _ => {}
            }
        }

        Ok(Abi {
            name: name.into(),
            events,
            functions,
        })
    }

    pub fn function_by_name(&self, name: &str) -> Option<&AbiFunction> {
        self.functions.values().find(|f| f.name == name)
    }

    /// Decode a log against the registered events. `Ok(None)` when the log
    /// has no topics or no event resolves; colliding hashes are narrowed by
    /// the log's indexed topic count.
    pub fn decode_log<'a>(&'a self, log: &EthLog) -> Result<Option<DecodedLog<'a>>, TransformError> {
        let Some(topic) = log.topic0() else {
            return Ok(None);
        };

        let candidates = match self.events.get(strip_hex_prefix(topic)) {
            Some(candidates) => candidates,
            None => return Ok(None),
        };

        let event = if candidates.len() == 1 {
            Some(&candidates[0])
        } else {
            candidates.iter().find(|candidate| candidate.is_of(log, true))
        };

        match event {
            Some(event) => Ok(Some(DecodedLog {
                event,
                data: event.decode(log)?,
            })),
            None => Ok(None),
        }
    }

    /// Decode a trace against the registered functions by its input
    /// selector. Output is decoded only when present and non-empty; a trace
    /// without output is simply not decoded, not an error.
    pub fn decode_trace<'a>(
        &'a self,
        trace: &EthTrace,
    ) -> Result<Option<DecodedTrace<'a>>, TransformError> {
        let Some(signature) = trace.signature() else {
            return Ok(None);
        };

        let function = match self.functions.get(strip_hex_prefix(signature)) {
            Some(function) => function,
            None => return Ok(None),
        };

        let input = trace
            .input
            .as_deref()
            .ok_or_else(|| TransformError::decode("trace has no input"))?;

        let output = match trace.output.as_deref() {
            // only valid and non-empty past the 0x prefix
            Some(output) if output.len() > 2 => Some(function.decode_output(output)?),
            _ => None,
        };

        Ok(Some(DecodedTrace {
            function,
            input: function.decode(input)?,
            output,
        }))
    }
}
