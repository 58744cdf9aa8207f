//! ABI events and functions with their signatures, hashes, and decoders

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::keccak256;
use serde_json::Value;

use crate::abi::decoded::DecodedTuple;
use crate::abi::parameter::Parameters;
use crate::block::EthLog;
use crate::convert::strip_hex_prefix;
use crate::error::{AbiError, TransformError};

/// The `type` field of an ABI item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Event,
    Function,
    Constructor,
    Fallback,
    Receive,
    Error,
}

impl ItemKind {
    pub fn parse(kind: &str) -> Result<ItemKind, AbiError> {
        match kind {
            "event" => Ok(ItemKind::Event),
            "function" => Ok(ItemKind::Function),
            "constructor" => Ok(ItemKind::Constructor),
            "fallback" => Ok(ItemKind::Fallback),
            "receive" => Ok(ItemKind::Receive),
            "error" => Ok(ItemKind::Error),
            other => Err(AbiError::Invalid(format!("Unknown ABI item type {other}"))),
        }
    }

    pub fn is_function_kind(&self) -> bool {
        matches!(
            self,
            ItemKind::Function | ItemKind::Constructor | ItemKind::Fallback | ItemKind::Receive
        )
    }
}

/// An event declared in an ABI
#[derive(Debug, Clone)]
pub struct AbiEvent {
    pub name: String,
    pub inputs: Parameters,
    /// `name(type,type,...)` derived from the input signatures
    pub signature: String,
    /// Full keccak-256 of the signature, lowercase hex without `0x`
    pub hash: String,
    /// Extra metadata used to disambiguate hash collisions, such as
    /// `{"standard": "Erc721"}`
    pub extra: Option<Value>,
}

impl AbiEvent {
    pub fn from_json(item_json: &Value) -> Result<AbiEvent, AbiError> {
        let name = item_name(item_json)?;
        let inputs = Parameters::from_json(required(item_json, "inputs", &name)?)?;
        let signature = item_signature(&name, &inputs);
        let hash = hex::encode(keccak256(signature.as_bytes()));

        Ok(AbiEvent {
            name,
            inputs,
            signature,
            hash,
            extra: item_json.get("extra").cloned(),
        })
    }

    pub fn num_indexed(&self) -> usize {
        self.inputs.parameters(Some(true)).len()
    }

    /// Whether a log is of this event, optionally also requiring the
    /// number of indexed parameters to line up with the topic count since
    /// colliding hashes only differ in indexed-ness
    pub fn is_of(&self, log: &EthLog, check_num_indexed: bool) -> bool {
        match log.topic0() {
            Some(topic) => {
                if strip_hex_prefix(topic) != self.hash {
                    return false;
                }
                !check_num_indexed || log.topics.len() - 1 == self.num_indexed()
            }
            None => false,
        }
    }

    /// Decode a log into a value tree. Indexed values come from the topics
    /// and unindexed values from the data blob; both are decoded
    /// independently and recombined in declaration order.
    pub fn decode(&self, log: &EthLog) -> Result<DecodedTuple, TransformError> {
        if log.topics.is_empty() {
            return Err(TransformError::decode("log has no topics"));
        }

        let indexed = self.inputs.parameters(Some(true));
        let unindexed = self.inputs.parameters(Some(false));

        let mut indexed_data = Vec::with_capacity((log.topics.len() - 1) * 32);
        for topic in &log.topics[1..] {
            let bytes = hex::decode(strip_hex_prefix(topic))
                .map_err(|e| TransformError::decode(format!("invalid topic hex: {e}")))?;
            indexed_data.extend(bytes);
        }
        let indexed_values = decode_values(&self.inputs.signatures(Some(true)), &indexed_data)?;

        let data = hex::decode(strip_hex_prefix(&log.data))
            .map_err(|e| TransformError::decode(format!("invalid log data hex: {e}")))?;
        let unindexed_values = decode_values(&self.inputs.signatures(Some(false)), &data)?;

        // reorder decoded values to match the declared parameter order
        let mut by_name: Vec<(&str, DynSolValue)> = indexed
            .iter()
            .map(|p| p.name())
            .zip(indexed_values)
            .chain(unindexed.iter().map(|p| p.name()).zip(unindexed_values))
            .collect();

        let all = self.inputs.parameters(None);
        let mut ordered = Vec::with_capacity(all.len());
        for parameter in &all {
            let position = by_name
                .iter()
                .position(|(name, _)| *name == parameter.name())
                .ok_or_else(|| {
                    TransformError::decode(format!("missing decoded value for '{}'", parameter.name()))
                })?;
            ordered.push(by_name.remove(position).1);
        }

        DecodedTuple::from_parameters_and_values(None, &all, ordered)
    }
}

/// A function declared in an ABI
#[derive(Debug, Clone)]
pub struct AbiFunction {
    pub name: String,
    pub inputs: Parameters,
    pub outputs: Parameters,
    pub signature: String,
    /// First 4 bytes (8 hex chars) of the keccak-256 of the signature
    pub hash: String,
    pub extra: Option<Value>,
}

impl AbiFunction {
    pub fn from_json(item_json: &Value) -> Result<AbiFunction, AbiError> {
        let name = item_name(item_json)?;
        let inputs = Parameters::from_json(required(item_json, "inputs", &name)?)?;
        let outputs = Parameters::from_json(required(item_json, "outputs", &name)?)?;
        let signature = item_signature(&name, &inputs);
        // functions only use the truncated selector hash
        let hash = hex::encode(keccak256(signature.as_bytes()))[..8].to_string();

        Ok(AbiFunction {
            name,
            inputs,
            outputs,
            signature,
            hash,
            extra: item_json.get("extra").cloned(),
        })
    }

    /// Decode call input, stripping the `0x` prefix and 4-byte selector
    pub fn decode(&self, input: &str) -> Result<DecodedTuple, TransformError> {
        let stripped = strip_hex_prefix(input);
        if stripped.len() < 8 {
            return Err(TransformError::decode(format!(
                "call input too short for a selector: {input}"
            )));
        }
        let data = hex::decode(&stripped[8..])
            .map_err(|e| TransformError::decode(format!("invalid call input hex: {e}")))?;

        let values = decode_values(&self.inputs.signatures(None), &data)?;
        DecodedTuple::from_parameters_and_values(None, &self.inputs.parameters(None), values)
    }

    /// Decode call output against the declared output parameters
    pub fn decode_output(&self, output: &str) -> Result<DecodedTuple, TransformError> {
        let data = hex::decode(strip_hex_prefix(output))
            .map_err(|e| TransformError::decode(format!("invalid call output hex: {e}")))?;

        let values = decode_values(&self.outputs.signatures(None), &data)?;
        DecodedTuple::from_parameters_and_values(None, &self.outputs.parameters(None), values)
    }
}

/// Decode a parameter list with the binary ABI primitive: parse the type
/// signatures, wrap them in a tuple, and split the decoded tuple back out.
fn decode_values(signatures: &[String], data: &[u8]) -> Result<Vec<DynSolValue>, TransformError> {
    if signatures.is_empty() {
        return Ok(Vec::new());
    }

    let types = signatures
        .iter()
        .map(|signature| {
            DynSolType::parse(signature).map_err(|e| {
                TransformError::decode(format!("failed to parse type '{signature}': {e}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let tuple_type = DynSolType::Tuple(types);
    let decoded = tuple_type
        .abi_decode(data)
        .map_err(|e| TransformError::decode(format!("failed to decode parameters: {e}")))?;

    match decoded {
        DynSolValue::Tuple(values) => Ok(values),
        other => Ok(vec![other]),
    }
}

fn item_name(item_json: &Value) -> Result<String, AbiError> {
    item_json
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AbiError::Invalid("ABI item is missing a name".to_string()))
}

fn required<'a>(item_json: &'a Value, key: &str, name: &str) -> Result<&'a Value, AbiError> {
    item_json
        .get(key)
        .ok_or_else(|| AbiError::Invalid(format!("ABI item '{name}' is missing '{key}'")))
}

fn item_signature(name: &str, inputs: &Parameters) -> String {
    format!("{}({})", name, inputs.signatures(None).join(","))
}
