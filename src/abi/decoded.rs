//! Decoded value trees mirroring the parameter shape

use alloy_dyn_abi::DynSolValue;
use serde_json::{Map, Value};

use crate::abi::parameter::Parameter;
use crate::error::TransformError;

/// A decoded node: a primitive leaf, a tuple, or an array of tuples. The
/// tree mirrors the item's parameter tree and is built fresh per decode.
#[derive(Debug, Clone)]
pub enum Decoded {
    Primitive(DecodedPrimitive),
    Tuple(DecodedTuple),
    TupleArray(DecodedTupleArray),
}

impl Decoded {
    fn add_to_json(&self, json_obj: &mut Map<String, Value>) {
        match self {
            Decoded::Primitive(primitive) => {
                json_obj.insert(primitive.name.clone(), primitive.value.clone());
            }
            Decoded::Tuple(tuple) => {
                let name = tuple
                    .name
                    .clone()
                    .expect("nested tuples always carry their parameter name");
                json_obj.insert(name, tuple.to_json());
            }
            Decoded::TupleArray(array) => {
                let values: Vec<Value> = array.values.iter().map(DecodedTuple::to_json).collect();
                json_obj.insert(array.name.clone(), Value::Array(values));
            }
        }
    }
}

/// Leaf node carrying one decoded, hex-normalized value
#[derive(Debug, Clone)]
pub struct DecodedPrimitive {
    pub name: String,
    pub value: Value,
}

/// Array-of-tuples node carrying fully decoded tuple instances
#[derive(Debug, Clone)]
pub struct DecodedTupleArray {
    pub name: String,
    pub values: Vec<DecodedTuple>,
}

/// Tuple node; the root tuple of a decode has no parameter name
#[derive(Debug, Clone)]
pub struct DecodedTuple {
    pub name: Option<String>,
    pub components: Vec<Decoded>,
}

impl DecodedTuple {
    /// Wrap raw decoded values into the tree shape dictated by the
    /// parameters. A single non-list value is treated as a one-element
    /// list, which happens for single-parameter outputs.
    pub fn from_parameters_and_values(
        root_parameter: Option<&Parameter>,
        parameters: &[&Parameter],
        decoded_values: Vec<DynSolValue>,
    ) -> Result<DecodedTuple, TransformError> {
        if parameters.len() != decoded_values.len() {
            return Err(TransformError::decode(format!(
                "expected {} decoded values, got {}",
                parameters.len(),
                decoded_values.len()
            )));
        }

        let mut components = Vec::with_capacity(parameters.len());
        for (parameter, value) in parameters.iter().zip(decoded_values) {
            components.push(Self::decode_component(parameter, value)?);
        }

        Ok(DecodedTuple {
            name: root_parameter.map(|p| p.name().to_string()),
            components,
        })
    }

    fn decode_component(parameter: &Parameter, value: DynSolValue) -> Result<Decoded, TransformError> {
        match parameter {
            Parameter::Tuple { components, .. } if parameter.is_array() => {
                let tuples = match value {
                    DynSolValue::Array(values) | DynSolValue::FixedArray(values) => values,
                    other => {
                        return Err(TransformError::decode(format!(
                            "expected array for parameter '{}', got {}",
                            parameter.name(),
                            describe(&other)
                        )))
                    }
                };

                let component_refs: Vec<&Parameter> = components.iter().collect();
                let values = tuples
                    .into_iter()
                    .map(|tuple_value| {
                        let inner = into_value_list(tuple_value);
                        DecodedTuple::from_parameters_and_values(
                            Some(parameter),
                            &component_refs,
                            inner,
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Decoded::TupleArray(DecodedTupleArray {
                    name: parameter.name().to_string(),
                    values,
                }))
            }
            Parameter::Tuple { components, .. } => {
                let component_refs: Vec<&Parameter> = components.iter().collect();
                let inner = into_value_list(value);
                Ok(Decoded::Tuple(DecodedTuple::from_parameters_and_values(
                    Some(parameter),
                    &component_refs,
                    inner,
                )?))
            }
            Parameter::Primitive { name, .. } => Ok(Decoded::Primitive(DecodedPrimitive {
                name: name.clone(),
                value: dyn_to_value(&value),
            })),
        }
    }

    /// Render the tree as a JSON object for path navigation
    pub fn to_json(&self) -> Value {
        let mut json_obj = Map::new();
        for component in &self.components {
            component.add_to_json(&mut json_obj);
        }
        Value::Object(json_obj)
    }
}

/// Convert a decoded primitive into its JSON rendering: addresses as
/// 0x-prefixed lowercase hex, byte values as bare hex, integers as numbers
/// when they fit 64 bits and strings otherwise.
pub fn dyn_to_value(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Address(address) => {
            Value::String(format!("0x{}", hex::encode(address.as_slice())))
        }
        DynSolValue::Function(function) => {
            Value::String(format!("0x{}", hex::encode(function.as_slice())))
        }
        DynSolValue::Uint(u, _) => match u64::try_from(*u) {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(format!("0x{u:x}")),
        },
        DynSolValue::Int(i, _) => match i.to_string().parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(i.to_string()),
        },
        DynSolValue::FixedBytes(word, size) => {
            Value::String(hex::encode(&word.as_slice()[..(*size).min(32)]))
        }
        DynSolValue::Bytes(bytes) => Value::String(hex::encode(bytes)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) => {
            Value::Array(values.iter().map(dyn_to_value).collect())
        }
        DynSolValue::Tuple(values) => Value::Array(values.iter().map(dyn_to_value).collect()),
    }
}

fn into_value_list(value: DynSolValue) -> Vec<DynSolValue> {
    match value {
        DynSolValue::Tuple(values) => values,
        other => vec![other],
    }
}

fn describe(value: &DynSolValue) -> &'static str {
    match value {
        DynSolValue::Bool(_) => "bool",
        DynSolValue::Int(..) => "int",
        DynSolValue::Uint(..) => "uint",
        DynSolValue::FixedBytes(..) => "fixed bytes",
        DynSolValue::Address(_) => "address",
        DynSolValue::Function(_) => "function",
        DynSolValue::Bytes(_) => "bytes",
        DynSolValue::String(_) => "string",
        DynSolValue::Array(_) => "array",
        DynSolValue::FixedArray(_) => "fixed array",
        DynSolValue::Tuple(_) => "tuple",
    }
}
