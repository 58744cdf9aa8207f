//! Walking a semantic parameter tree into flat output columns

use serde_json::Value;

use crate::abi::semantic::{
    DecodedResult, ParameterTransform, SemanticAbiItem, SemanticParameter,
};
use crate::convert::{hex_to_int, normalize_hex};
use crate::error::{AbiError, TransformError};
use crate::schema::{Column, DataType};

/// Decides which parameters a flattener includes. The default flattens
/// every non-array parameter; the explode stage swaps in a path-based
/// predicate.
pub trait FlattenPredicate {
    fn should_flatten(&self, parameter: &SemanticParameter, path: &[&SemanticParameter]) -> bool;
}

/// Flattens all non-array parameters; arrays are reserved for explode
pub struct DefaultFlattenPredicate;

impl FlattenPredicate for DefaultFlattenPredicate {
    fn should_flatten(&self, parameter: &SemanticParameter, _path: &[&SemanticParameter]) -> bool {
        !parameter.parameter.is_array()
    }
}

/// One step of a navigation path into the decoded tree
#[derive(Debug, Clone)]
pub struct PathEntry {
    pub name: String,
    pub is_array: bool,
}

/// A single output column derived from one (possibly nested) parameter,
/// with everything needed to build its schema column and extract values
#[derive(Debug, Clone)]
pub struct FlattenedParameter {
    /// Tuple ancestors on the way to the leaf
    pub path: Vec<PathEntry>,
    /// Leaf parameter name
    pub name: String,
    /// Leaf type signature, e.g. `uint256` or `address[]`
    pub signature: String,
    pub is_array: bool,
    pub transform: Option<ParameterTransform>,
    /// Underscore-joined path, the column name absent a rename
    pub raw_column_name: String,
    pub is_input: bool,
}

impl FlattenedParameter {
    /// The rename from the transform if present, else the joined path
    pub fn final_column_name(&self) -> &str {
        match &self.transform {
            Some(transform) => transform.name.as_deref().unwrap_or(&self.raw_column_name),
            None => &self.raw_column_name,
        }
    }

    /// Build the schema column: inferred from the primitive signature,
    /// then overridden by the transform's declared type if any
    pub fn column(&self) -> Result<Column, AbiError> {
        let name = self.final_column_name();
        let raw_column = build_column(&self.signature, self.is_array, &self.name, name)?;

        match self.transform.as_ref().and_then(|t| t.data_type) {
            None => Ok(raw_column),
            Some(data_type) => Ok(data_type.column(name, raw_column.transform)),
        }
    }

    /// Extract and convert this parameter's single value from a decoded
    /// result
    pub fn flattened_value(&self, decoded: &DecodedResult) -> Result<Value, TransformError> {
        let json = self.decoded_json(decoded);
        let value = self
            .navigate(json)
            .ok_or_else(|| self.missing_value_error())?;
        self.apply_transforms(value)
    }

    /// Extract this parameter's values across its containing array: one
    /// converted value per array element
    pub fn flattened_array(&self, decoded: &DecodedResult) -> Result<Vec<Value>, TransformError> {
        let json = self.decoded_json(decoded);

        let full_path = self.full_path();
        let array_index = full_path
            .iter()
            .position(|entry| entry.is_array)
            .ok_or_else(|| self.missing_value_error())?;

        // navigate to the array itself
        let mut current = json;
        for entry in &full_path[..=array_index] {
            current = current.get(&entry.name).ok_or_else(|| self.missing_value_error())?;
        }
        let elements = current
            .as_array()
            .ok_or_else(|| self.missing_value_error())?;

        // then the rest of the way within each element
        let rest = &full_path[array_index + 1..];
        elements
            .iter()
            .map(|element| {
                let mut current = element;
                for entry in rest {
                    current = current
                        .get(&entry.name)
                        .ok_or_else(|| self.missing_value_error())?;
                }
                self.apply_transforms(current)
            })
            .collect()
    }

    fn decoded_json<'a>(&self, decoded: &'a DecodedResult) -> &'a Value {
        if self.is_input {
            decoded.decoded_input_json()
        } else {
            decoded.decoded_output_json()
        }
    }

    fn full_path(&self) -> Vec<PathEntry> {
        let mut full = self.path.clone();
        full.push(PathEntry {
            name: self.name.clone(),
            is_array: self.is_array,
        });
        full
    }

    fn navigate<'a>(&self, json: &'a Value) -> Option<&'a Value> {
        let mut current = json;
        for entry in self.full_path() {
            current = current.get(&entry.name)?;
        }
        Some(current)
    }

    fn missing_value_error(&self) -> TransformError {
        let path: Vec<&str> = self
            .path
            .iter()
            .map(|entry| entry.name.as_str())
            .chain([self.name.as_str()])
            .collect();
        TransformError::transform(format!("Could not find value at path {}", path.join(".")))
    }

    /// Integer signatures convert hex to numbers, addresses normalize to
    /// lowercase, then the transform expression runs
    fn apply_transforms(&self, value: &Value) -> Result<Value, TransformError> {
        let mut value = if self.signature.starts_with("int") || self.signature.starts_with("uint")
        {
            hex_to_int(value)?
        } else if self.signature.starts_with("address") {
            match value {
                Value::String(s) => Value::String(normalize_hex(s)),
                other => other.clone(),
            }
        } else {
            value.clone()
        };

        if let Some(transform) = &self.transform {
            value = transform.evaluate_expression(&value)?;
        }

        Ok(value)
    }
}

/// Derive the dataset column for a primitive signature
fn build_column(
    signature: &str,
    is_array: bool,
    parameter_name: &str,
    column_name: &str,
) -> Result<Column, AbiError> {
    // arrays carry the element type
    let primitive = if is_array {
        signature.trim_end_matches("[]")
    } else {
        signature
    };

    let column = if primitive == "bool" {
        Column::new(column_name, DataType::Boolean)
    } else if primitive == "address" {
        Column::hash_string(column_name)
    } else if primitive == "string" || primitive.starts_with("bytes") {
        Column::new(column_name, DataType::String)
    } else if let Some(size) = primitive.strip_prefix("uint") {
        let size: u32 = if size.is_empty() {
            256
        } else {
            size.parse().map_err(|_| unsupported(primitive, parameter_name))?
        };
        match size {
            // past 64 bits values are coerced into strings anyway
            s if s > 64 => Column::new(column_name, DataType::Int256),
            s if s > 32 => Column::new(column_name, DataType::UInt64),
            s if s > 16 => Column::new(column_name, DataType::UInt32),
            s if s > 8 => Column::new(column_name, DataType::UInt16),
            _ => Column::new(column_name, DataType::UInt8),
        }
    } else if let Some(size) = primitive.strip_prefix("int") {
        let size: u32 = if size.is_empty() {
            256
        } else {
            size.parse().map_err(|_| unsupported(primitive, parameter_name))?
        };
        match size {
            s if s > 128 => Column::new(column_name, DataType::Int256),
            s if s > 64 => Column::new(column_name, DataType::Int128),
            s if s > 32 => Column::new(column_name, DataType::Int64),
            s if s > 16 => Column::new(column_name, DataType::Int32),
            s if s > 8 => Column::new(column_name, DataType::Int16),
            _ => Column::new(column_name, DataType::Int8),
        }
    } else {
        return Err(unsupported(primitive, parameter_name));
    };

    Ok(column)
}

fn unsupported(kind: &str, name: &str) -> AbiError {
    AbiError::UnsupportedType {
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

/// Walks an item's parameters depth-first, producing the ordered list of
/// flattened parameters that pass the predicate. Tuples recurse with a
/// dotted name path; primitives become columns.
pub struct ParameterFlattener {
    parameters: Vec<FlattenedParameter>,
}

impl ParameterFlattener {
    pub fn new(item: &SemanticAbiItem, predicate: &dyn FlattenPredicate) -> ParameterFlattener {
        let mut parameters = Vec::new();

        let mut path: Vec<&SemanticParameter> = Vec::new();
        flatten_parameters(
            item.input_parameters().iter(),
            true,
            predicate,
            &mut path,
            &mut parameters,
        );
        if let Some(outputs) = item.output_parameters() {
            flatten_parameters(outputs.iter(), false, predicate, &mut path, &mut parameters);
        }

        ParameterFlattener { parameters }
    }

    pub fn parameters(&self) -> &[FlattenedParameter] {
        &self.parameters
    }

    /// The schema columns for all flattened parameters, in order
    pub fn columns(&self) -> Result<Vec<Column>, AbiError> {
        self.parameters
            .iter()
            .map(FlattenedParameter::column)
            .collect()
    }
}

fn flatten_parameters<'a>(
    parameters: impl Iterator<Item = &'a SemanticParameter>,
    is_input: bool,
    predicate: &dyn FlattenPredicate,
    path: &mut Vec<&'a SemanticParameter>,
    out: &mut Vec<FlattenedParameter>,
) {
    for parameter in parameters {
        if parameter.exclude {
            continue;
        }
        if !predicate.should_flatten(parameter, path) {
            continue;
        }

        match &parameter.components {
            Some(components) => {
                path.push(parameter);
                flatten_parameters(components.iter(), is_input, predicate, path, out);
                path.pop();
            }
            None => {
                let raw_column_name = path
                    .iter()
                    .map(|p| p.name())
                    .chain([parameter.name()])
                    .collect::<Vec<_>>()
                    .join("_");

                out.push(FlattenedParameter {
                    path: path
                        .iter()
                        .map(|p| PathEntry {
                            name: p.name().to_string(),
                            is_array: p.parameter.is_array(),
                        })
                        .collect(),
                    name: parameter.name().to_string(),
                    signature: parameter.parameter.signature(),
                    is_array: parameter.parameter.is_array(),
                    transform: parameter.transform.clone(),
                    raw_column_name,
                    is_input,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::semantic::SemanticAbiItem;
    use serde_json::json;

    fn seaport_like_item() -> SemanticAbiItem {
        SemanticAbiItem::function_from_json(&json!({
            "type": "function",
            "name": "fulfill",
            "@isPrimary": true,
            "inputs": [
                {"name": "order", "type": "tuple", "components": [
                    {"name": "offerer", "type": "address"},
                    {"name": "salt", "type": "uint256", "@exclude": true},
                    {"name": "amounts", "type": "uint256[]"}
                ]},
                {"name": "recipient", "type": "address"}
            ],
            "outputs": [
                {"name": "fulfilled", "type": "bool"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_default_flatten_skips_arrays_and_excluded() {
        let item = seaport_like_item();
        let flattener = ParameterFlattener::new(&item, &DefaultFlattenPredicate);

        let names: Vec<&str> = flattener
            .parameters()
            .iter()
            .map(FlattenedParameter::final_column_name)
            .collect();
        assert_eq!(names, vec!["order_offerer", "recipient", "fulfilled"]);

        let columns = flattener.columns().unwrap();
        assert_eq!(columns[0].data_type, DataType::String);
        assert_eq!(columns[2].data_type, DataType::Boolean);
    }

    #[test]
    fn test_column_type_inference() {
        assert_eq!(
            build_column("uint256", false, "v", "v").unwrap().data_type,
            DataType::Int256
        );
        assert_eq!(
            build_column("uint32", false, "v", "v").unwrap().data_type,
            DataType::UInt32
        );
        assert_eq!(
            build_column("int64", false, "v", "v").unwrap().data_type,
            DataType::Int64
        );
        assert_eq!(
            build_column("uint256[]", true, "v", "v").unwrap().data_type,
            DataType::Int256
        );
        assert_eq!(
            build_column("bytes32", false, "v", "v").unwrap().data_type,
            DataType::String
        );
        assert!(build_column("fixed128x18", false, "v", "v").is_err());
    }

    #[test]
    fn test_flattened_value_navigation_and_conversion() {
        let item = SemanticAbiItem::event_from_json(&json!({
            "type": "event",
            "name": "Ping",
            "@isPrimary": true,
            "inputs": [
                {"name": "inner", "type": "tuple", "components": [
                    {"name": "who", "type": "address"},
                    {"name": "value", "type": "uint256"}
                ]}
            ]
        }))
        .unwrap();
        let flattener = ParameterFlattener::new(&item, &DefaultFlattenPredicate);

        // a decoded tree whose wide value stayed hex
        let log = crate::block::EthLog {
            address: "0x1".to_string(),
            topics: vec![format!("0x{}", item.hash())],
            data: format!(
                "0x{:0>64}{:0>64}",
                "AB".repeat(20),
                "10000000000000000000000000000000"
            ),
            ..crate::block::EthLog::default()
        };
        let decoded = item.decode_log(&log).unwrap();

        let who = &flattener.parameters()[0];
        assert_eq!(
            who.flattened_value(&decoded).unwrap(),
            json!(format!("0x{}", "ab".repeat(20)))
        );

        let value = &flattener.parameters()[1];
        assert_eq!(
            value.flattened_value(&decoded).unwrap(),
            json!("21267647932558653966460912964485513216")
        );
    }

    #[test]
    fn test_missing_path_errors() {
        let item = seaport_like_item();
        let flattener = ParameterFlattener::new(&item, &DefaultFlattenPredicate);

        // outputs absent: fulfilled cannot be found
        let decoded = DecodedResult::new(
            crate::abi::DecodedTuple {
                name: None,
                components: vec![],
            },
            None,
        );
        let fulfilled = flattener
            .parameters()
            .iter()
            .find(|p| p.final_column_name() == "fulfilled")
            .unwrap();
        assert!(fulfilled.flattened_value(&decoded).is_err());
    }

    #[test]
    fn test_transform_rename_and_expression() {
        let item = SemanticAbiItem::event_from_json(&json!({
            "type": "event",
            "name": "Ping",
            "@isPrimary": true,
            "inputs": [
                {"name": "value", "type": "uint256", "@transform": {
                    "name": "eth", "type": "double", "expression": "this / 1e18"
                }}
            ]
        }))
        .unwrap();
        let flattener = ParameterFlattener::new(&item, &DefaultFlattenPredicate);

        let parameter = &flattener.parameters()[0];
        assert_eq!(parameter.final_column_name(), "eth");
        assert_eq!(
            flattener.columns().unwrap()[0].data_type,
            DataType::Float64
        );

        let log = crate::block::EthLog {
            address: "0x1".to_string(),
            topics: vec![format!("0x{}", item.hash())],
            data: format!("0x{:0>64}", "1bc16d674ec80000"), // 2 eth in wei
            ..crate::block::EthLog::default()
        };
        let decoded = item.decode_log(&log).unwrap();
        assert_eq!(parameter.flattened_value(&decoded).unwrap(), json!(2));
    }
}
