//! Event and function parameters parsed from ABI JSON

use serde_json::Value;

use crate::error::AbiError;

/// A parameter in an event or function, or a component of a tuple parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    /// Primitive values like `address`, `uint256`, and strings
    Primitive {
        name: String,
        indexed: bool,
        /// Canonical Solidity type, e.g. `uint256` or `address[]`
        kind: String,
    },
    /// "Tuple" or struct parameter with ordered components
    Tuple {
        name: String,
        indexed: bool,
        array: bool,
        array_of_arrays: bool,
        components: Vec<Parameter>,
    },
}

impl Parameter {
    pub fn from_json(parameter_json: &Value) -> Result<Parameter, AbiError> {
        let name = parameter_json
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AbiError::Invalid("parameter is missing a name".to_string()))?;
        if name.is_empty() {
            return Err(AbiError::Invalid("Parameter name cannot be empty".to_string()));
        }

        let kind = parameter_json
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AbiError::Invalid(format!("parameter '{name}' is missing a type")))?;
        // test of existence and explicit equality to true
        let indexed = parameter_json.get("indexed").and_then(Value::as_bool) == Some(true);

        if matches!(kind, "tuple" | "tuple[]" | "tuple[][]") {
            let components_json = parameter_json
                .get("components")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    AbiError::Invalid(format!("tuple parameter '{name}' is missing components"))
                })?;
            let components = components_json
                .iter()
                .map(Parameter::from_json)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Parameter::Tuple {
                name: name.to_string(),
                indexed,
                array: kind.ends_with("[]"),
                array_of_arrays: kind.ends_with("[][]"),
                components,
            })
        } else {
            Ok(Parameter::Primitive {
                name: name.to_string(),
                indexed,
                kind: kind.to_string(),
            })
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Parameter::Primitive { name, .. } | Parameter::Tuple { name, .. } => name,
        }
    }

    pub fn is_indexed(&self) -> bool {
        match self {
            Parameter::Primitive { indexed, .. } | Parameter::Tuple { indexed, .. } => *indexed,
        }
    }

    pub fn is_array(&self) -> bool {
        match self {
            Parameter::Primitive { kind, .. } => kind.ends_with("[]"),
            Parameter::Tuple { array, .. } => *array,
        }
    }

    pub fn is_array_of_arrays(&self) -> bool {
        match self {
            Parameter::Primitive { kind, .. } => kind.ends_with("[][]"),
            Parameter::Tuple {
                array_of_arrays, ..
            } => *array_of_arrays,
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Parameter::Tuple { .. })
    }

    pub fn components(&self) -> Option<&[Parameter]> {
        match self {
            Parameter::Primitive { .. } => None,
            Parameter::Tuple { components, .. } => Some(components),
        }
    }

    /// Canonical type signature, e.g. `uint256` or `(address,uint256)[]`
    pub fn signature(&self) -> String {
        match self {
            Parameter::Primitive { kind, .. } => kind.clone(),
            Parameter::Tuple {
                array,
                array_of_arrays,
                components,
                ..
            } => {
                let inner: Vec<String> = components.iter().map(Parameter::signature).collect();
                let mut signature = format!("({})", inner.join(","));
                if *array {
                    signature.push_str("[]");
                }
                if *array_of_arrays {
                    signature.push_str("[]");
                }
                signature
            }
        }
    }
}

/// Ordered list of input or output parameters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Parameters {
    parameters: Vec<Parameter>,
}

impl Parameters {
    pub fn from_json(parameters_json: &Value) -> Result<Parameters, AbiError> {
        let elements = parameters_json
            .as_array()
            .ok_or_else(|| AbiError::Invalid("parameters must be an array".to_string()))?;
        let parameters = elements
            .iter()
            .map(Parameter::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Parameters { parameters })
    }

    /// All parameters, optionally filtered by indexed-ness
    pub fn parameters(&self, indexed: Option<bool>) -> Vec<&Parameter> {
        match indexed {
            None => self.parameters.iter().collect(),
            Some(indexed) => self
                .parameters
                .iter()
                .filter(|p| p.is_indexed() == indexed)
                .collect(),
        }
    }

    /// Type signatures for all parameters, optionally filtered by
    /// indexed-ness
    pub fn signatures(&self, indexed: Option<bool>) -> Vec<String> {
        self.parameters(indexed)
            .iter()
            .map(|p| p.signature())
            .collect()
    }

    pub fn as_slice(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
