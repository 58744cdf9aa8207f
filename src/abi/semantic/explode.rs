//! The `@explode` annotation: array paths flattened into per-element rows

use serde_json::Value;

use crate::abi::semantic::parameter::{SemanticParameter, SemanticParameters};
use crate::error::AbiError;

/// Dot-separated paths naming the array parameters to explode row-wise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explode {
    pub paths: Vec<String>,
}

impl Explode {
    pub fn from_json(explode_json: &Value) -> Result<Explode, AbiError> {
        let paths = explode_json
            .get("paths")
            .and_then(Value::as_array)
            .ok_or_else(|| AbiError::Invalid("@explode requires a 'paths' array".to_string()))?
            .iter()
            .map(|path| {
                path.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| AbiError::Invalid("@explode paths must be strings".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Explode { paths })
    }

    /// Each path split into its parts
    pub fn path_parts(&self) -> Vec<Vec<String>> {
        self.paths
            .iter()
            .map(|path| path.split('.').map(str::to_string).collect())
            .collect()
    }

    /// Walk every path against the item's parameter sets and fail closed on
    /// anything explode cannot handle
    pub fn validate(&self, all_parameters: &[&SemanticParameters]) -> Result<(), AbiError> {
        for (path, parts) in self.paths.iter().zip(self.path_parts()) {
            // find the root parameter in the input or output parameters
            let mut parameter: Option<&SemanticParameter> = all_parameters
                .iter()
                .find_map(|parameters| parameters.parameter(&parts[0]));

            for part in &parts[1..] {
                let Some(current) = parameter else {
                    break;
                };

                if current.exclude {
                    return Err(AbiError::Invalid(format!(
                        "Explode path '{path}' cannot reference an excluded parameter: {part}"
                    )));
                }
                if current.parameter.is_array() {
                    return Err(AbiError::Invalid(format!(
                        "Explode path '{path}' does not support nested arrays: {part}"
                    )));
                }

                parameter = current
                    .components
                    .as_ref()
                    .and_then(|components| components.parameter(part));
            }

            let Some(leaf) = parameter else {
                return Err(AbiError::Invalid(format!(
                    "Explode path '{path}' not found in item parameters"
                )));
            };
            if !leaf.parameter.is_array() {
                return Err(AbiError::Invalid(format!(
                    "Explode path '{path}' is not an array"
                )));
            }
            if leaf.parameter.is_array_of_arrays() {
                return Err(AbiError::Invalid(format!(
                    "Explode path '{path}' does not support array of arrays"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::parameter::Parameters;
    use serde_json::json;

    fn parameters(json: &Value) -> SemanticParameters {
        let raw = Parameters::from_json(json).unwrap();
        SemanticParameters::from_parameters(raw.as_slice(), json).unwrap()
    }

    #[test]
    fn test_valid_array_path() {
        let params = parameters(&json!([
            {"name": "ids", "type": "uint256[]"}
        ]));
        let explode = Explode::from_json(&json!({"paths": ["ids"]})).unwrap();
        assert!(explode.validate(&[&params]).is_ok());
    }

    #[test]
    fn test_nested_tuple_array_path() {
        let params = parameters(&json!([
            {"name": "order", "type": "tuple", "components": [
                {"name": "amounts", "type": "uint256[]"}
            ]}
        ]));
        let explode = Explode::from_json(&json!({"paths": ["order.amounts"]})).unwrap();
        assert!(explode.validate(&[&params]).is_ok());
    }

    #[test]
    fn test_unknown_path_rejected() {
        let params = parameters(&json!([{"name": "ids", "type": "uint256[]"}]));
        let explode = Explode::from_json(&json!({"paths": ["missing"]})).unwrap();
        assert!(explode.validate(&[&params]).is_err());
    }

    #[test]
    fn test_non_array_leaf_rejected() {
        let params = parameters(&json!([{"name": "value", "type": "uint256"}]));
        let explode = Explode::from_json(&json!({"paths": ["value"]})).unwrap();
        assert!(explode.validate(&[&params]).is_err());
    }

    #[test]
    fn test_array_of_arrays_rejected() {
        let params = parameters(&json!([{"name": "grid", "type": "uint256[][]"}]));
        let explode = Explode::from_json(&json!({"paths": ["grid"]})).unwrap();
        assert!(explode.validate(&[&params]).is_err());
    }

    #[test]
    fn test_excluded_parameter_on_path_rejected() {
        let params = parameters(&json!([
            {"name": "order", "type": "tuple", "@exclude": true, "components": [
                {"name": "amounts", "type": "uint256[]"}
            ]}
        ]));
        let explode = Explode::from_json(&json!({"paths": ["order.amounts"]})).unwrap();
        assert!(explode.validate(&[&params]).is_err());
    }

    #[test]
    fn test_array_on_path_interior_rejected() {
        let params = parameters(&json!([
            {"name": "orders", "type": "tuple[]", "components": [
                {"name": "amounts", "type": "uint256[]"}
            ]}
        ]));
        let explode = Explode::from_json(&json!({"paths": ["orders.amounts"]})).unwrap();
        assert!(explode.validate(&[&params]).is_err());
    }
}
