//! Semantic annotations layered over raw parameters

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::abi::parameter::Parameter;
use crate::error::{AbiError, TransformError};
use crate::expression::Expression;
use crate::schema::{Column, ColumnTransform, DataType};

const TRANSFORM_KEY: &str = "@transform";
const EXCLUDE_KEY: &str = "@exclude";

/// Output type override in a parameter transform or table expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformDataType {
    Int,
    Double,
    String,
}

impl TransformDataType {
    pub fn parse(name: &str) -> Result<TransformDataType, AbiError> {
        match name {
            "int" => Ok(TransformDataType::Int),
            "double" => Ok(TransformDataType::Double),
            "string" => Ok(TransformDataType::String),
            other => Err(AbiError::Invalid(format!(
                "Invalid value for \"type\": {other}"
            ))),
        }
    }

    /// Build the dataset column for this type, keeping the base transform
    /// when the value is coerced to a string
    pub fn column(&self, name: &str, base_transform: Option<ColumnTransform>) -> Column {
        match self {
            TransformDataType::Int => Column::new(name, DataType::Int64),
            TransformDataType::Double => Column::new(name, DataType::Float64),
            TransformDataType::String => Column::with_transform(
                name,
                DataType::String,
                ColumnTransform::ToString(base_transform.map(Box::new)),
            ),
        }
    }
}

/// The `@transform` annotation: rename, value expression, and type override
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTransform {
    pub name: Option<String>,
    pub expression: Option<Expression>,
    pub data_type: Option<TransformDataType>,
}

impl ParameterTransform {
    pub fn from_json(transform_json: &Value) -> Result<ParameterTransform, AbiError> {
        let name = transform_json
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);

        let expression = transform_json
            .get("expression")
            .and_then(Value::as_str)
            .map(Expression::parse)
            .transpose()?;
        if let Some(expression) = &expression {
            // parameter expressions may only reference the parameter itself
            let names = expression.column_names();
            if names.len() != 1 || !names.contains("this") {
                return Err(AbiError::Invalid(format!(
                    "Expression '{}' must only reference 'this'",
                    expression.source()
                )));
            }
        }

        let data_type = transform_json
            .get("type")
            .and_then(Value::as_str)
            .map(TransformDataType::parse)
            .transpose()?;

        Ok(ParameterTransform {
            name,
            expression,
            data_type,
        })
    }

    /// Run the transform expression on a value, or pass it through
    pub fn evaluate_expression(&self, value: &Value) -> Result<Value, TransformError> {
        match &self.expression {
            None => Ok(value.clone()),
            Some(expression) => {
                let vars = HashMap::from([("this".to_string(), value.clone())]);
                expression.evaluate(&vars)
            }
        }
    }
}

/// A parameter with its semantic annotations; tuples carry annotated
/// components of their own
#[derive(Debug, Clone)]
pub struct SemanticParameter {
    pub parameter: Parameter,
    pub exclude: bool,
    pub components: Option<SemanticParameters>,
    pub transform: Option<ParameterTransform>,
}

impl SemanticParameter {
    pub fn from_json(
        parameter: &Parameter,
        parameter_json: &Value,
    ) -> Result<SemanticParameter, AbiError> {
        let transform_json = parameter_json.get(TRANSFORM_KEY);
        if parameter.is_tuple() && transform_json.is_some() {
            return Err(AbiError::Invalid(
                "Transforms are not supported for tuples".to_string(),
            ));
        }

        let components = match parameter.components() {
            Some(components) => {
                let components_json = parameter_json.get("components").ok_or_else(|| {
                    AbiError::Invalid(format!(
                        "tuple parameter '{}' is missing components",
                        parameter.name()
                    ))
                })?;
                Some(SemanticParameters::from_parameters(
                    components,
                    components_json,
                )?)
            }
            None => None,
        };

        Ok(SemanticParameter {
            parameter: parameter.clone(),
            exclude: parameter_json.get(EXCLUDE_KEY).and_then(Value::as_bool) == Some(true),
            components,
            transform: transform_json.map(ParameterTransform::from_json).transpose()?,
        })
    }

    pub fn name(&self) -> &str {
        self.parameter.name()
    }
}

/// Declaration-ordered, name-keyed semantic parameters
#[derive(Debug, Clone, Default)]
pub struct SemanticParameters {
    parameters: Vec<SemanticParameter>,
    by_name: HashMap<String, usize>,
}

impl SemanticParameters {
    /// Pair raw parameters with their JSON definitions (which carry the
    /// annotation keys) by position. Duplicate names are rejected.
    pub fn from_parameters(
        parameters: &[Parameter],
        parameters_json: &Value,
    ) -> Result<SemanticParameters, AbiError> {
        let elements = parameters_json
            .as_array()
            .ok_or_else(|| AbiError::Invalid("parameters must be an array".to_string()))?;

        let mut seen: HashSet<&str> = HashSet::new();
        for parameter in parameters {
            if !seen.insert(parameter.name()) {
                return Err(AbiError::Invalid(format!(
                    "Parameter '{}' is duplicated",
                    parameter.name()
                )));
            }
        }

        let mut semantic = Vec::with_capacity(parameters.len());
        let mut by_name = HashMap::with_capacity(parameters.len());
        for (parameter, parameter_json) in parameters.iter().zip(elements) {
            by_name.insert(parameter.name().to_string(), semantic.len());
            semantic.push(SemanticParameter::from_json(parameter, parameter_json)?);
        }

        Ok(SemanticParameters {
            parameters: semantic,
            by_name,
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&SemanticParameter> {
        self.by_name.get(name).map(|i| &self.parameters[*i])
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Parameters in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &SemanticParameter> {
        self.parameters.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(SemanticParameter::name)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
