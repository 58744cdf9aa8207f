//! Item- and table-level expression lists
//!
//! Parsed and validated for shape but reserved: the pipeline does not
//! evaluate these, only parameter `@transform` expressions run.

use serde_json::Value;

use crate::abi::semantic::parameter::TransformDataType;
use crate::error::AbiError;
use crate::expression::Expression;

/// A named expression with its declared output type
#[derive(Debug, Clone, PartialEq)]
pub struct TableExpression {
    pub name: String,
    pub expression: Expression,
    pub data_type: Option<TransformDataType>,
}

impl TableExpression {
    pub fn from_json(expression_json: &Value) -> Result<TableExpression, AbiError> {
        let name = expression_json
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AbiError::Invalid("expression requires a 'name'".to_string()))?;
        let expression = Expression::parse(
            expression_json
                .get("expression")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AbiError::Invalid("expression requires an 'expression'".to_string())
                })?,
        )?;
        let data_type = expression_json
            .get("type")
            .and_then(Value::as_str)
            .map(TransformDataType::parse)
            .transpose()?;

        Ok(TableExpression {
            name,
            expression,
            data_type,
        })
    }
}

/// The ordered expression list of an item or of the ABI metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expressions {
    pub expressions: Vec<TableExpression>,
}

impl Expressions {
    pub fn from_json(expressions_json: &Value) -> Result<Expressions, AbiError> {
        let expressions = expressions_json
            .as_array()
            .ok_or_else(|| AbiError::Invalid("expressions must be an array".to_string()))?
            .iter()
            .map(TableExpression::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expressions { expressions })
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_list() {
        let expressions = Expressions::from_json(&json!([
            {"name": "ratio", "expression": "a / b", "type": "double"}
        ]))
        .unwrap();
        assert_eq!(expressions.expressions.len(), 1);
        assert_eq!(
            expressions.expressions[0].data_type,
            Some(TransformDataType::Double)
        );
    }

    #[test]
    fn test_missing_name_rejected() {
        assert!(Expressions::from_json(&json!([{"expression": "a"}])).is_err());
    }
}
