//! Minimal arithmetic expression engine for parameter transforms
//!
//! Supports `+ - * /`, unary minus, parentheses, numeric literals, and
//! identifiers resolved against row values. Parameter transforms may only
//! reference `this`; item- and table-level expression lists are parsed for
//! validation but remain inert in the pipeline.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::convert::value_to_f64;
use crate::error::{AbiError, TransformError};

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Ident(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

/// A parsed expression, reusable across rows
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Expression, AbiError> {
        let tokens = tokenize(source)
            .map_err(|e| AbiError::Invalid(format!("invalid expression '{source}': {e}")))?;
        let mut parser = Parser { tokens, pos: 0 };
        let ast = parser
            .expr()
            .map_err(|e| AbiError::Invalid(format!("invalid expression '{source}': {e}")))?;
        if parser.pos != parser.tokens.len() {
            return Err(AbiError::Invalid(format!(
                "invalid expression '{source}': unexpected trailing input"
            )));
        }
        Ok(Expression {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of all columns the expression references
    pub fn column_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_idents(&self.ast, &mut names);
        names
    }

    /// Evaluate against the given variable bindings
    pub fn evaluate(&self, vars: &HashMap<String, Value>) -> Result<Value, TransformError> {
        let result = eval(&self.ast, vars)?;
        // render integral results as integers
        if result.fract() == 0.0 && result.abs() < 9_007_199_254_740_992.0 {
            Ok(Value::from(result as i64))
        } else {
            Ok(Value::from(result))
        }
    }
}

fn collect_idents(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Ident(name) => {
            names.insert(name.clone());
        }
        Expr::Neg(inner) => collect_idents(inner, names),
        Expr::Add(l, r) | Expr::Sub(l, r) | Expr::Mul(l, r) | Expr::Div(l, r) => {
            collect_idents(l, names);
            collect_idents(r, names);
        }
    }
}

fn eval(expr: &Expr, vars: &HashMap<String, Value>) -> Result<f64, TransformError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Ident(name) => {
            let value = vars.get(name).ok_or_else(|| {
                TransformError::transform(format!("unknown column in expression: {name}"))
            })?;
            value_to_f64(value)
        }
        Expr::Neg(inner) => Ok(-eval(inner, vars)?),
        Expr::Add(l, r) => Ok(eval(l, vars)? + eval(r, vars)?),
        Expr::Sub(l, r) => Ok(eval(l, vars)? - eval(r, vars)?),
        Expr::Mul(l, r) => Ok(eval(l, vars)? * eval(r, vars)?),
        Expr::Div(l, r) => {
            let divisor = eval(r, vars)?;
            if divisor == 0.0 {
                return Err(TransformError::transform("division by zero in expression"));
            }
            Ok(eval(l, vars)? / divisor)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // scientific notation like 1e18
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    i += 1;
                    if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| format!("bad number literal '{literal}'"))?;
                tokens.push(Token::Number(number));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut left = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.next();
                    left = Expr::Add(Box::new(left), Box::new(self.term()?));
                }
                Token::Minus => {
                    self.next();
                    left = Expr::Sub(Box::new(left), Box::new(self.term()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut left = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.next();
                    left = Expr::Mul(Box::new(left), Box::new(self.factor()?));
                }
                Token::Slash => {
                    self.next();
                    left = Expr::Div(Box::new(left), Box::new(self.factor()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.factor()?))),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_arithmetic_precedence() {
        let expression = Expression::parse("1 + 2 * 3").unwrap();
        assert_eq!(expression.evaluate(&vars(&[])).unwrap(), json!(7));
    }

    #[test]
    fn test_parentheses_and_negation() {
        let expression = Expression::parse("-(1 + 2) * 3").unwrap();
        assert_eq!(expression.evaluate(&vars(&[])).unwrap(), json!(-9));
    }

    #[test]
    fn test_identifier_resolution() {
        let expression = Expression::parse("this / 1e18").unwrap();
        assert_eq!(expression.column_names().len(), 1);
        let result = expression
            .evaluate(&vars(&[("this", json!(2_000_000_000_000_000_000u64))]))
            .unwrap();
        assert_eq!(result, json!(2));
    }

    #[test]
    fn test_unknown_identifier_errors() {
        let expression = Expression::parse("missing + 1").unwrap();
        assert!(expression.evaluate(&vars(&[])).is_err());
    }

    #[test]
    fn test_division_by_zero() {
        let expression = Expression::parse("1 / 0").unwrap();
        assert!(expression.evaluate(&vars(&[])).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expression::parse("1 +").is_err());
        assert!(Expression::parse("(1").is_err());
        assert!(Expression::parse("1 $ 2").is_err());
        assert!(Expression::parse("1 2").is_err());
    }
}
