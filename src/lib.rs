//! semtab: decode EVM event logs and call traces with a semantic ABI and
//! transform them into flat, schema-stable rows.
//!
//! A semantic ABI is a standard contract ABI extended with annotation keys
//! (`@isPrimary`, `@explode`, `@matches`, `@transform`, `@exclude`) that
//! describe how decoded occurrences become dataset rows. The
//! [`transform::SemanticTransformer`] builds one transform pipeline per
//! primary item, agrees on a single union schema ahead of any data, and
//! produces one row per occurrence (optionally multiplied by explode and
//! match stages) per block.

pub mod abi;
pub mod block;
pub mod chain;
pub mod convert;
pub mod error;
pub mod export;
pub mod expression;
pub mod fetch;
pub mod schema;
pub mod transform;
