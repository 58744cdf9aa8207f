//! Semantic annotations over the raw ABI model

mod abi;
mod explode;
mod expressions;
mod item;
mod matches;
mod parameter;

pub use abi::SemanticAbi;
pub use explode::Explode;
pub use expressions::{Expressions, TableExpression};
pub use item::{
    DecodedResult, SemanticAbiEvent, SemanticAbiFunction, SemanticAbiItem, SemanticItemProperties,
};
pub use matches::{Match, MatchCardinality, MatchKind, MatchPredicate, Matches};
pub use parameter::{
    ParameterTransform, SemanticParameter, SemanticParameters, TransformDataType,
};
