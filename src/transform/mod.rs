//! The transform pipeline: step chain, stages, and the top-level
//! transformer

mod default_columns;
mod explode;
mod explode_index;
mod flatten;
mod flattener;
mod init;
mod item;
mod matches;
mod step;
mod token_transfer;
mod transform_error;
mod transformer;

pub use default_columns::DefaultColumnsStep;
pub use explode::{ExplodeFlattenPredicate, ExplodeStep};
pub use explode_index::ExplodeIndexStep;
pub use flatten::FlattenStep;
pub use flattener::{
    DefaultFlattenPredicate, FlattenPredicate, FlattenedParameter, ParameterFlattener,
};
pub use init::InitStep;
pub use item::{ItemSource, TransformItem};
pub use matches::{MatchSources, MatchStep};
pub use step::{ItemRows, Step, TRANSFORM_ERROR_COLUMN};
pub use token_transfer::TokenTransferStep;
pub use transform_error::TransformErrorStep;
pub use transformer::SemanticTransformer;
