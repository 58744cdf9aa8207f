//! ABI domain model: parameters, items, decode, and the semantic layer

pub mod decoded;
pub mod item;
pub mod parameter;
pub mod registry;
pub mod semantic;

pub use decoded::{Decoded, DecodedPrimitive, DecodedTuple, DecodedTupleArray};
pub use item::{AbiEvent, AbiFunction, ItemKind};
pub use parameter::{Parameter, Parameters};
pub use registry::{Abi, DecodedLog, DecodedTrace};
