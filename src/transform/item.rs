//! Transform items: one decoded occurrence flowing through a pipeline

use std::cell::OnceCell;
use std::fmt::Display;
use std::sync::Arc;

use crate::abi::semantic::{DecodedResult, SemanticAbiItem};
use crate::block::{EthLog, EthTrace, TokenTransfer};
use crate::error::TransformError;

/// Where an occurrence came from
#[derive(Debug)]
pub enum ItemSource<'a> {
    Event(&'a EthLog),
    Function(&'a EthTrace),
    Transfer(&'a TokenTransfer),
}

/// One log, trace, or token transfer being turned into rows. Decoding is
/// deferred until a stage needs it, then memoized; transform errors
/// accumulate here instead of aborting the row.
#[derive(Debug)]
pub struct TransformItem<'a> {
    source: ItemSource<'a>,
    item: Option<Arc<SemanticAbiItem>>,
    decoded: OnceCell<Result<DecodedResult, TransformError>>,
    errors: Vec<String>,
}

impl<'a> TransformItem<'a> {
    pub fn event(log: &'a EthLog, item: Arc<SemanticAbiItem>) -> TransformItem<'a> {
        TransformItem {
            source: ItemSource::Event(log),
            item: Some(item),
            decoded: OnceCell::new(),
            errors: Vec::new(),
        }
    }

    pub fn function(trace: &'a EthTrace, item: Arc<SemanticAbiItem>) -> TransformItem<'a> {
        TransformItem {
            source: ItemSource::Function(trace),
            item: Some(item),
            decoded: OnceCell::new(),
            errors: Vec::new(),
        }
    }

    pub fn transfer(transfer: &'a TokenTransfer) -> TransformItem<'a> {
        TransformItem {
            source: ItemSource::Transfer(transfer),
            item: None,
            decoded: OnceCell::new(),
            errors: Vec::new(),
        }
    }

    /// The contract address that was interacted with to produce this item
    pub fn contract_address(&self) -> String {
        match &self.source {
            ItemSource::Event(log) => log.address.clone(),
            ItemSource::Function(trace) => trace.to_address.clone().unwrap_or_default(),
            ItemSource::Transfer(transfer) => transfer.contract_address.clone(),
        }
    }

    /// An index that uniquely identifies this item within its transaction.
    /// A string since function calls only have a trace path and batch
    /// transfers carry dotted sub-indices.
    pub fn internal_index(&self) -> Result<String, TransformError> {
        match &self.source {
            ItemSource::Event(log) => Ok(log.log_index()?.to_string()),
            ItemSource::Function(trace) => Ok(trace.trace_hash()),
            ItemSource::Transfer(transfer) => Ok(transfer.internal_index.clone()),
        }
    }

    /// `event`, `function`, or `transfer`
    pub fn item_type(&self) -> &'static str {
        match &self.source {
            ItemSource::Event(_) => "event",
            ItemSource::Function(_) => "function",
            ItemSource::Transfer(_) => "transfer",
        }
    }

    /// Decode on first access and memoize; the item is filtered by
    /// contract address before anything forces a decode
    pub fn decoded_result(&self) -> Result<&DecodedResult, TransformError> {
        let decoded = self.decoded.get_or_init(|| match (&self.item, &self.source) {
            (Some(item), ItemSource::Event(log)) => item.decode_log(log),
            (Some(item), ItemSource::Function(trace)) => item.decode_trace(trace),
            _ => Err(TransformError::decode(
                "token transfers have no decoded result",
            )),
        });
        decoded.as_ref().map_err(Clone::clone)
    }

    pub fn add_transform_error(&mut self, error: impl Display) {
        self.errors.push(error.to_string());
    }

    pub fn has_transform_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All accumulated errors joined for the reserved column
    pub fn transform_error(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ping_item() -> Arc<SemanticAbiItem> {
        Arc::new(
            SemanticAbiItem::event_from_json(&json!({
                "type": "event",
                "name": "Ping",
                "@isPrimary": true,
                "inputs": [{"name": "value", "type": "uint256"}]
            }))
            .unwrap(),
        )
    }

    #[test]
    fn test_event_item_identity() {
        let item = ping_item();
        let log = EthLog {
            address: "0xC0".to_string(),
            topics: vec![format!("0x{}", item.hash())],
            data: format!("0x{:0>64}", "1"),
            log_index: Some(json!("0x1f")),
            ..EthLog::default()
        };

        let transform_item = TransformItem::event(&log, item);
        assert_eq!(transform_item.item_type(), "event");
        assert_eq!(transform_item.contract_address(), "0xC0");
        assert_eq!(transform_item.internal_index().unwrap(), "31");
    }

    #[test]
    fn test_decode_is_memoized() {
        let item = ping_item();
        let log = EthLog {
            address: "0xC0".to_string(),
            topics: vec![format!("0x{}", item.hash())],
            data: format!("0x{:0>64}", "2a"),
            ..EthLog::default()
        };

        let transform_item = TransformItem::event(&log, item);
        let first = transform_item.decoded_result().unwrap() as *const DecodedResult;
        let second = transform_item.decoded_result().unwrap() as *const DecodedResult;
        assert_eq!(first, second);
    }

    #[test]
    fn test_errors_accumulate_and_join() {
        let item = ping_item();
        let log = EthLog::default();
        let mut transform_item = TransformItem::event(&log, item);

        assert!(!transform_item.has_transform_error());
        transform_item.add_transform_error("first");
        transform_item.add_transform_error("second");
        assert_eq!(
            transform_item.transform_error(),
            Some("first,second".to_string())
        );
    }

    #[test]
    fn test_function_internal_index_is_trace_hash() {
        let item = ping_item();
        let trace = EthTrace {
            trace_address: vec![1, 2],
            to_address: Some("0xab".to_string()),
            ..EthTrace::default()
        };
        let transform_item = TransformItem::function(&trace, item);
        assert_eq!(transform_item.internal_index().unwrap(), "1_2");
        assert_eq!(transform_item.contract_address(), "0xab");
    }
}
