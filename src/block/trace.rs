//! Call traces: a unified record over the erigon and geth backends

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::convert::normalize_hex;
use crate::error::BlockError;

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Erigon's top-level trace type; geth only has calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceKind {
    #[default]
    Call,
    Reward,
}

/// The call type of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    DelegateCall,
    StaticCall,
    CallCode,
    /// erigon reports create for both, geth distinguishes create2
    Create,
    Create2,
}

impl CallKind {
    pub fn parse(kind: &str) -> Option<CallKind> {
        match kind.to_ascii_lowercase().as_str() {
            "call" => Some(CallKind::Call),
            "delegatecall" => Some(CallKind::DelegateCall),
            "staticcall" => Some(CallKind::StaticCall),
            "callcode" => Some(CallKind::CallCode),
            "create" => Some(CallKind::Create),
            "create2" => Some(CallKind::Create2),
            _ => None,
        }
    }
}

/// One call trace, normalized across backends
#[derive(Debug, Clone, Default)]
pub struct EthTrace {
    pub block_hash: Option<String>,
    pub transaction_hash: String,
    /// Position in the call tree; empty for the root call
    pub trace_address: Vec<usize>,
    pub kind: TraceKind,
    pub call_kind: Option<CallKind>,
    pub from_address: String,
    pub to_address: Option<String>,
    /// Raw hex quantities as persisted
    pub value: Option<String>,
    pub gas: Option<String>,
    pub gas_used: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl EthTrace {
    /// Function signature hash: the first 4 bytes of the call input,
    /// `0x`-prefixed
    pub fn signature(&self) -> Option<&str> {
        match self.input.as_deref() {
            Some(input) if !input.is_empty() => Some(&input[..input.len().min(10)]),
            _ => None,
        }
    }

    /// The trace address rendered as `0_3_1`; empty for the root
    pub fn trace_hash(&self) -> String {
        self.trace_address
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn is_root(&self) -> bool {
        self.trace_address.is_empty()
    }
}

/// All traces of one transaction: the root call plus its sub-traces in
/// traversal order
#[derive(Debug, Clone)]
pub struct EthTransactionTraces {
    pub root: EthTrace,
    sub_traces: Vec<EthTrace>,
}

impl EthTransactionTraces {
    pub fn new(root: EthTrace) -> EthTransactionTraces {
        EthTransactionTraces {
            root,
            sub_traces: Vec::new(),
        }
    }

    pub fn hash(&self) -> &str {
        &self.root.transaction_hash
    }

    pub fn add_trace(&mut self, trace: EthTrace) {
        self.sub_traces.push(trace);
    }

    /// Root first, then sub-traces
    pub fn traces(&self) -> impl Iterator<Item = &EthTrace> {
        std::iter::once(&self.root).chain(self.sub_traces.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.sub_traces.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Traces for a whole block, grouped by transaction hash. The two backends
/// are distinguished by the presence of `traceAddress` at the record root.
#[derive(Debug, Clone, Default)]
pub struct BlockTraces {
    transactions: HashMap<String, EthTransactionTraces>,
    /// Mining rewards, erigon only
    pub rewards: Vec<EthTrace>,
}

impl BlockTraces {
    /// Parse a flat erigon trace list; traces arrive ordered per
    /// transaction with the root call first
    pub fn from_erigon(traces: &[Value]) -> Result<BlockTraces, BlockError> {
        let mut block_traces = BlockTraces::default();
        let mut current_hash: Option<String> = None;

        for trace_json in traces {
            let trace = erigon_trace(trace_json)?;

            if trace.kind == TraceKind::Reward {
                block_traces.rewards.push(trace);
                continue;
            }

            if current_hash.as_deref() != Some(trace.transaction_hash.as_str()) {
                current_hash = Some(trace.transaction_hash.clone());
                block_traces
                    .transactions
                    .insert(trace.transaction_hash.clone(), EthTransactionTraces::new(trace));
            } else if let Some(transaction) = block_traces
                .transactions
                .get_mut(current_hash.as_deref().unwrap_or_default())
            {
                transaction.add_trace(trace);
            }
        }

        Ok(block_traces)
    }

    /// Parse geth per-transaction call trees, flattening each tree
    /// depth-first into erigon-style trace addresses. Geth traces do not
    /// carry transaction hashes, so they are matched by index against the
    /// block's transactions.
    pub fn from_geth(
        block_hash: &str,
        transaction_hashes: &[String],
        traces: &[Value],
    ) -> Result<BlockTraces, BlockError> {
        if transaction_hashes.len() != traces.len() {
            return Err(BlockError::invalid(format!(
                "Have {} transactions for {} traces.",
                transaction_hashes.len(),
                traces.len()
            )));
        }

        let mut block_traces = BlockTraces::default();
        for (transaction_hash, root_json) in transaction_hashes.iter().zip(traces) {
            let frame = root_json.get("result").ok_or_else(|| {
                BlockError::invalid(format!(
                    "Missing trace results in transaction {transaction_hash}."
                ))
            })?;

            let transaction_hash = normalize_hex(transaction_hash);
            let mut transaction = EthTransactionTraces::new(geth_trace(
                block_hash,
                &transaction_hash,
                Vec::new(),
                frame,
            ));
            flatten_geth_calls(block_hash, &transaction_hash, frame, &mut transaction, &[]);
            block_traces
                .transactions
                .insert(transaction_hash, transaction);
        }

        Ok(block_traces)
    }

    pub fn traces(&self, transaction_hash: &str) -> Option<&EthTransactionTraces> {
        self.transactions.get(transaction_hash)
    }

    pub fn take(&mut self, transaction_hash: &str) -> Option<EthTransactionTraces> {
        self.transactions.remove(transaction_hash)
    }

    pub fn transaction_hashes(&self) -> HashSet<String> {
        self.transactions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn erigon_trace(trace_json: &Value) -> Result<EthTrace, BlockError> {
    let action = trace_json.get("action").cloned().unwrap_or(Value::Null);
    let result = trace_json.get("result").cloned().unwrap_or(Value::Null);

    let kind = match trace_json.get("type").and_then(Value::as_str) {
        Some("reward") => TraceKind::Reward,
        _ => TraceKind::Call,
    };

    let transaction_hash = string_field(trace_json, "transactionHash")
        .map(|hash| normalize_hex(&hash))
        .unwrap_or_default();
    if kind == TraceKind::Call && transaction_hash.is_empty() {
        return Err(BlockError::invalid("trace is missing a transactionHash"));
    }

    let trace_address = trace_json
        .get("traceAddress")
        .and_then(Value::as_array)
        .map(|address| {
            address
                .iter()
                .filter_map(Value::as_u64)
                .map(|v| v as usize)
                .collect()
        })
        .unwrap_or_default();

    // contract creations carry init instead of input; the created address
    // lives in the result
    let to_address = if action.get("init").is_some() {
        match result.get("address").and_then(Value::as_str) {
            Some(address) => Some(normalize_hex(address)),
            None => Some(ZERO_ADDRESS.to_string()),
        }
    } else {
        string_field(&action, "to").map(|to| normalize_hex(&to))
    };

    Ok(EthTrace {
        block_hash: string_field(trace_json, "blockHash"),
        transaction_hash,
        trace_address,
        kind,
        call_kind: action
            .get("callType")
            .and_then(Value::as_str)
            .and_then(CallKind::parse),
        from_address: string_field(&action, "from")
            .map(|from| normalize_hex(&from))
            .unwrap_or_default(),
        to_address,
        value: string_field(&action, "value"),
        gas: string_field(&action, "gas"),
        gas_used: result
            .get("gasUsed")
            .and_then(Value::as_str)
            .map(str::to_string),
        input: string_field(&action, "input"),
        output: result
            .get("output")
            .and_then(Value::as_str)
            .map(str::to_string),
        error: string_field(trace_json, "error"),
    })
}

fn geth_trace(
    block_hash: &str,
    transaction_hash: &str,
    trace_address: Vec<usize>,
    frame: &Value,
) -> EthTrace {
    EthTrace {
        block_hash: Some(block_hash.to_string()),
        transaction_hash: transaction_hash.to_string(),
        trace_address,
        kind: TraceKind::Call,
        call_kind: frame
            .get("type")
            .and_then(Value::as_str)
            .and_then(CallKind::parse),
        from_address: string_field(frame, "from")
            .map(|from| normalize_hex(&from))
            .unwrap_or_default(),
        // geth always reports a to address, the created contract included
        to_address: string_field(frame, "to").map(|to| normalize_hex(&to)),
        value: string_field(frame, "value"),
        gas: string_field(frame, "gas"),
        gas_used: string_field(frame, "gasUsed"),
        input: string_field(frame, "input"),
        output: string_field(frame, "output"),
        error: string_field(frame, "error"),
    }
}

fn flatten_geth_calls(
    block_hash: &str,
    transaction_hash: &str,
    frame: &Value,
    transaction: &mut EthTransactionTraces,
    address: &[usize],
) {
    let Some(calls) = frame.get("calls").and_then(Value::as_array) else {
        return;
    };

    for (child_index, child) in calls.iter().enumerate() {
        let mut child_address = address.to_vec();
        child_address.push(child_index);
        transaction.add_trace(geth_trace(
            block_hash,
            transaction_hash,
            child_address.clone(),
            child,
        ));
        flatten_geth_calls(block_hash, transaction_hash, child, transaction, &child_address);
    }
}
