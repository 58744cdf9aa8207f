//! Fetch blocks with receipts and traces over JSON-RPC

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};

/// Which node implementation is on the other end; receipts and traces use
/// different RPC methods per backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Geth,
    Erigon,
}

impl NodeKind {
    pub fn parse(name: &str) -> Result<NodeKind> {
        match name.to_ascii_lowercase().as_str() {
            "geth" => Ok(NodeKind::Geth),
            "erigon" => Ok(NodeKind::Erigon),
            other => bail!("unknown node kind '{other}'"),
        }
    }
}

/// Fetches a block in the `{block, receipts, traces}` document shape the
/// transformer consumes
pub struct BlockFetcher {
    client: reqwest::Client,
    url: String,
    node: NodeKind,
}

impl BlockFetcher {
    pub fn new(url: impl Into<String>, node: NodeKind) -> BlockFetcher {
        BlockFetcher {
            client: reqwest::Client::new(),
            url: url.into(),
            node,
        }
    }

    /// Fetch the block body, every receipt, and the block's traces
    pub async fn fetch_block(&self, block_number: u64) -> Result<Value> {
        let block = self
            .rpc(
                "eth_getBlockByNumber",
                json!([format!("0x{block_number:x}"), true]),
            )
            .await
            .with_context(|| format!("failed to fetch block {block_number}"))?;

        let receipts = match self.node {
            NodeKind::Erigon => self.block_receipts(block_number).await?,
            NodeKind::Geth => self.transaction_receipts(&block).await?,
        };

        let traces = match self.node {
            NodeKind::Erigon => self
                .rpc("trace_block", json!([format!("0x{block_number:x}")]))
                .await
                .with_context(|| format!("failed to trace block {block_number}"))?,
            NodeKind::Geth => self
                .rpc(
                    "debug_traceBlockByNumber",
                    json!([
                        format!("0x{block_number:x}"),
                        {"tracer": "callTracer"}
                    ]),
                )
                .await
                .with_context(|| format!("failed to trace block {block_number}"))?,
        };

        Ok(json!({
            "block": block,
            "receipts": receipts,
            "traces": traces
        }))
    }

    /// All receipts in one call; erigon only
    async fn block_receipts(&self, block_number: u64) -> Result<Value> {
        self.rpc(
            "eth_getBlockReceipts",
            json!([format!("0x{block_number:x}")]),
        )
        .await
        .with_context(|| format!("failed to fetch receipts for block {block_number}"))
    }

    /// One receipt per transaction for nodes without eth_getBlockReceipts
    async fn transaction_receipts(&self, block: &Value) -> Result<Value> {
        let transactions = block
            .get("transactions")
            .and_then(Value::as_array)
            .context("block has no transactions")?;

        let mut receipts = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let hash = transaction
                .get("hash")
                .and_then(Value::as_str)
                .context("transaction has no hash")?;
            let receipt = self
                .rpc("eth_getTransactionReceipt", json!([hash]))
                .await
                .with_context(|| format!("failed to fetch receipt for transaction {hash}"))?;
            receipts.push(receipt);
        }

        Ok(Value::Array(receipts))
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("{method} returned {}", response.status());
        }

        let mut body: Value = response.json().await?;
        if let Some(error) = body.get("error") {
            bail!("{method} failed: {error}");
        }
        body.get_mut("result")
            .map(Value::take)
            .with_context(|| format!("{method} returned no result"))
    }
}
