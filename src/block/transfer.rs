//! Best-effort token transfer detection across the standard signatures

use std::sync::LazyLock;

use serde_json::Value;

use crate::abi::Abi;
use crate::block::log::EthLog;
use crate::convert::normalize_hex;
use crate::error::TransformError;

/// Token standards a transfer can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eth,
    Erc20,
    Erc721,
    Erc1155,
    CryptoPunks,
}

impl TokenKind {
    pub fn code(&self) -> &'static str {
        match self {
            TokenKind::Eth => "Eth",
            TokenKind::Erc20 => "Erc20",
            TokenKind::Erc721 => "Erc721",
            TokenKind::Erc1155 => "Erc1155",
            TokenKind::CryptoPunks => "CryptoPunks",
        }
    }

    pub fn is_nft(&self) -> bool {
        matches!(
            self,
            TokenKind::Erc721 | TokenKind::Erc1155 | TokenKind::CryptoPunks
        )
    }
}

/// Topic hashes that mark a log as a candidate token transfer
pub const TRANSFER_TOPICS: [&str; 5] = [
    // Transfer(address,address,uint256)
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
    // TransferSingle(address,address,address,uint256,uint256)
    "0xc3d58168c5ae7397731d063d5bbf3d657854427343f4c083240f7aacaa2d0f62",
    // TransferBatch(address,address,address,uint256[],uint256[])
    "0x4a39dc06d4c0dbc64b70af90fd698a233a518aa5d07e595d983b8c0526c8f7fb",
    // PunkTransfer(address,address,uint256)
    "0x05af636b70da6819000c49f85b21fa82081c632069bb626f30932034099107d8",
    // PunkBought(uint256,uint256,address,address)
    "0x58e5d5a525e3b40bc15abaa38b5882678db1ee68befd2f60bafe3a7fd06db9e3",
];

/// The ABI used to decode candidate transfer logs. The ERC-20 and ERC-721
/// Transfer events share a topic and differ only in indexed-ness; the
/// `extra.standard` annotation marks the 721 variant after resolution.
static TRANSFER_ABI: LazyLock<Abi> = LazyLock::new(|| {
    let abi_json: Value =
        serde_json::from_str(TRANSFER_ABI_JSON).expect("built-in transfer ABI parses");
    Abi::new("Transfer", &abi_json).expect("built-in transfer ABI is valid")
});

const TRANSFER_ABI_JSON: &str = r#"[
    {
        "type": "event",
        "name": "Transfer",
        "extra": {"standard": "Erc20"},
        "inputs": [
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "value", "type": "uint256"}
        ]
    },
    {
        "type": "event",
        "name": "Transfer",
        "extra": {"standard": "Erc721"},
        "inputs": [
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "tokenId", "type": "uint256", "indexed": true}
        ]
    },
    {
        "type": "event",
        "name": "TransferSingle",
        "inputs": [
            {"name": "operator", "type": "address", "indexed": true},
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "id", "type": "uint256"},
            {"name": "value", "type": "uint256"}
        ]
    },
    {
        "type": "event",
        "name": "TransferBatch",
        "inputs": [
            {"name": "operator", "type": "address", "indexed": true},
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "ids", "type": "uint256[]"},
            {"name": "values", "type": "uint256[]"}
        ]
    },
    {
        "type": "event",
        "name": "PunkTransfer",
        "inputs": [
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "punkIndex", "type": "uint256"}
        ]
    },
    {
        "type": "event",
        "name": "PunkBought",
        "inputs": [
            {"name": "punkIndex", "type": "uint256", "indexed": true},
            {"name": "value", "type": "uint256"},
            {"name": "fromAddress", "type": "address", "indexed": true},
            {"name": "toAddress", "type": "address", "indexed": true}
        ]
    }
]"#;

/// One detected token transfer, possibly one of several from a single
/// batch log
#[derive(Debug, Clone)]
pub struct TokenTransfer {
    pub contract_address: String,
    pub from_address: String,
    pub to_address: String,
    pub value: Value,
    pub token_id: Option<Value>,
    pub event_name: String,
    pub token_kind: TokenKind,
    /// Unique within the transaction: the log position, dot-suffixed for
    /// batch elements
    pub internal_index: String,
}

/// Whether the log's signature topic is one of the transfer topics
pub fn is_token_transfer(log: &EthLog) -> bool {
    match log.topic0() {
        Some(topic) => TRANSFER_TOPICS.contains(&topic),
        None => false,
    }
}

/// Decode a candidate log into its transfers. Failures are swallowed by
/// design since transfer detection is speculative scanning, not a declared
/// decode target; the log is simply not treated as a transfer.
pub fn decode_transfers(log: &EthLog, log_position: usize) -> Vec<TokenTransfer> {
    if !is_token_transfer(log) {
        return Vec::new();
    }

    match try_decode(log, log_position) {
        Ok(transfers) => transfers,
        Err(error) => {
            log::debug!(
                "skipping undecodable transfer log {} of tx {:?}: {}",
                log_position,
                log.transaction_hash,
                error
            );
            Vec::new()
        }
    }
}

fn try_decode(log: &EthLog, log_position: usize) -> Result<Vec<TokenTransfer>, TransformError> {
    let Some(decoded_log) = TRANSFER_ABI.decode_log(log)? else {
        return Ok(Vec::new());
    };

    let decoded = decoded_log.data.to_json();
    let event_name = decoded_log.event.name.as_str();
    let contract_address = normalize_hex(&log.address);

    let transfers = match event_name {
        "Transfer" => {
            let standard = decoded_log
                .event
                .extra
                .as_ref()
                .and_then(|extra| extra.get("standard"))
                .and_then(Value::as_str);
            if standard == Some("Erc721") {
                vec![TokenTransfer {
                    contract_address,
                    from_address: field_string(&decoded, "from")?,
                    to_address: field_string(&decoded, "to")?,
                    value: Value::from(1),
                    token_id: Some(decoded["tokenId"].clone()),
                    event_name: event_name.to_string(),
                    token_kind: TokenKind::Erc721,
                    internal_index: log_position.to_string(),
                }]
            } else {
                vec![TokenTransfer {
                    contract_address,
                    from_address: field_string(&decoded, "from")?,
                    to_address: field_string(&decoded, "to")?,
                    value: decoded["value"].clone(),
                    token_id: None,
                    event_name: event_name.to_string(),
                    token_kind: TokenKind::Erc20,
                    internal_index: log_position.to_string(),
                }]
            }
        }
        "TransferSingle" => vec![TokenTransfer {
            contract_address,
            from_address: field_string(&decoded, "from")?,
            to_address: field_string(&decoded, "to")?,
            value: decoded["value"].clone(),
            token_id: Some(decoded["id"].clone()),
            event_name: event_name.to_string(),
            token_kind: TokenKind::Erc1155,
            internal_index: log_position.to_string(),
        }],
        "TransferBatch" => {
            let ids = field_array(&decoded, "ids")?;
            let values = field_array(&decoded, "values")?;
            if ids.len() != values.len() {
                return Err(TransformError::decode(format!(
                    "TransferBatch ids/values length mismatch: {} vs {}",
                    ids.len(),
                    values.len()
                )));
            }

            // zero-pad the one-based sub-index to the batch width so the
            // synthetic indices stay unique and sortable
            let padding = ids.len().to_string().len();
            ids.iter()
                .zip(values)
                .enumerate()
                .map(|(i, (id, value))| TokenTransfer {
                    contract_address: contract_address.clone(),
                    from_address: normalize_hex(decoded["from"].as_str().unwrap_or_default()),
                    to_address: normalize_hex(decoded["to"].as_str().unwrap_or_default()),
                    value: value.clone(),
                    token_id: Some(id.clone()),
                    event_name: event_name.to_string(),
                    token_kind: TokenKind::Erc1155,
                    internal_index: format!("{}.{:0>padding$}", log_position, i + 1),
                })
                .collect()
        }
        "PunkTransfer" => vec![TokenTransfer {
            contract_address,
            from_address: field_string(&decoded, "from")?,
            to_address: field_string(&decoded, "to")?,
            value: Value::from(1),
            token_id: Some(decoded["punkIndex"].clone()),
            event_name: event_name.to_string(),
            token_kind: TokenKind::CryptoPunks,
            internal_index: log_position.to_string(),
        }],
        "PunkBought" => vec![TokenTransfer {
            contract_address,
            from_address: field_string(&decoded, "fromAddress")?,
            to_address: field_string(&decoded, "toAddress")?,
            value: Value::from(1),
            token_id: Some(decoded["punkIndex"].clone()),
            event_name: event_name.to_string(),
            token_kind: TokenKind::CryptoPunks,
            internal_index: log_position.to_string(),
        }],
        _ => Vec::new(),
    };

    Ok(transfers)
}

fn field_string(decoded: &Value, key: &str) -> Result<String, TransformError> {
    decoded
        .get(key)
        .and_then(Value::as_str)
        .map(normalize_hex)
        .ok_or_else(|| TransformError::decode(format!("transfer is missing '{key}'")))
}

fn field_array<'a>(decoded: &'a Value, key: &str) -> Result<&'a Vec<Value>, TransformError> {
    decoded
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| TransformError::decode(format!("transfer is missing '{key}' array")))
}
