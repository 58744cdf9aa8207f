//! End-to-end transformer tests over synthetic blocks

use serde_json::{json, Value};

use semtab::block::EthBlock;
use semtab::chain::EvmChain;
use semtab::transform::SemanticTransformer;

fn word(tail: &str) -> String {
    format!("0x{:0>64}", tail)
}

fn block_doc(logs: Vec<Value>) -> Value {
    json!({
        "block": {
            "number": "0x112a880",
            "timestamp": "0x65a0c500",
            "hash": "0xB10CB10C",
            "transactions": [
                {"hash": "0xT1", "from": "0xF1", "to": "0xA1"}
            ]
        },
        "receipts": [{
            "transactionHash": "0xt1",
            "status": "0x1",
            "gasUsed": "0x5208",
            "logs": logs
        }]
    })
}

fn transfer_abi() -> Value {
    json!({
        "metadata": {"chains": ["ethereum"]},
        "abi": [{
            "type": "event",
            "name": "Transfer",
            "@isPrimary": true,
            "inputs": [
                {"name": "from", "type": "address", "indexed": true},
                {"name": "to", "type": "address", "indexed": true},
                {"name": "value", "type": "uint256"}
            ]
        }]
    })
}

#[test]
fn erc20_transfer_end_to_end() {
    let transformer = SemanticTransformer::from_json(&transfer_abi()).unwrap();
    let topic = transformer.abi().primary_items()[0].hash().to_string();

    let block = EthBlock::from_json(
        EvmChain::Ethereum,
        &block_doc(vec![json!({
            "address": "0xDAC17F958D2ee523a2206206994597C13D831ec7",
            "topics": [
                format!("0x{topic}"),
                word("742D35CC6634C0532925A3B844BC9E7595F0BEB0"),
                word("53D284357EC70CE289D6D64134DFAC8E511C8A3D")
            ],
            "data": word("f4240"),
            "logIndex": "0x2"
        })]),
    )
    .unwrap();

    let rows = transformer.transform(&block);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];

    // addresses lose their 32-byte topic padding and lowercase
    assert_eq!(
        row["from"],
        json!("0x742d35cc6634c0532925a3b844bc9e7595f0beb0")
    );
    assert_eq!(
        row["to"],
        json!("0x53d284357ec70ce289d6d64134dfac8e511c8a3d")
    );
    assert_eq!(row["value"], json!(1_000_000));

    // reserved columns are always present
    assert_eq!(row["chain"], json!("ethereum"));
    assert_eq!(row["blockNumber"], json!(18_000_000));
    assert_eq!(row["blockHash"], json!("0xb10cb10c"));
    assert_eq!(row["transactionHash"], json!("0xt1"));
    assert_eq!(
        row["contractAddress"],
        json!("0xdac17f958d2ee523a2206206994597c13d831ec7")
    );
    assert_eq!(row["status"], json!(1));
    assert_eq!(row["gasUsed"], json!(21000.0));
    assert_eq!(row["itemType"], json!("event"));
    assert_eq!(row["internalIndex"], json!("2"));
    assert_eq!(row["explodeIndex"], json!(0));
    assert_eq!(row["transform_error"], Value::Null);
}

#[test]
fn union_schema_null_pads_across_primary_items() {
    let transformer = SemanticTransformer::from_json(&json!({
        "metadata": {"chains": ["ethereum"]},
        "abi": [
            {
                "type": "event",
                "name": "Deposit",
                "@isPrimary": true,
                "inputs": [
                    {"name": "account", "type": "address", "indexed": true},
                    {"name": "deposited", "type": "uint256"}
                ]
            },
            {
                "type": "event",
                "name": "Withdraw",
                "@isPrimary": true,
                "inputs": [
                    {"name": "account", "type": "address", "indexed": true},
                    {"name": "withdrawn", "type": "uint256"}
                ]
            }
        ]
    }))
    .unwrap();

    // the union schema carries both item-specific columns exactly once
    let names: Vec<&str> = transformer
        .schema()
        .columns()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert!(names.contains(&"deposited"));
    assert!(names.contains(&"withdrawn"));
    assert_eq!(names.iter().filter(|&&name| name == "account").count(), 1);

    let deposit_topic = transformer
        .abi()
        .event_by_signature("Deposit(address,uint256)")
        .unwrap()
        .hash()
        .to_string();

    let block = EthBlock::from_json(
        EvmChain::Ethereum,
        &block_doc(vec![json!({
            "address": "0xc0",
            "topics": [format!("0x{deposit_topic}"), word("11")],
            "data": word("64"),
            "logIndex": "0x0"
        })]),
    )
    .unwrap();

    let rows = transformer.transform(&block);
    assert_eq!(rows.len(), 1);
    // the missing column is explicitly null, not omitted
    assert_eq!(rows[0]["deposited"], json!(100));
    assert_eq!(rows[0]["withdrawn"], Value::Null);
}

#[test]
fn explode_reproduces_decoded_arrays_row_wise() {
    let transformer = SemanticTransformer::from_json(&json!({
        "metadata": {"chains": ["ethereum"]},
        "abi": [{
            "type": "event",
            "name": "Batch",
            "@isPrimary": true,
            "@explode": {"paths": ["ids", "amounts"]},
            "inputs": [
                {"name": "ids", "type": "uint256[]"},
                {"name": "amounts", "type": "uint256[]"}
            ]
        }]
    }))
    .unwrap();
    let topic = transformer.abi().primary_items()[0].hash().to_string();

    // ids [7, 8, 9], amounts [70, 80, 90]
    let mut data = "0x".to_string();
    data.push_str(&format!("{:0>64x}", 0x40));
    data.push_str(&format!("{:0>64x}", 0x40 + 0x20 * 4));
    data.push_str(&format!("{:0>64x}", 3));
    for id in [7u64, 8, 9] {
        data.push_str(&format!("{id:0>64x}"));
    }
    data.push_str(&format!("{:0>64x}", 3));
    for amount in [70u64, 80, 90] {
        data.push_str(&format!("{amount:0>64x}"));
    }

    let block = EthBlock::from_json(
        EvmChain::Ethereum,
        &block_doc(vec![json!({
            "address": "0xc0",
            "topics": [format!("0x{topic}")],
            "data": data,
            "logIndex": "0x0"
        })]),
    )
    .unwrap();

    let rows = transformer.transform(&block);
    assert_eq!(rows.len(), 3);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row["ids"], json!(7 + i as u64));
        assert_eq!(row["amounts"], json!(70 + 10 * i as u64));
        assert_eq!(row["explodeIndex"], json!(i));
        assert_eq!(row["transform_error"], Value::Null);
    }
}

#[test]
fn transfer_match_joins_prefixed_columns() {
    let transformer = SemanticTransformer::from_json(&json!({
        "metadata": {"chains": ["ethereum"]},
        "abi": [{
            "type": "event",
            "name": "Swap",
            "@isPrimary": true,
            "@matches": [{
                "type": "transfer",
                "prefix": "payment",
                "assert": "onlyOne",
                "predicates": [
                    {"type": "equal", "source": "maker", "matched": "fromAddress"}
                ]
            }],
            "inputs": [
                {"name": "maker", "type": "address", "indexed": true},
                {"name": "amount", "type": "uint256"}
            ]
        }]
    }))
    .unwrap();
    let swap_topic = transformer.abi().primary_items()[0].hash().to_string();

    // ERC-20 Transfer topic
    let transfer_topic = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

    let block = EthBlock::from_json(
        EvmChain::Ethereum,
        &block_doc(vec![
            json!({
                "address": "0xc0",
                "topics": [format!("0x{swap_topic}"), word("11")],
                "data": word("64"),
                "logIndex": "0x0"
            }),
            json!({
                "address": "0xe20",
                "topics": [transfer_topic, word("11"), word("22")],
                "data": word("c8"),
                "logIndex": "0x1"
            }),
        ]),
    )
    .unwrap();

    let rows = transformer.transform(&block);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(
        row["payment_fromAddress"],
        json!("0x0000000000000000000000000000000000000011")
    );
    assert_eq!(
        row["payment_toAddress"],
        json!("0x0000000000000000000000000000000000000022")
    );
    assert_eq!(row["payment_value"], json!(200));
    assert_eq!(row["payment_tokenType"], json!("Erc20"));
    assert_eq!(row["transform_error"], Value::Null);
}

#[test]
fn cardinality_violation_surfaces_as_transform_error() {
    let transformer = SemanticTransformer::from_json(&json!({
        "metadata": {"chains": ["ethereum"]},
        "abi": [{
            "type": "event",
            "name": "Swap",
            "@isPrimary": true,
            "@matches": [{
                "type": "transfer",
                "prefix": "payment",
                "assert": "onlyOne",
                "predicates": [
                    {"type": "equal", "source": "maker", "matched": "fromAddress"}
                ]
            }],
            "inputs": [
                {"name": "maker", "type": "address", "indexed": true},
                {"name": "amount", "type": "uint256"}
            ]
        }]
    }))
    .unwrap();
    let swap_topic = transformer.abi().primary_items()[0].hash().to_string();

    // no matching transfer in the transaction
    let block = EthBlock::from_json(
        EvmChain::Ethereum,
        &block_doc(vec![json!({
            "address": "0xc0",
            "topics": [format!("0x{swap_topic}"), word("11")],
            "data": word("64"),
            "logIndex": "0x0"
        })]),
    )
    .unwrap();

    let rows = transformer.transform(&block);
    assert_eq!(rows.len(), 1);
    let error = rows[0]["transform_error"].as_str().unwrap();
    assert!(error.contains("onlyOne"));
    // the row still materialized with its decoded columns
    assert_eq!(
        rows[0]["maker"],
        json!("0x0000000000000000000000000000000000000011")
    );
    // matched columns were never produced, so they pad to null
    assert_eq!(rows[0]["payment_value"], Value::Null);
}

#[test]
fn per_item_decode_failure_does_not_abort_the_batch() {
    let transformer = SemanticTransformer::from_json(&transfer_abi()).unwrap();
    let topic = transformer.abi().primary_items()[0].hash().to_string();

    let block = EthBlock::from_json(
        EvmChain::Ethereum,
        &block_doc(vec![
            json!({
                "address": "0xc0",
                "topics": [format!("0x{topic}"), word("11"), word("22")],
                "data": "0x01",  // truncated, undecodable
                "logIndex": "0x0"
            }),
            json!({
                "address": "0xc0",
                "topics": [format!("0x{topic}"), word("11"), word("22")],
                "data": word("64"),
                "logIndex": "0x1"
            }),
        ]),
    )
    .unwrap();

    let rows = transformer.transform(&block);
    assert_eq!(rows.len(), 2);

    let broken = &rows[0];
    assert!(broken["transform_error"].is_string());
    assert_eq!(broken["value"], Value::Null);
    // metadata columns survive the decode failure
    assert_eq!(broken["internalIndex"], json!("0"));

    let healthy = &rows[1];
    assert_eq!(healthy["transform_error"], Value::Null);
    assert_eq!(healthy["value"], json!(100));
}

#[test]
fn explode_with_many_match_fails_at_construction() {
    let result = SemanticTransformer::from_json(&json!({
        "metadata": {"chains": ["ethereum"]},
        "abi": [{
            "type": "function",
            "name": "fill",
            "@isPrimary": true,
            "@explode": {"paths": ["amounts"]},
            "@matches": [{
                "type": "transfer",
                "prefix": "t",
                "assert": "many",
                "predicates": []
            }],
            "inputs": [{"name": "amounts", "type": "uint256[]"}],
            "outputs": []
        }]
    }));
    assert!(result.is_err());
}

#[test]
fn function_trace_pipeline_decodes_inputs_and_outputs() {
    let transformer = SemanticTransformer::from_json(&json!({
        "metadata": {"chains": ["ethereum"]},
        "abi": [{
            "type": "function",
            "name": "swapExact",
            "@isPrimary": true,
            "inputs": [
                {"name": "amountIn", "type": "uint256"}
            ],
            "outputs": [
                {"name": "amountOut", "type": "uint256"}
            ]
        }]
    }))
    .unwrap();
    let selector = transformer.abi().primary_items()[0].hash().to_string();

    let block = EthBlock::from_json(
        EvmChain::Ethereum,
        &json!({
            "block": {
                "number": "0x10",
                "timestamp": "0x64",
                "hash": "0xb1",
                "transactions": [{"hash": "0xt1", "from": "0xf1", "to": "0xa1"}]
            },
            "receipts": [{
                "transactionHash": "0xt1",
                "status": "0x1",
                "gasUsed": "0x5208",
                "logs": []
            }],
            "traces": [{
                "type": "call",
                "transactionHash": "0xt1",
                "traceAddress": [],
                "action": {
                    "from": "0xf1",
                    "to": "0xa1",
                    "callType": "call",
                    "input": format!("0x{selector}{:0>64}", "64")
                },
                "result": {
                    "output": word("c8"),
                    "gasUsed": "0x5208"
                }
            }]
        }),
    )
    .unwrap();

    let rows = transformer.transform(&block);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["amountIn"], json!(100));
    assert_eq!(rows[0]["amountOut"], json!(200));
    assert_eq!(rows[0]["itemType"], json!("function"));
    // the root call's trace path is empty
    assert_eq!(rows[0]["internalIndex"], json!(""));
}
