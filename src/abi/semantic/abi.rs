//! The semantic ABI registry: parsed items, lookups, and validation

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::abi::item::ItemKind;
use crate::abi::semantic::expressions::Expressions;
use crate::abi::semantic::item::SemanticAbiItem;
use crate::abi::semantic::matches::MatchKind;
use crate::chain::EvmChain;
use crate::convert::normalize_hex;
use crate::error::AbiError;

/// A parsed semantic ABI document: the decode/transform configuration for
/// one contract across one or more chains. Built once and shared read-only
/// across every block transform.
#[derive(Debug)]
pub struct SemanticAbi {
    /// Chains this ABI is deployed on
    pub chains: HashSet<EvmChain>,
    /// Contract addresses to filter on; empty means no filtering
    pub contract_addresses: HashSet<String>,
    /// Reserved table-level expressions
    pub expressions: Expressions,

    events_by_hash: HashMap<String, Arc<SemanticAbiItem>>,
    functions_by_hash: HashMap<String, Arc<SemanticAbiItem>>,
    events_by_signature: HashMap<String, Arc<SemanticAbiItem>>,
    functions_by_signature: HashMap<String, Arc<SemanticAbiItem>>,
    /// Hashes in declaration order, events then functions, for
    /// deterministic pipeline and schema ordering
    event_order: Vec<String>,
    function_order: Vec<String>,
}

impl SemanticAbi {
    pub fn from_json(abi_json: &Value) -> Result<SemanticAbi, AbiError> {
        let metadata = abi_json
            .get("metadata")
            .ok_or_else(|| AbiError::Invalid("missing 'metadata' section".to_string()))?;

        let chain_names = metadata
            .get("chains")
            .and_then(Value::as_array)
            .filter(|chains| !chains.is_empty())
            .ok_or_else(|| AbiError::Invalid("No chains specified in metadata".to_string()))?;
        let chains = chain_names
            .iter()
            .map(|chain| {
                chain
                    .as_str()
                    .ok_or_else(|| AbiError::Invalid("chain names must be strings".to_string()))
                    .and_then(EvmChain::parse)
            })
            .collect::<Result<HashSet<_>, _>>()?;

        let contract_addresses = metadata
            .get("contractAddresses")
            .and_then(Value::as_array)
            .map(|addresses| {
                addresses
                    .iter()
                    .map(|address| {
                        address.as_str().map(normalize_hex).ok_or_else(|| {
                            AbiError::Invalid("contract addresses must be strings".to_string())
                        })
                    })
                    .collect::<Result<HashSet<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let expressions = metadata
            .get("expressions")
            .map(Expressions::from_json)
            .transpose()?
            .unwrap_or_default();

        let items = abi_json
            .get("abi")
            .and_then(Value::as_array)
            .ok_or_else(|| AbiError::Invalid("missing 'abi' section".to_string()))?;

        let mut abi = SemanticAbi {
            chains,
            contract_addresses,
            expressions,
            events_by_hash: HashMap::new(),
            functions_by_hash: HashMap::new(),
            events_by_signature: HashMap::new(),
            functions_by_signature: HashMap::new(),
            event_order: Vec::new(),
            function_order: Vec::new(),
        };

        let mut has_primary = false;
        for item_json in items {
            // skip if there are no inputs
            if item_json.get("inputs").is_none() {
                continue;
            }

            let kind = ItemKind::parse(
                item_json
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AbiError::Invalid("ABI item is missing a type".to_string()))?,
            )?;

            let item = match kind {
                ItemKind::Event => {
                    Arc::new(SemanticAbiItem::event_from_json(item_json)?)
                }
                ItemKind::Function => {
                    Arc::new(SemanticAbiItem::function_from_json(item_json)?)
                }
                // other item kinds carry no decodable occurrences
                _ => continue,
            };

            let (by_hash, by_signature, order) = if item.is_event() {
                (
                    &mut abi.events_by_hash,
                    &mut abi.events_by_signature,
                    &mut abi.event_order,
                )
            } else {
                (
                    &mut abi.functions_by_hash,
                    &mut abi.functions_by_signature,
                    &mut abi.function_order,
                )
            };

            if let Some(existing) = by_hash.get(item.hash()) {
                return Err(AbiError::Invalid(format!(
                    "Multiple items with the same topic: {} and {}",
                    item.signature(),
                    existing.signature()
                )));
            }
            has_primary = has_primary || item.properties().is_primary;
            order.push(item.hash().to_string());
            by_hash.insert(item.hash().to_string(), item.clone());
            by_signature.insert(item.signature().to_string(), item);
        }

        if !has_primary {
            return Err(AbiError::Invalid(
                "At least one primary ABI item must be specified".to_string(),
            ));
        }

        abi.validate_matches()?;
        Ok(abi)
    }

    /// Parse a semantic ABI from its JSON text
    pub fn from_str(text: &str) -> Result<SemanticAbi, AbiError> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| AbiError::Invalid(format!("malformed ABI document: {e}")))?;
        SemanticAbi::from_json(&document)
    }

    /// Fail closed on match declarations that cannot be satisfied
    fn validate_matches(&self) -> Result<(), AbiError> {
        for item in self.items() {
            let Some(matches) = &item.properties().matches else {
                continue;
            };

            for item_match in &matches.matches {
                match item_match.kind {
                    MatchKind::Event => {
                        let signature = item_match.signature.as_deref().unwrap_or_default();
                        if !self.events_by_signature.contains_key(signature) {
                            return Err(AbiError::Invalid(format!(
                                "Unknown event signature to match: {signature}"
                            )));
                        }
                    }
                    MatchKind::Function => {
                        let signature = item_match.signature.as_deref().unwrap_or_default();
                        if !self.functions_by_signature.contains_key(signature) {
                            return Err(AbiError::Invalid(format!(
                                "Unknown function signature to match: {signature}"
                            )));
                        }
                    }
                    MatchKind::Transfer => {}
                }

                if item_match.signature.as_deref() == Some(item.signature()) {
                    return Err(AbiError::Invalid(format!(
                        "Cannot match an item to itself: {}",
                        item.signature()
                    )));
                }

                for parameters in item.all_parameters() {
                    if let Some(parameter) = parameters.parameter(&item_match.prefix) {
                        if parameter.parameter.is_tuple() {
                            return Err(AbiError::Invalid(format!(
                                "Prefix \"{}\" cannot be the name of a tuple parameter.",
                                item_match.prefix
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    pub fn event_by_hash(&self, hash: &str) -> Option<&Arc<SemanticAbiItem>> {
        self.events_by_hash.get(hash)
    }

    pub fn function_by_hash(&self, hash: &str) -> Option<&Arc<SemanticAbiItem>> {
        self.functions_by_hash.get(hash)
    }

    pub fn event_by_signature(&self, signature: &str) -> Option<&Arc<SemanticAbiItem>> {
        self.events_by_signature.get(signature)
    }

    pub fn function_by_signature(&self, signature: &str) -> Option<&Arc<SemanticAbiItem>> {
        self.functions_by_signature.get(signature)
    }

    /// All items, events first, in declaration order
    pub fn items(&self) -> impl Iterator<Item = &Arc<SemanticAbiItem>> {
        self.event_order
            .iter()
            .map(|hash| &self.events_by_hash[hash])
            .chain(
                self.function_order
                    .iter()
                    .map(|hash| &self.functions_by_hash[hash]),
            )
    }

    /// Primary items, events first, in declaration order
    pub fn primary_items(&self) -> Vec<Arc<SemanticAbiItem>> {
        self.items()
            .filter(|item| item.properties().is_primary)
            .cloned()
            .collect()
    }

    /// Whether a log or trace from this contract address should be
    /// transformed at all
    pub fn should_consider(&self, contract_address: &str) -> bool {
        self.contract_addresses.is_empty()
            || self
                .contract_addresses
                .contains(&normalize_hex(contract_address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_abi(extra_items: Value) -> Value {
        let mut items = vec![json!({
            "type": "event",
            "name": "Ping",
            "@isPrimary": true,
            "inputs": [{"name": "value", "type": "uint256"}]
        })];
        if let Value::Array(extra) = extra_items {
            items.extend(extra);
        }
        json!({
            "metadata": {"chains": ["ethereum"]},
            "abi": items
        })
    }

    #[test]
    fn test_minimal_abi_parses() {
        let abi = SemanticAbi::from_json(&minimal_abi(json!([]))).unwrap();
        assert!(abi.chains.contains(&EvmChain::Ethereum));
        assert_eq!(abi.primary_items().len(), 1);
    }

    #[test]
    fn test_no_chains_rejected() {
        let result = SemanticAbi::from_json(&json!({
            "metadata": {"chains": []},
            "abi": []
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_no_primary_rejected() {
        let result = SemanticAbi::from_json(&json!({
            "metadata": {"chains": ["ethereum"]},
            "abi": [{
                "type": "event",
                "name": "Ping",
                "inputs": [{"name": "value", "type": "uint256"}]
            }]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_event_hash_rejected() {
        let result = SemanticAbi::from_json(&minimal_abi(json!([{
            "type": "event",
            "name": "Ping",
            "inputs": [{"name": "value", "type": "uint256"}]
        }])));
        assert!(result.is_err());
    }

    #[test]
    fn test_unresolved_match_target_rejected() {
        let result = SemanticAbi::from_json(&json!({
            "metadata": {"chains": ["ethereum"]},
            "abi": [{
                "type": "event",
                "name": "Ping",
                "@isPrimary": true,
                "@matches": [{
                    "type": "event",
                    "signature": "Missing(uint256)",
                    "prefix": "other",
                    "assert": "onlyOne",
                    "predicates": []
                }],
                "inputs": [{"name": "value", "type": "uint256"}]
            }]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_self_match_rejected() {
        let result = SemanticAbi::from_json(&json!({
            "metadata": {"chains": ["ethereum"]},
            "abi": [{
                "type": "event",
                "name": "Ping",
                "@isPrimary": true,
                "@matches": [{
                    "type": "event",
                    "signature": "Ping(uint256)",
                    "prefix": "other",
                    "assert": "onlyOne",
                    "predicates": []
                }],
                "inputs": [{"name": "value", "type": "uint256"}]
            }]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_prefix_colliding_with_tuple_rejected() {
        let result = SemanticAbi::from_json(&json!({
            "metadata": {"chains": ["ethereum"]},
            "abi": [
                {
                    "type": "event",
                    "name": "Other",
                    "inputs": [{"name": "value", "type": "uint256"}]
                },
                {
                    "type": "event",
                    "name": "Ping",
                    "@isPrimary": true,
                    "@matches": [{
                        "type": "event",
                        "signature": "Other(uint256)",
                        "prefix": "order",
                        "assert": "onlyOne",
                        "predicates": []
                    }],
                    "inputs": [{"name": "order", "type": "tuple", "components": [
                        {"name": "maker", "type": "address"}
                    ]}]
                }
            ]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_contract_address_filter() {
        let abi = SemanticAbi::from_json(&json!({
            "metadata": {
                "chains": ["ethereum"],
                "contractAddresses": ["0xDAC17F958D2ee523a2206206994597C13D831ec7"]
            },
            "abi": [{
                "type": "event",
                "name": "Ping",
                "@isPrimary": true,
                "inputs": [{"name": "value", "type": "uint256"}]
            }]
        }))
        .unwrap();

        assert!(abi.should_consider("0xdac17f958d2ee523a2206206994597c13d831ec7"));
        assert!(abi.should_consider("0xDAC17F958D2EE523A2206206994597C13D831EC7"));
        assert!(!abi.should_consider("0x0000000000000000000000000000000000000000"));
    }

    #[test]
    fn test_items_keep_declaration_order() {
        let abi = SemanticAbi::from_json(&json!({
            "metadata": {"chains": ["ethereum"]},
            "abi": [
                {
                    "type": "function",
                    "name": "swap",
                    "@isPrimary": true,
                    "inputs": [{"name": "amount", "type": "uint256"}],
                    "outputs": []
                },
                {
                    "type": "event",
                    "name": "Ping",
                    "@isPrimary": true,
                    "inputs": [{"name": "value", "type": "uint256"}]
                }
            ]
        }))
        .unwrap();

        // events come first regardless of document order
        let names: Vec<&str> = abi.primary_items().iter().map(|i| {
            if i.is_event() { "event" } else { "function" }
        }).collect();
        assert_eq!(names, vec!["event", "function"]);
    }
}
