//! Supported EVM chains

use crate::error::AbiError;

/// The EVM-based chains a semantic ABI may declare in its metadata. Each
/// chain carries the sentinel contract address used for its native token,
/// since base coins have no ERC-20 contract of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvmChain {
    Arbitrum,
    AvalancheC,
    Base,
    Bnb,
    Ethereum,
    Optimism,
    Polygon,
    PolygonZkevm,
    Tron,
    ZksyncEra,
    Stability,
    StabilityTestnet,
}

/// name <-> variant lookup table, built once at startup
const CHAINS: &[(&str, EvmChain, &str)] = &[
    (
        "arbitrum",
        EvmChain::Arbitrum,
        "0x1111111111111111111111111111111111111111",
    ),
    // AVAX address on the c-chain
    (
        "avalanche_c",
        EvmChain::AvalancheC,
        "0xb31f66aa3c1e785363f0875a1b74e27b85fd66c7",
    ),
    (
        "base",
        EvmChain::Base,
        "0x1111111111111111111111111111111111111111",
    ),
    (
        "bnb",
        EvmChain::Bnb,
        "0xb8c77482e45f1f44de1745f52c74426c631bdd52",
    ),
    (
        "ethereum",
        EvmChain::Ethereum,
        "0x1111111111111111111111111111111111111111",
    ),
    (
        "optimism",
        EvmChain::Optimism,
        "0x1111111111111111111111111111111111111111",
    ),
    // Polygon networks use matic from the polygon-pos chain
    (
        "polygon",
        EvmChain::Polygon,
        "0x0000000000000000000000000000000000001010",
    ),
    (
        "polygon_zkevm",
        EvmChain::PolygonZkevm,
        "0x0000000000000000000000000000000000001010",
    ),
    (
        "tron",
        EvmChain::Tron,
        "0x2222222222222222222222222222222222222222",
    ),
    (
        "zksync_era",
        EvmChain::ZksyncEra,
        "0x1111111111111111111111111111111111111111",
    ),
    (
        "stability",
        EvmChain::Stability,
        "0x1111111111111111111111111111111111111111",
    ),
    (
        "stability_testnet",
        EvmChain::StabilityTestnet,
        "0x1111111111111111111111111111111111111111",
    ),
];

impl EvmChain {
    /// Resolve a chain by its metadata name
    pub fn parse(name: &str) -> Result<EvmChain, AbiError> {
        CHAINS
            .iter()
            .find(|(chain_name, _, _)| *chain_name == name)
            .map(|(_, chain, _)| *chain)
            .ok_or_else(|| AbiError::UnknownChain(name.to_string()))
    }

    /// The metadata name of this chain
    pub fn name(&self) -> &'static str {
        CHAINS
            .iter()
            .find(|(_, chain, _)| chain == self)
            .map(|(name, _, _)| *name)
            .expect("every chain variant has a table entry")
    }

    /// Sentinel contract address for the chain's native token
    pub fn native_token_address(&self) -> &'static str {
        CHAINS
            .iter()
            .find(|(_, chain, _)| chain == self)
            .map(|(_, _, address)| *address)
            .expect("every chain variant has a table entry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for (name, chain, _) in CHAINS {
            assert_eq!(EvmChain::parse(name).unwrap(), *chain);
            assert_eq!(chain.name(), *name);
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            EvmChain::parse("dogechain"),
            Err(AbiError::UnknownChain(_))
        ));
    }

    #[test]
    fn test_native_token_address() {
        assert_eq!(
            EvmChain::Polygon.native_token_address(),
            "0x0000000000000000000000000000000000001010"
        );
    }
}
