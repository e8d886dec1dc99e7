//! Network presets and resolved selector options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SelectorError;

/// Well-known networks with built-in endpoint presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Mainnet,
    Testnet,
    Betanet,
}

impl NetworkId {
    pub const ALL: [NetworkId; 3] = [NetworkId::Mainnet, NetworkId::Testnet, NetworkId::Betanet];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkId::Mainnet => "mainnet",
            NetworkId::Testnet => "testnet",
            NetworkId::Betanet => "betanet",
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkId {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(NetworkId::Mainnet),
            "testnet" => Ok(NetworkId::Testnet),
            "betanet" => Ok(NetworkId::Betanet),
            _ => Err(SelectorError::UnknownNetwork(s.to_string())),
        }
    }
}

/// Endpoints of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub network_id: String,
    pub node_url: String,
    pub helper_url: String,
    pub explorer_url: String,
    pub indexer_url: String,
}

impl Network {
    /// Endpoint preset for a well-known network.
    pub fn preset(id: NetworkId) -> Self {
        let (node_url, helper_url, explorer_url, indexer_url) = match id {
            NetworkId::Mainnet => (
                "https://rpc.mainnet.near.org",
                "https://helper.mainnet.near.org",
                "https://explorer.near.org",
                "https://api.kitwallet.app",
            ),
            NetworkId::Testnet => (
                "https://rpc.testnet.near.org",
                "https://helper.testnet.near.org",
                "https://explorer.testnet.near.org",
                "https://testnet-api.kitwallet.app",
            ),
            // No public indexer for betanet yet.
            NetworkId::Betanet => (
                "https://rpc.betanet.near.org",
                "https://helper.betanet.near.org",
                "https://explorer.betanet.near.org",
                "",
            ),
        };

        Self {
            network_id: id.as_str().to_string(),
            node_url: node_url.to_string(),
            helper_url: helper_url.to_string(),
            explorer_url: explorer_url.to_string(),
            indexer_url: indexer_url.to_string(),
        }
    }
}

/// Either a preset id or a fully custom endpoint set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSelection {
    Preset(NetworkId),
    Custom(Network),
}

impl From<NetworkId> for NetworkSelection {
    fn from(id: NetworkId) -> Self {
        NetworkSelection::Preset(id)
    }
}

impl From<Network> for NetworkSelection {
    fn from(network: Network) -> Self {
        NetworkSelection::Custom(network)
    }
}

/// Resolve a selection to concrete endpoints.
pub fn resolve_network(selection: NetworkSelection) -> Network {
    match selection {
        NetworkSelection::Preset(id) => Network::preset(id),
        NetworkSelection::Custom(network) => network,
    }
}

/// Options shared with every wallet module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub network: Network,
    /// Log every session transition at `info` instead of `debug`.
    pub debug: bool,
}

impl Options {
    pub fn new(network: impl Into<NetworkSelection>) -> Self {
        Self {
            network: resolve_network(network.into()),
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
