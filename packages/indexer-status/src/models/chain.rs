use serde::{Deserialize, Serialize};

/// A monitored chain as the polling engine sees it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub chain_id: u64,
    pub name: String,
    /// Endpoint used to read the chain head; can be overridden at runtime
    pub rpc_url: String,
    /// Block the indexer subscription started from, zero point of the percentage
    pub start_block: u64,
}

impl Chain {
    pub fn new(chain_id: u64, name: impl Into<String>, rpc_url: impl Into<String>, start_block: u64) -> Self {
        Self {
            chain_id,
            name: name.into(),
            rpc_url: rpc_url.into(),
            start_block,
        }
    }
}
