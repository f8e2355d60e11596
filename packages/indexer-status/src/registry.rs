//! Adapts chain directory entries into the chains the monitor polls.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::models::Chain;

/// One entry of the chain directory
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub id: u64,
    pub pretty_name: String,
    pub rpc: String,
    #[serde(default)]
    pub subscriptions: Vec<DirectorySubscription>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySubscription {
    #[serde(default)]
    pub from_block: Option<u64>,
}

/// Read a chain directory JSON file
pub fn load_directory(path: &Path) -> Result<Vec<DirectoryEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chain directory {}", path.display()))?;
    let entries: Vec<DirectoryEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse chain directory {}", path.display()))?;
    info!("Loaded {} chain directory entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Keep directory order, drop excluded ids, start from the first subscription's block
pub fn chains_from_directory(entries: &[DirectoryEntry], excluded_chain_ids: &[u64]) -> Vec<Chain> {
    entries
        .iter()
        .filter(|entry| {
            let excluded = excluded_chain_ids.contains(&entry.id);
            if excluded {
                debug!("Skipping excluded chain {} ({})", entry.pretty_name, entry.id);
            }
            !excluded
        })
        .map(|entry| {
            let start_block = entry
                .subscriptions
                .first()
                .and_then(|subscription| subscription.from_block)
                .unwrap_or(0);
            Chain::new(entry.id, entry.pretty_name.clone(), entry.rpc.clone(), start_block)
        })
        .collect()
}
