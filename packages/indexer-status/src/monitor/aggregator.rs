use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

use crate::config::PollingConfig;
use crate::models::{Chain, ProgressRecord};

use super::{BlockHeightSource, IndexedHeightSource};

/// Everything a sweep reads, captured when the sweep starts
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub sequence: u64,
    /// Configuration generation the sweep was started under
    pub epoch: u64,
    pub config: PollingConfig,
    pub chains: Vec<Chain>,
}

/// Turns a chain into a progress record by reading both heights
#[derive(Clone)]
pub struct Aggregator {
    rpc: Arc<dyn BlockHeightSource>,
    indexer: Arc<dyn IndexedHeightSource>,
}

impl Aggregator {
    pub fn new(rpc: Arc<dyn BlockHeightSource>, indexer: Arc<dyn IndexedHeightSource>) -> Self {
        Self { rpc, indexer }
    }

    /// Fetch both heights concurrently; a failure on one side never affects the other.
    pub async fn progress(&self, chain: &Chain, indexer_url: &str) -> ProgressRecord {
        let (latest, indexed) = tokio::join!(
            self.rpc.latest_block(&chain.rpc_url),
            self.indexer.indexed_block(indexer_url, chain.chain_id),
        );

        ProgressRecord::from_fetches(
            chain,
            latest.map_err(|e| e.to_string()),
            indexed.map_err(|e| e.to_string()),
        )
    }

    /// One record per chain of the plan, in plan order, once every chain has settled
    pub async fn sweep(&self, plan: &SweepPlan) -> Vec<ProgressRecord> {
        debug!("Sweep {} started for {} chains", plan.sequence, plan.chains.len());
        let indexer_url = plan.config.indexer_url();
        join_all(plan.chains.iter().map(|chain| self.progress(chain, indexer_url))).await
    }
}
