use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::FetchError;

/// Source of the height an indexer has processed for a chain
#[async_trait]
pub trait IndexedHeightSource: Send + Sync {
    /// `Ok(None)` when the indexer has no subscription for the chain yet
    async fn indexed_block(&self, indexer_url: &str, chain_id: u64) -> Result<Option<u64>, FetchError>;
}

/// Queries the indexer's GraphQL endpoint at `{indexer_url}/graphql`
pub struct GraphQlIndexerClient {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<SubscriptionsData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorMessage>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionsData {
    subscriptions: Vec<SubscriptionRow>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionRow {
    #[serde(rename = "indexedToBlock", default)]
    indexed_to_block: Option<BlockHeight>,
}

/// `BigInt` columns come back as strings, plain integers as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BlockHeight {
    Number(u64),
    Text(String),
}

impl BlockHeight {
    fn into_u64(self) -> Result<u64, FetchError> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| FetchError::Parse(format!("indexedToBlock `{}` is not a block number", s))),
        }
    }
}

pub fn subscription_query(chain_id: u64) -> String {
    format!(
        "query {{ subscriptions(first: 1, filter: {{chainId: {{equalTo: {}}}}}) {{ indexedToBlock }} }}",
        chain_id
    )
}

impl GraphQlIndexerClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, indexer_url: &str, chain_id: u64) -> Result<Option<u64>, FetchError> {
        let endpoint = format!("{}/graphql", indexer_url);
        let response = self
            .client
            .post(&endpoint)
            .json(&json!({ "query": subscription_query(chain_id) }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        let parsed: GraphQlResponse = serde_json::from_str(&body)?;
        let errors = parsed.errors.unwrap_or_default();

        let data = match parsed.data {
            Some(data) => data,
            None if !errors.is_empty() => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
                return Err(FetchError::GraphQl(messages.join("; ")));
            }
            None => return Err(FetchError::Parse("response has no data".to_string())),
        };

        if !errors.is_empty() {
            warn!("Indexer returned {} GraphQL errors alongside data for chain {}", errors.len(), chain_id);
        }

        match data.subscriptions.into_iter().next() {
            Some(SubscriptionRow { indexed_to_block: Some(height) }) => height.into_u64().map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl IndexedHeightSource for GraphQlIndexerClient {
    async fn indexed_block(&self, indexer_url: &str, chain_id: u64) -> Result<Option<u64>, FetchError> {
        match self.fetch(indexer_url, chain_id).await {
            Ok(Some(block)) => {
                debug!("Indexer at {} processed chain {} up to block {}", indexer_url, chain_id, block);
                Ok(Some(block))
            }
            Ok(None) => {
                debug!("Indexer at {} has no subscription for chain {}", indexer_url, chain_id);
                Ok(None)
            }
            Err(e) => {
                warn!("Error fetching the indexed block number for chain {}: {}", chain_id, e);
                Err(e)
            }
        }
    }
}
