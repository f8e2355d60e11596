use async_trait::async_trait;
use ethers::types::U64;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::FetchError;

/// Source of a chain's current head height
#[async_trait]
pub trait BlockHeightSource: Send + Sync {
    async fn latest_block(&self, rpc_url: &str) -> Result<u64, FetchError>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<U64>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// Reads the head with `eth_blockNumber` over HTTP JSON-RPC
pub struct RpcBlockFetcher {
    /// Shared client, carries the per-request timeout
    client: reqwest::Client,
}

impl RpcBlockFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, rpc_url: &str) -> Result<u64, FetchError> {
        let url = Url::parse(rpc_url.trim()).map_err(|e| FetchError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: e.to_string(),
        })?;
        let response = self
            .client
            .post(url)
            .json(&json!({
                "jsonrpc": "2.0",
                "method": "eth_blockNumber",
                "params": [],
                "id": 1
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        let parsed: JsonRpcResponse = serde_json::from_str(&body)?;
        match (parsed.result, parsed.error) {
            (_, Some(error)) => Err(FetchError::JsonRpc(format!("({}) {}", error.code, error.message))),
            (Some(block_number), None) => Ok(block_number.as_u64()),
            (None, None) => Err(FetchError::Parse("response has no result".to_string())),
        }
    }
}

#[async_trait]
impl BlockHeightSource for RpcBlockFetcher {
    async fn latest_block(&self, rpc_url: &str) -> Result<u64, FetchError> {
        match self.fetch(rpc_url).await {
            Ok(block_number) => {
                debug!("Latest block at {}: {}", rpc_url, block_number);
                Ok(block_number)
            }
            Err(e) => {
                warn!("Error fetching the latest block number from {}: {}", rpc_url, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{rpc_endpoint, serve, unreachable_url};
    use axum::{http::StatusCode, routing::post, Router};

    fn fetcher() -> RpcBlockFetcher {
        RpcBlockFetcher::new(reqwest::Client::new())
    }

    #[tokio::test]
    async fn parses_hex_block_number() {
        let url = rpc_endpoint(json!("0x7d0")).await;

        assert_eq!(fetcher().latest_block(&url).await.unwrap(), 2000);
    }

    #[tokio::test]
    async fn non_hex_result_is_an_error() {
        let url = rpc_endpoint(json!("two thousand")).await;

        let err = fetcher().latest_block(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn json_rpc_error_object_is_an_error() {
        let router = Router::new().route(
            "/",
            post(|| async {
                axum::Json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {"code": -32005, "message": "rate limited"}
                }))
            }),
        );
        let url = serve(router).await;

        let err = fetcher().latest_block(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::JsonRpc(_)), "{:?}", err);
        assert_eq!(err.to_string(), "JSON-RPC error: (-32005) rate limited");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_even_with_a_result() {
        let router = Router::new().route(
            "/",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x7d0"})),
                )
            }),
        );
        let url = serve(router).await;

        let err = fetcher().latest_block(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(_)), "{:?}", err);
        assert_eq!(err.to_string(), "HTTP error! Status: 500 Internal Server Error");
    }

    #[tokio::test]
    async fn plain_text_failure_reports_the_status() {
        let router = Router::new().route(
            "/",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable") }),
        );
        let url = serve(router).await;

        let err = fetcher().latest_block(&url).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP error! Status: 503 Service Unavailable");
    }

    #[tokio::test]
    async fn missing_result_is_an_error() {
        let router = Router::new().route(
            "/",
            post(|| async { axum::Json(json!({"jsonrpc": "2.0", "id": 1})) }),
        );
        let url = serve(router).await;

        let err = fetcher().latest_block(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let url = unreachable_url().await;

        let err = fetcher().latest_block(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn malformed_url_is_an_error() {
        let err = fetcher().latest_block("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }), "{:?}", err);
    }
}
