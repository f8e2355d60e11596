//! In-process HTTP endpoints and canned height sources for tests.

use async_trait::async_trait;
use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

use crate::monitor::{BlockHeightSource, FetchError, IndexedHeightSource};

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind should succeed");
    let addr = listener.local_addr().expect("Listener has an address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server should run");
    });
    format!("http://{}", addr)
}

/// A local URL nothing listens on
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind should succeed");
    let addr = listener.local_addr().expect("Listener has an address");
    drop(listener);
    format!("http://{}", addr)
}

/// JSON-RPC endpoint answering every call with `result`
pub async fn rpc_endpoint(result: Value) -> String {
    let router = Router::new().route(
        "/",
        post(move |Json(request): Json<Value>| {
            let result = result.clone();
            async move {
                assert_eq!(request["method"], "eth_blockNumber");
                assert_eq!(request["params"], json!([]));
                Json(json!({"jsonrpc": "2.0", "id": request["id"], "result": result}))
            }
        }),
    );
    serve(router).await
}

/// Indexer whose `/graphql` answers every query with `body`
pub async fn graphql_endpoint(body: Value) -> String {
    let router = Router::new().route(
        "/graphql",
        post(move || {
            let body = body.clone();
            async move { Json(body) }
        }),
    );
    serve(router).await
}

/// Canned head heights keyed by RPC URL; unknown URLs fail with 503
#[derive(Default)]
pub struct FakeRpc {
    heads: HashMap<String, Option<u64>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(mut self, rpc_url: &str, head: u64) -> Self {
        self.heads.insert(rpc_url.to_string(), Some(head));
        self
    }

    pub fn with_failure(mut self, rpc_url: &str) -> Self {
        self.heads.insert(rpc_url.to_string(), None);
        self
    }

    pub fn with_delay(mut self, rpc_url: &str, delay: Duration) -> Self {
        self.delays.insert(rpc_url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockHeightSource for FakeRpc {
    async fn latest_block(&self, rpc_url: &str) -> Result<u64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(rpc_url) {
            tokio::time::sleep(*delay).await;
        }
        match self.heads.get(rpc_url) {
            Some(Some(head)) => Ok(*head),
            _ => Err(FetchError::HttpStatus(reqwest::StatusCode::SERVICE_UNAVAILABLE)),
        }
    }
}

/// Canned indexed heights keyed by indexer URL and chain id; unknown indexers fail with 502
#[derive(Default)]
pub struct FakeIndexer {
    heights: HashMap<String, HashMap<u64, u64>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl FakeIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_height(mut self, indexer_url: &str, chain_id: u64, height: u64) -> Self {
        self.heights
            .entry(indexer_url.to_string())
            .or_default()
            .insert(chain_id, height);
        self
    }

    /// Indexer that answers, but tracks none of the chains
    pub fn with_empty(mut self, indexer_url: &str) -> Self {
        self.heights.entry(indexer_url.to_string()).or_default();
        self
    }

    pub fn with_delay(mut self, indexer_url: &str, delay: Duration) -> Self {
        self.delays.insert(indexer_url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexedHeightSource for FakeIndexer {
    async fn indexed_block(&self, indexer_url: &str, chain_id: u64) -> Result<Option<u64>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(indexer_url) {
            tokio::time::sleep(*delay).await;
        }
        match self.heights.get(indexer_url) {
            Some(chains) => Ok(chains.get(&chain_id).copied()),
            None => Err(FetchError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY)),
        }
    }
}
