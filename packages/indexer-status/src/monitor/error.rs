use thiserror::Error;

/// Failure to read a height from the chain RPC or the indexer
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error! Status: {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
