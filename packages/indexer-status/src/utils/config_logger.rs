use tracing::info;

use crate::config::Config;

pub fn log_config(config: &Config) {
    info!(
        "Config settings: indexer_url={}, refresh_interval={}s, request_timeout={}s, chains_file={}",
        config.indexer_url,
        config.refresh_interval,
        config.request_timeout,
        config.chains_file.display()
    );

    if !config.excluded_chain_ids.is_empty() {
        info!("Excluding chain ids {:?}", config.excluded_chain_ids);
    }
}
