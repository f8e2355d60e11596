use colored::Colorize;
use std::fmt::Write;

use crate::models::ProgressRecord;
use crate::monitor::Snapshot;

const BAR_WIDTH: usize = 40;

/// Render a snapshot as a colored status board, least synced chains first
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "=".repeat(80).bright_blue());
    let _ = writeln!(out, "{}", "INDEXER CHAIN STATUS".bold().bright_green());
    let _ = writeln!(
        out,
        "{} {}  {} every {}s",
        "Indexer:".yellow().bold(),
        snapshot.config.indexer_url().cyan(),
        "Refresh:".yellow().bold(),
        snapshot.config.refresh_interval_secs()
    );
    match snapshot.completed_at {
        Some(at) => {
            let _ = writeln!(
                out,
                "{}",
                format!("Sweep #{} at {}", snapshot.sweep, at.format("%Y-%m-%d %H:%M:%S UTC")).bright_black()
            );
        }
        None => {
            let _ = writeln!(out, "{}", "Waiting for the first sweep...".bright_yellow());
        }
    }
    let _ = writeln!(out, "{}", "=".repeat(80).bright_blue());

    for record in sorted_by_progress(&snapshot.records) {
        out.push('\n');
        render_record(&mut out, record);
    }

    out
}

/// One JSON line per snapshot
pub fn render_json(snapshot: &Snapshot) -> serde_json::Result<String> {
    serde_json::to_string(snapshot)
}

fn sorted_by_progress(records: &[ProgressRecord]) -> Vec<&ProgressRecord> {
    let mut sorted: Vec<&ProgressRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));
    sorted
}

fn render_record(out: &mut String, record: &ProgressRecord) {
    let _ = writeln!(out, "{}", format!("{} ({})", record.name, record.chain_id).bold());

    match &record.rpc_error {
        Some(error) => {
            let _ = writeln!(
                out,
                "  {} {}",
                format!("RPC Error: {}", error).red(),
                format!("(override with `rpc {} <url>`)", record.chain_id).bright_black()
            );
        }
        None => {
            let latest = record
                .latest_block
                .map(|b| b.to_string())
                .unwrap_or_else(|| "pending".to_string());
            let _ = writeln!(out, "  Start Block: {}, Latest Block: {}", record.start_block, latest);
        }
    }

    match (&record.indexer_error, record.indexed_block) {
        (Some(error), _) => {
            let _ = writeln!(out, "  {}", format!("Indexer Error: {}", error).red());
        }
        (None, Some(indexed)) => {
            let _ = writeln!(out, "  Indexed Block: {}", indexed);
        }
        (None, None) => {
            let _ = writeln!(out, "  Indexed Block: {}", "not tracked".bright_black());
        }
    }

    let mut summary = format!("{}% Indexed", record.percentage_display());
    if let Some(behind) = record.blocks_behind() {
        let _ = write!(summary, " ({} blocks behind)", behind);
    }
    let _ = writeln!(out, "  {} {}", progress_bar(record), summary);
}

fn progress_bar(record: &ProgressRecord) -> String {
    // the value itself is unclamped, the bar can only be full or empty
    let filled = ((record.percentage.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    let (r, g, b) = record.tier.rgb();
    format!(
        "{}{}",
        "█".repeat(filled).truecolor(r, g, b),
        "░".repeat(BAR_WIDTH - filled).bright_black()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollingConfig;
    use crate::models::Chain;

    fn snapshot() -> Snapshot {
        let op = Chain::new(10, "Optimism", "https://op.example", 1000);
        let arb = Chain::new(42161, "Arbitrum", "https://arb.example", 0);
        let eth = Chain::new(1, "Ethereum", "https://eth.example", 0);
        Snapshot {
            sweep: 4,
            completed_at: None,
            config: PollingConfig::new("https://indexer.example", 10),
            records: vec![
                ProgressRecord::from_fetches(&op, Ok(2000), Ok(Some(1500))),
                ProgressRecord::from_fetches(&arb, Err("HTTP error! Status: 429 Too Many Requests".into()), Ok(Some(10))),
                ProgressRecord::from_fetches(&eth, Ok(100), Err("GraphQL error: boom".into())),
            ],
        }
    }

    #[test]
    fn renders_every_chain_least_synced_first() {
        colored::control::set_override(false);
        let text = render_snapshot(&snapshot());

        let op = text.find("Optimism (10)").unwrap();
        let arb = text.find("Arbitrum (42161)").unwrap();
        let eth = text.find("Ethereum (1)").unwrap();
        assert!(arb < eth && eth < op);
        assert!(text.contains("Indexer: https://indexer.example"));
        assert!(text.contains("Waiting for the first sweep"));
    }

    #[test]
    fn renders_errors_and_heights() {
        colored::control::set_override(false);
        let text = render_snapshot(&snapshot());

        assert!(text.contains("Start Block: 1000, Latest Block: 2000"));
        assert!(text.contains("Indexed Block: 1500"));
        assert!(text.contains("50.00% Indexed (500 blocks behind)"));
        assert!(text.contains("RPC Error: HTTP error! Status: 429 Too Many Requests"));
        assert!(text.contains("rpc 42161 <url>"));
        assert!(text.contains("Indexer Error: GraphQL error: boom"));
    }

    #[test]
    fn bar_is_clamped_but_value_is_not() {
        colored::control::set_override(false);
        let chain = Chain::new(10, "Optimism", "https://op.example", 1000);
        let ahead = ProgressRecord::from_fetches(&chain, Ok(2000), Ok(Some(2100)));

        assert_eq!(progress_bar(&ahead), "█".repeat(BAR_WIDTH));
        let behind = ProgressRecord::from_fetches(&chain, Ok(2000), Ok(Some(900)));
        assert_eq!(progress_bar(&behind), "░".repeat(BAR_WIDTH));
        let half = ProgressRecord::from_fetches(&chain, Ok(2000), Ok(Some(1500)));
        assert_eq!(progress_bar(&half), format!("{}{}", "█".repeat(20), "░".repeat(20)));
    }

    #[test]
    fn json_uses_camel_case() {
        let line = render_json(&snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["sweep"], 4);
        assert_eq!(value["config"]["indexerUrl"], "https://indexer.example");
        assert_eq!(value["records"][0]["percentage"], "50.00");
        assert_eq!(value["records"][1]["rpcError"], "HTTP error! Status: 429 Too Many Requests");
    }
}
