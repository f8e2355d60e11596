use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::parse_refresh_interval;
use crate::monitor::{Command, SchedulerCommands};

pub const HELP: &str = "commands: indexer <url> | interval <seconds> | rpc <chain-id> <url> | help | quit";

#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(Command),
    Help,
    Quit,
}

/// Parse one console line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleInput>> {
    let mut words = line.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let input = match (keyword.to_lowercase().as_str(), args.as_slice()) {
        ("indexer", [url]) => ConsoleInput::Command(Command::SetIndexerUrl(url.to_string())),
        ("interval", [secs]) => ConsoleInput::Command(Command::SetRefreshInterval(parse_refresh_interval(secs)?)),
        ("rpc", [chain_id, url]) => {
            let chain_id = chain_id
                .parse()
                .with_context(|| format!("invalid chain id `{}`", chain_id))?;
            ConsoleInput::Command(Command::OverrideRpc {
                chain_id,
                rpc_url: url.to_string(),
            })
        }
        ("help", []) => ConsoleInput::Help,
        ("quit", []) | ("exit", []) => ConsoleInput::Quit,
        ("indexer" | "interval" | "rpc", _) => bail!("wrong number of arguments for `{}`; {}", keyword, HELP),
        _ => return Err(anyhow!("unknown command `{}`; {}", keyword, HELP)),
    };
    Ok(Some(input))
}

/// Forward console edits to the scheduler until `quit` or end of input
pub async fn run_console<R>(reader: R, commands: SchedulerCommands, quit: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Console input closed, live edits disabled");
                return;
            }
            Err(e) => {
                warn!("Failed to read console input: {}", e);
                return;
            }
        };

        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleInput::Help)) => eprintln!("{}", HELP),
            Ok(Some(ConsoleInput::Quit)) => {
                quit.cancel();
                return;
            }
            Ok(Some(ConsoleInput::Command(command))) => {
                if commands.send(command).is_err() {
                    warn!("Scheduler stopped, ignoring further console input");
                    return;
                }
            }
            Err(e) => warn!("{:#}", e),
        }
    }
}
