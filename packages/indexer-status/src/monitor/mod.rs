mod aggregator;
mod error;
mod indexer;
mod rpc;
mod scheduler;

pub use aggregator::{Aggregator, SweepPlan};
pub use error::FetchError;
pub use indexer::{GraphQlIndexerClient, IndexedHeightSource};
pub use rpc::{BlockHeightSource, RpcBlockFetcher};
pub use scheduler::{Command, Scheduler, SchedulerCommands, Snapshot};
