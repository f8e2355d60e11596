mod chain;
mod progress;

pub use chain::Chain;
pub use progress::ProgressRecord;
