use serde::{Serialize, Serializer};

use crate::models::Chain;

/// Sync status of one chain, produced once per sweep
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub chain_id: u64,
    pub name: String,
    pub start_block: u64,
    pub rpc_url: String,
    pub latest_block: Option<u64>,
    pub indexed_block: Option<u64>,
    #[serde(serialize_with = "serialize_percentage")]
    pub percentage: f64,
    pub tier: ProgressTier,
    pub rpc_error: Option<String>,
    pub indexer_error: Option<String>,
}

impl ProgressRecord {
    /// Merge the outcome of both fetches for `chain` into a record.
    pub fn from_fetches(
        chain: &Chain,
        latest: Result<u64, String>,
        indexed: Result<Option<u64>, String>,
    ) -> Self {
        let (latest_block, rpc_error) = match latest {
            Ok(block) => (Some(block), None),
            Err(e) => (None, Some(e)),
        };
        let (indexed_block, indexer_error) = match indexed {
            Ok(block) => (block, None),
            Err(e) => (None, Some(e)),
        };

        let percentage = match (latest_block, indexed_block) {
            (Some(latest), Some(indexed)) => compute_percentage(chain.start_block, latest, indexed),
            _ => 0.0,
        };

        Self {
            chain_id: chain.chain_id,
            name: chain.name.clone(),
            start_block: chain.start_block,
            rpc_url: chain.rpc_url.clone(),
            latest_block,
            indexed_block,
            percentage,
            tier: ProgressTier::from_percentage(percentage),
            rpc_error,
            indexer_error,
        }
    }

    /// Percentage with two decimals, e.g. `"50.00"`
    pub fn percentage_display(&self) -> String {
        format!("{:.2}", self.percentage)
    }

    /// Blocks between the indexer and the chain head, when both are known
    pub fn blocks_behind(&self) -> Option<i128> {
        match (self.latest_block, self.indexed_block) {
            (Some(latest), Some(indexed)) => Some(latest as i128 - indexed as i128),
            _ => None,
        }
    }
}

/// Share of `start..latest` covered by `indexed`, in percent, rounded to two decimals.
///
/// The value is not clamped: a head read that lags behind the indexer yields
/// more than 100, an indexer below its start block yields a negative value.
/// A chain whose head still sits on the start block has nothing to measure
/// against and reports 0.
pub fn compute_percentage(start_block: u64, latest_block: u64, indexed_block: u64) -> f64 {
    let denominator = latest_block as f64 - start_block as f64;
    if denominator == 0.0 {
        return 0.0;
    }
    let raw = (indexed_block as f64 - start_block as f64) / denominator * 100.0;
    let rounded = (raw * 100.0).round() / 100.0;
    // avoid rendering "-0.00"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn serialize_percentage<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}", value))
}

/// Color band of a progress bar, from most urgent to complete
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressTier {
    /// below 10%
    DeepRed,
    /// below 25%
    Red,
    /// below 40%
    Orange,
    /// below 55%
    Yellow,
    /// below 70%
    PaleYellow,
    /// below 85%
    LightGreen,
    Green,
}

impl ProgressTier {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage < 10.0 {
            Self::DeepRed
        } else if percentage < 25.0 {
            Self::Red
        } else if percentage < 40.0 {
            Self::Orange
        } else if percentage < 55.0 {
            Self::Yellow
        } else if percentage < 70.0 {
            Self::PaleYellow
        } else if percentage < 85.0 {
            Self::LightGreen
        } else {
            Self::Green
        }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::DeepRed => (153, 27, 27),
            Self::Red => (220, 38, 38),
            Self::Orange => (249, 115, 22),
            Self::Yellow => (250, 204, 21),
            Self::PaleYellow => (253, 224, 71),
            Self::LightGreen => (134, 239, 172),
            Self::Green => (34, 197, 94),
        }
    }
}
