//! Tracked asset table
//!
//! The built-in table lists every asset the dashboard tracks together with the
//! upstream coin id its ticker maps to. A JSON file may replace the table at
//! start-up; it is loaded once and never mutated afterwards.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AssetDescriptor;

/// Errors that can occur when loading an asset table
#[derive(Debug, Error)]
pub enum AssetTableError {
    /// The table file could not be read
    #[error("Failed to read asset table: {0}")]
    Io(#[from] std::io::Error),

    /// The table file is not a valid JSON asset list
    #[error("Failed to parse asset table: {0}")]
    Parse(#[from] serde_json::Error),

    /// The table contains no assets
    #[error("Asset table is empty")]
    Empty,
}

/// (name, ticker, launch date, category, coin id)
type BuiltinRow = (&'static str, &'static str, &'static str, &'static str, &'static str);

/// Assets tracked by default
static BUILTIN_ASSETS: [BuiltinRow; 45] = [
    ("Aptos", "APT", "March 21, 2025", "L0/L1", "aptos"),
    ("Berachain", "BERA", "December 2024", "L0/L1", "berachain"),
    ("Injective", "INJ", "June 3, 2025", "L0/L1", "injective-protocol"),
    ("Kaia", "KAIA", "April 8, 2025", "L0/L1", "kaia"),
    ("MANTRA", "OM", "April 8, 2025", "L0/L1", "mantra-dao"),
    ("Movement", "MOVE", "January 6, 2025", "L0/L1", "movement"),
    ("Near", "NEAR", "May 27, 2025", "L0/L1", "near"),
    ("PEAQ", "PEAQ", "June 18, 2025", "L0/L1", "peaq"),
    ("Polkadot", "DOT", "February 13, 2025", "L0/L1", "polkadot"),
    ("Sei", "SEI", "January 8, 2025", "L0/L1", "sei-network"),
    ("Sonic", "S", "June 27, 2025", "L0/L1", "sonic"),
    ("Story", "STORY", "January 7, 2025", "L0/L1", "story"),
    ("XION", "XION", "November 28, 2025", "L0/L1", "xion"),
    ("CreatorBid", "BID", "June 13, 2025", "AI Agents", "creatorbid"),
    ("Newton", "NEWT", "May 17, 2025", "AI Agents", "newton"),
    ("Virtuals Protocol", "VIRTUAL", "May 13, 2025", "AI Agents", "virtuals-protocol"),
    ("Warden Protocol", "WARD", "June 18, 2025", "AI Agents", "warden"),
    ("Wayfinder", "PROMPT", "April 4, 2025", "AI Agents", "wayfinder"),
    ("ANIME", "ANIME", "January 9, 2025", "Culture", "anime"),
    ("Boop", "BOOP", "May 1, 2025", "Culture", "boop"),
    ("PENGU", "PENGU", "May 5, 2025", "Culture", "pengu"),
    ("Corn", "CORN", "December 2024", "BTCFi", "corn"),
    ("GOAT Network", "GOATED", "June 17, 2025", "BTCFi", "goat-network"),
    ("Arbitrum", "ARB", "May 27, 2025", "L2", "arbitrum"),
    ("Katana", "KAT", "June 10, 2025", "L2", "katana-inu"),
    ("Mantle", "MNT", "May 18, 2025", "L2", "mantle"),
    ("Polygon", "MATIC", "July 29, 2025", "L2", "matic-network"),
    ("SOON", "SOON", "May 12, 2025", "L2", "soon"),
    ("Falcon Finance", "FF", "August 5, 2025", "DeFi", "falcon-finance"),
    ("Frax", "FRAX", "Early 2025", "DeFi", "frax"),
    ("Huma", "HUMA", "May 19, 2025", "DeFi", "huma-finance"),
    ("Orderly", "ORDER", "June 24, 2025", "DeFi", "orderly-network"),
    ("Pyth", "PYTH", "March 11, 2025", "DeFi", "pyth-network"),
    ("Starknet", "STRK", "Early 2025", "ZK", "starknet"),
    ("Zcash", "ZEC", "June 6, 2025", "ZK", "zcash"),
    ("Humanity Protocol", "H", "May 28, 2025", "Others", "humanity-protocol"),
    ("dYdX", "DYDX", "May 14, 2025", "Exchange", "dydx"),
    ("Kaito", "KAITO", "December 2024", "AI", "kaito"),
    ("IQ", "IQ", "April 9, 2025", "AI", "everipedia"),
    ("UXLINK", "UXLINK", "June 12, 2025", "AI", "uxlink"),
    ("Defi App", "DEFI", "March 4, 2025", "Consumer", "defi-app"),
    ("MapleStory Universe", "NXPC", "May 13, 2025", "Consumer", "maplestory-universe"),
    ("Sophon", "SOPH", "March 31, 2025", "Consumer", "sophon"),
    ("Initia", "INIT", "March 27, 2025", "Interop", "initia"),
    ("Skate", "SKATE", "February 25, 2025", "Interop", "skate"),
];

/// Asset entry as written in an override file; the coin id is optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetRecord {
    ticker: String,
    name: String,
    start_date: String,
    category: String,
    #[serde(default)]
    coin_id: Option<String>,
    #[serde(default = "default_has_token")]
    has_token: bool,
}

fn default_has_token() -> bool {
    true
}

/// Immutable set of tracked assets
#[derive(Debug, Clone, Serialize)]
pub struct AssetTable {
    assets: Vec<AssetDescriptor>,
}

impl Default for AssetTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AssetTable {
    /// The built-in table of tracked assets
    pub fn builtin() -> Self {
        let assets = BUILTIN_ASSETS
            .iter()
            .map(|&(name, ticker, start_date, category, coin_id)| AssetDescriptor {
                ticker: ticker.to_string(),
                canonical_id: coin_id.to_string(),
                name: name.to_string(),
                launch_date: start_date.to_string(),
                category: category.to_string(),
                has_token: true,
            })
            .collect();
        Self { assets }
    }

    /// Creates a table from already-built descriptors
    pub fn from_assets(assets: Vec<AssetDescriptor>) -> Self {
        Self { assets }
    }

    /// Loads a table from a JSON array of asset records
    ///
    /// Records without a `coinId` map to their lower-cased ticker.
    pub fn from_json_str(json: &str) -> Result<Self, AssetTableError> {
        let records: Vec<AssetRecord> = serde_json::from_str(json)?;
        if records.is_empty() {
            return Err(AssetTableError::Empty);
        }

        let assets = records
            .into_iter()
            .map(|record| AssetDescriptor {
                canonical_id: record
                    .coin_id
                    .unwrap_or_else(|| canonical_id_for(&record.ticker)),
                ticker: record.ticker.to_uppercase(),
                name: record.name,
                launch_date: record.start_date,
                category: record.category,
                has_token: record.has_token,
            })
            .collect();
        Ok(Self { assets })
    }

    /// Loads a table from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, AssetTableError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// All assets in table order
    pub fn all(&self) -> &[AssetDescriptor] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Finds an asset by ticker, ignoring case
    pub fn find(&self, ticker: &str) -> Option<&AssetDescriptor> {
        self.assets
            .iter()
            .find(|asset| asset.ticker.eq_ignore_ascii_case(ticker))
    }

    /// Assets whose category matches `category`, ignoring case
    pub fn in_category(&self, category: &str) -> Vec<&AssetDescriptor> {
        self.assets
            .iter()
            .filter(|asset| asset.category.to_lowercase() == category.to_lowercase())
            .collect()
    }
}

/// Default upstream id for a ticker that has no explicit mapping
pub fn canonical_id_for(ticker: &str) -> String {
    ticker.to_lowercase()
}
