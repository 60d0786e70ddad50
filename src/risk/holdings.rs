//! Read-only holdings snapshot.
//!
//! The snapshot file is maintained elsewhere; this core only reads it to
//! bias risk decisions and sell sizing. A missing or corrupt file degrades
//! to an empty snapshot with a warning rather than failing the job.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Holding {
    pub quantity: u64,
    pub average_cost: f64,
}

#[derive(Debug, Deserialize)]
struct PositionRecord {
    instrument_id: String,
    quantity: u64,
    #[serde(default)]
    average_cost: f64,
}

#[derive(Debug, Deserialize)]
struct HoldingsFile {
    #[serde(default)]
    positions: Vec<PositionRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct HoldingsSnapshot {
    map: HashMap<String, Holding>,
}

impl HoldingsSnapshot {
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read holdings snapshot, using empty");
                return Self::default();
            }
        };
        let file: HoldingsFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot parse holdings snapshot, using empty");
                return Self::default();
            }
        };

        let mut map: HashMap<String, Holding> = HashMap::new();
        for position in file.positions {
            let id = position.instrument_id.trim().to_string();
            if id.is_empty() || position.quantity == 0 {
                continue;
            }
            let entry = map.entry(id).or_insert(Holding {
                quantity: 0,
                average_cost: position.average_cost,
            });
            entry.quantity += position.quantity;
        }
        Self { map }
    }

    pub fn from_positions(positions: impl IntoIterator<Item = (String, Holding)>) -> Self {
        Self {
            map: positions.into_iter().collect(),
        }
    }

    pub fn quantity(&self, instrument_id: &str) -> u64 {
        self.map.get(instrument_id).map_or(0, |h| h.quantity)
    }

    pub fn get(&self, instrument_id: &str) -> Option<&Holding> {
        self.map.get(instrument_id)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
