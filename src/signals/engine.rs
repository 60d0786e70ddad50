//! Batch aggregation of per-instrument signals.
//!
//! A monitor batch fans out one analysis per requested instrument and the
//! failures come back interleaved with the successes. The engine keeps
//! them apart: candidates are deduplicated and deterministically ranked,
//! failures carry their reason, and neither side ever aborts the batch.

use crate::models::{InstrumentFailure, StructuredSignal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How many instruments must analyze successfully for the batch to count
/// as a success. Exposed as policy rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessPolicy {
    Any,
    All,
    Majority,
}

/// Ranked candidates plus the failed-symbol list for one batch.
///
/// Invariant: `candidates.len() + failures.len()` equals the number of
/// distinct requested instruments.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub candidates: Vec<StructuredSignal>,
    pub failures: Vec<InstrumentFailure>,
}

impl BatchOutcome {
    pub fn analyzed_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn meets(&self, policy: SuccessPolicy) -> bool {
        let analyzed = self.candidates.len();
        let total = analyzed + self.failures.len();
        match policy {
            SuccessPolicy::Any => analyzed > 0,
            SuccessPolicy::All => analyzed > 0 && self.failures.is_empty(),
            SuccessPolicy::Majority => analyzed * 2 > total,
        }
    }
}

pub struct SignalEngine;

impl SignalEngine {
    /// Deduplicate requested instrument ids, first occurrence kept.
    pub fn dedup_requested(requested: &[String]) -> Vec<String> {
        let mut unique = Vec::with_capacity(requested.len());
        for id in requested {
            let id = id.trim();
            if id.is_empty() {
                continue;
            }
            if !unique.iter().any(|u: &String| u == id) {
                unique.push(id.to_string());
            }
        }
        unique
    }

    /// Deterministic ranking: score descending, percentage change
    /// descending, ties broken by instrument_id ascending. Duplicate
    /// instrument ids keep the first occurrence.
    pub fn rank(signals: Vec<StructuredSignal>) -> Vec<StructuredSignal> {
        let mut unique: Vec<StructuredSignal> = Vec::with_capacity(signals.len());
        for signal in signals {
            if !unique.iter().any(|s| s.instrument_id == signal.instrument_id) {
                unique.push(signal);
            }
        }
        unique.sort_by(compare_rank);
        unique
    }

    /// Fold per-instrument outcomes into one batch result. Each distinct
    /// requested instrument lands on exactly one side.
    pub fn aggregate(
        requested: &[String],
        outcomes: Vec<(String, Result<StructuredSignal, String>)>,
    ) -> BatchOutcome {
        let mut candidates = Vec::new();
        let mut failures = Vec::new();

        for id in Self::dedup_requested(requested) {
            match outcomes.iter().find(|(key, _)| *key == id) {
                Some((_, Ok(signal))) => {
                    // An artifact answering for an instrument already in the
                    // candidate list would break the batch cardinality.
                    if candidates
                        .iter()
                        .any(|s: &StructuredSignal| s.instrument_id == signal.instrument_id)
                    {
                        failures.push(InstrumentFailure {
                            instrument_id: id,
                            reason: format!(
                                "duplicate analysis for instrument {}",
                                signal.instrument_id
                            ),
                        });
                    } else {
                        candidates.push(signal.clone());
                    }
                }
                Some((_, Err(reason))) => failures.push(InstrumentFailure {
                    instrument_id: id,
                    reason: reason.clone(),
                }),
                None => failures.push(InstrumentFailure {
                    instrument_id: id,
                    reason: "no analysis produced".to_string(),
                }),
            }
        }

        candidates.sort_by(compare_rank);
        BatchOutcome {
            candidates,
            failures,
        }
    }
}

fn compare_rank(a: &StructuredSignal, b: &StructuredSignal) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.change_pct
                .partial_cmp(&a.change_pct)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.instrument_id.cmp(&b.instrument_id))
}
