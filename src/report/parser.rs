//! Report artifact parsing.
//!
//! Analysis artifacts open with a `---`-fenced field block (an ordered
//! key -> scalar/sequence mapping) followed by free-form narrative. The
//! block is validated against a fixed signal schema; any missing or
//! mistyped field fails that one artifact only, so multi-instrument
//! batches keep going.

use crate::models::{Direction, StructuredSignal, SCORE_MAX, SCORE_MIN};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("artifact has no leading field block")]
    MissingFieldBlock,
    #[error("malformed field block: {0}")]
    MalformedFieldBlock(String),
    #[error("schema violation: field `{field}`: {reason}")]
    SchemaViolation { field: String, reason: String },
}

fn violation(field: &str, reason: impl Into<String>) -> ParseError {
    ParseError::SchemaViolation {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// A field block value: one scalar or one ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(String),
    Sequence(Vec<String>),
}

/// Ordered key -> value mapping from the top of an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldBlock {
    fields: Vec<(String, FieldValue)>,
}

impl FieldBlock {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    fn scalar(&self, key: &str) -> Result<&str, ParseError> {
        match self.get(key) {
            Some(FieldValue::Scalar(v)) => Ok(v),
            Some(FieldValue::Sequence(_)) => Err(violation(key, "expected a scalar")),
            None => Err(violation(key, "missing required field")),
        }
    }

    fn sequence(&self, key: &str) -> Result<&[String], ParseError> {
        match self.get(key) {
            Some(FieldValue::Sequence(v)) => Ok(v),
            Some(FieldValue::Scalar(_)) => Err(violation(key, "expected a sequence")),
            None => Err(violation(key, "missing required field")),
        }
    }

    fn number(&self, key: &str) -> Result<f64, ParseError> {
        let raw = self.scalar(key)?;
        let value: f64 = raw
            .parse()
            .map_err(|_| violation(key, format!("not a number: {raw}")))?;
        if !value.is_finite() {
            return Err(violation(key, "not a finite number"));
        }
        Ok(value)
    }

    fn optional_number(&self, key: &str, default: f64) -> Result<f64, ParseError> {
        match self.get(key) {
            None => Ok(default),
            Some(_) => self.number(key),
        }
    }

    fn optional_levels(&self, key: &str) -> Result<Vec<f64>, ParseError> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        let FieldValue::Sequence(items) = value else {
            return Err(violation(key, "expected a sequence"));
        };
        items
            .iter()
            .map(|raw| {
                raw.parse::<f64>()
                    .map_err(|_| violation(key, format!("not a number: {raw}")))
            })
            .collect()
    }
}

/// A fully validated artifact: the extracted signal plus the narrative
/// that followed the field block.
#[derive(Debug, Clone)]
pub struct ParsedReport {
    pub signal: StructuredSignal,
    pub narrative: String,
}

/// Split the leading `---`-fenced field block from the trailing narrative.
pub fn split_field_block(text: &str) -> Result<(FieldBlock, String), ParseError> {
    let mut lines = text.lines();

    // The fence must be the first non-blank line.
    loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) if line.trim() == "---" => break,
            _ => return Err(ParseError::MissingFieldBlock),
        }
    }

    let mut block = FieldBlock::default();
    let mut closed = false;
    for line in lines.by_ref() {
        let trimmed = line.trim();
        if trimmed == "---" {
            closed = true;
            break;
        }
        if trimmed.is_empty() {
            continue;
        }
        if let Some(item) = trimmed.strip_prefix("- ") {
            match block.fields.last_mut() {
                Some((_, FieldValue::Sequence(items))) => items.push(item.trim().to_string()),
                _ => {
                    return Err(ParseError::MalformedFieldBlock(format!(
                        "sequence item outside a sequence: {trimmed}"
                    )))
                }
            }
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(ParseError::MalformedFieldBlock(format!(
                "expected `key: value`: {trimmed}"
            )));
        };
        let key = key.trim().to_string();
        let value = value.trim();
        let parsed = if value.is_empty() {
            FieldValue::Sequence(Vec::new())
        } else if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            FieldValue::Sequence(
                inner
                    .split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect(),
            )
        } else {
            FieldValue::Scalar(value.to_string())
        };
        block.fields.push((key, parsed));
    }

    if !closed {
        return Err(ParseError::MissingFieldBlock);
    }

    let narrative = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Ok((block, narrative))
}

/// Parse and schema-validate one signal artifact's text.
pub fn parse_signal_report(text: &str) -> Result<ParsedReport, ParseError> {
    let (block, narrative) = split_field_block(text)?;

    let instrument_id = block.scalar("instrument_id")?.to_string();
    if instrument_id.is_empty() {
        return Err(violation("instrument_id", "must not be empty"));
    }

    let direction_raw = block.scalar("direction")?;
    let direction = Direction::parse(direction_raw)
        .ok_or_else(|| violation("direction", format!("unknown direction: {direction_raw}")))?;

    let score = block.number("score")?;
    if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
        return Err(violation(
            "score",
            format!("out of range {SCORE_MIN}..={SCORE_MAX}: {score}"),
        ));
    }

    let bullish_factors = block.sequence("bullish_factors")?.to_vec();
    let bearish_factors = block.sequence("bearish_factors")?.to_vec();
    let closing_price = block.number("closing_price")?;

    let display_name = match block.get("display_name") {
        Some(_) => block.scalar("display_name")?.to_string(),
        None => String::new(),
    };

    Ok(ParsedReport {
        signal: StructuredSignal {
            instrument_id,
            display_name,
            score,
            direction,
            bullish_factors,
            bearish_factors,
            support_levels: block.optional_levels("support_levels")?,
            resistance_levels: block.optional_levels("resistance_levels")?,
            closing_price,
            change_pct: block.optional_number("change_pct", 0.0)?,
        },
        narrative,
    })
}

/// Read and parse one signal artifact from disk.
pub fn parse_signal_artifact(path: &Path) -> Result<ParsedReport, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_signal_report(&text)
}

/// Instruments recommended by a daily trading-plan document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanWatchlist {
    pub buy_candidates: Vec<String>,
    pub watchlist: Vec<String>,
}

impl PlanWatchlist {
    /// All recommended instruments, buys first, deduplicated in order.
    pub fn all(&self) -> Vec<String> {
        let mut all = Vec::new();
        for id in self.buy_candidates.iter().chain(self.watchlist.iter()) {
            if !all.contains(id) {
                all.push(id.clone());
            }
        }
        all
    }

    pub fn is_empty(&self) -> bool {
        self.buy_candidates.is_empty() && self.watchlist.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum PlanSection {
    Buy,
    Watch,
    Other,
}

/// Extract the recommended instrument list from a trading-plan document.
/// Instrument codes are pulled from the first cell of table rows under the
/// buy-plan and watch-list sections.
pub fn parse_plan_watchlist(text: &str) -> PlanWatchlist {
    let mut plan = PlanWatchlist::default();
    let mut section = PlanSection::Other;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            let lower = trimmed.to_ascii_lowercase();
            section = if lower.contains("buy plan") || lower.contains("strong buy") {
                PlanSection::Buy
            } else if lower.contains("watch") {
                PlanSection::Watch
            } else {
                PlanSection::Other
            };
            continue;
        }
        if !trimmed.starts_with('|') || trimmed.contains("---") {
            continue;
        }
        let Some(first_cell) = trimmed
            .split('|')
            .map(str::trim)
            .find(|cell| !cell.is_empty())
        else {
            continue;
        };
        if !is_instrument_code(first_cell) {
            continue;
        }
        let target = match section {
            PlanSection::Buy => &mut plan.buy_candidates,
            PlanSection::Watch => &mut plan.watchlist,
            PlanSection::Other => continue,
        };
        if !target.iter().any(|id| id == first_cell) {
            target.push(first_cell.to_string());
        }
    }

    plan
}

/// Instrument codes are 4-6 digits with an optional trailing uppercase
/// suffix (ETF share classes).
fn is_instrument_code(cell: &str) -> bool {
    let digits = cell.chars().take_while(|c| c.is_ascii_digit()).count();
    if !(4..=6).contains(&digits) {
        return false;
    }
    let rest = &cell[digits..];
    rest.is_empty() || (rest.len() == 1 && rest.chars().all(|c| c.is_ascii_uppercase()))
}
