//! Candidate run outputs.
//!
//! Every daily/monitor run leaves a JSON and a markdown record of its risk
//! decisions under the candidates directory: the audit trail for what was
//! accepted, what was rejected, and why.

use crate::models::RiskDecision;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("failed to write candidate output {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to serialize candidate output: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct CandidateDocument<'a> {
    generated_at: String,
    job: &'a str,
    run_id: &'a str,
    candidate_count: usize,
    accepted_count: usize,
    decisions: &'a [RiskDecision],
}

fn io_err(path: &Path, source: std::io::Error) -> ReportingError {
    ReportingError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Write both candidate outputs for one run; returns the created paths.
pub fn write_candidate_outputs(
    dir: &Path,
    job: &str,
    run_id: &str,
    at: DateTime<Local>,
    decisions: &[RiskDecision],
) -> Result<Vec<PathBuf>, ReportingError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let stem = format!("{job}_{}", at.format("%Y%m%d_%H%M"));

    let json_path = dir.join(format!("{stem}.json"));
    let markdown_path = dir.join(format!("{stem}.md"));

    let document = CandidateDocument {
        generated_at: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        job,
        run_id,
        candidate_count: decisions.len(),
        accepted_count: decisions.iter().filter(|d| d.accepted).count(),
        decisions,
    };
    let json = serde_json::to_string_pretty(&document)?;
    std::fs::write(&json_path, json).map_err(|e| io_err(&json_path, e))?;

    std::fs::write(&markdown_path, render_markdown(&document))
        .map_err(|e| io_err(&markdown_path, e))?;

    Ok(vec![json_path, markdown_path])
}

fn render_markdown(doc: &CandidateDocument<'_>) -> String {
    let mut lines = Vec::new();
    lines.push("# Candidate Signals".to_string());
    lines.push(String::new());
    lines.push(format!("- generated_at: {}", doc.generated_at));
    lines.push(format!("- job: {}", doc.job));
    lines.push(format!("- run_id: {}", doc.run_id));
    lines.push(format!("- candidate_count: {}", doc.candidate_count));
    lines.push(format!("- accepted_count: {}", doc.accepted_count));
    lines.push(String::new());
    lines.push(
        "| instrument | direction | score | change_pct | close | accepted | rejection |"
            .to_string(),
    );
    lines.push("|---|---|---:|---:|---:|---|---|".to_string());

    for decision in doc.decisions {
        let signal = &decision.signal;
        let rejection = decision
            .rejection
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_default();
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            signal.instrument_id,
            signal.direction,
            signal.score,
            signal.change_pct,
            signal.closing_price,
            if decision.accepted { "yes" } else { "no" },
            rejection,
        ));
    }

    lines.push(String::new());
    lines.push("## Factors".to_string());
    lines.push(String::new());
    for decision in doc.decisions {
        let signal = &decision.signal;
        lines.push(format!(
            "- {}: bullish [{}] / bearish [{}]",
            signal.instrument_id,
            signal.bullish_factors.join("; "),
            signal.bearish_factors.join("; "),
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}
