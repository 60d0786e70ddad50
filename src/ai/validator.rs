//! Artifact-based success validation.
//!
//! The external tool may exit 0 while silently failing to write anything
//! usable, so a clean exit is only half the contract: the job must also
//! have produced a file matching its artifact pattern with a modification
//! time strictly after the invocation's start marker. The marker is
//! captured in-process rather than trusting the tool's own timestamps;
//! clock skew and coarse mtime resolution remain a known limitation.

use crate::models::InvocationReport;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

/// A file the external tool produced. Detected and read, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Start marker plus the pattern to watch for. Created immediately before
/// the invocation's first attempt.
#[derive(Debug, Clone)]
pub struct ArtifactProbe {
    dir: PathBuf,
    pattern: String,
    started: SystemTime,
}

impl ArtifactProbe {
    pub fn begin(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
            started: SystemTime::now(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Newest file matching the pattern with mtime strictly after the
    /// marker, if any.
    pub fn newest_match(&self) -> Option<Artifact> {
        let entries = std::fs::read_dir(&self.dir).ok()?;
        let mut newest: Option<Artifact> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !wildcard_match(&self.pattern, name) {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if modified <= self.started {
                debug!(
                    file = %path.display(),
                    "ignoring artifact older than invocation start"
                );
                continue;
            }
            let is_newer = newest.as_ref().map_or(true, |a| modified > a.modified);
            if is_newer {
                newest = Some(Artifact { path, modified });
            }
        }
        newest
    }
}

/// The three terminal states of a run. A failed validation never reaches
/// the report parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunVerdict {
    Success(Artifact),
    /// Process exited cleanly but the artifact contract went unmet.
    FailedNoArtifact,
    /// The final attempt did not exit 0.
    FailedProcess,
}

/// Combine process exit status with artifact detection.
pub fn judge(report: &InvocationReport, probe: &ArtifactProbe) -> RunVerdict {
    if !report.process_succeeded() {
        return RunVerdict::FailedProcess;
    }
    match probe.newest_match() {
        Some(artifact) => RunVerdict::Success(artifact),
        None => RunVerdict::FailedNoArtifact,
    }
}

/// Filename wildcard match supporting `*` (any run of characters).
pub(crate) fn wildcard_match(pattern: &str, name: &str) -> bool {
    fn matches(p: &[u8], n: &[u8]) -> bool {
        match p.first() {
            None => n.is_empty(),
            Some(b'*') => {
                (0..=n.len()).any(|skip| matches(&p[1..], &n[skip..]))
            }
            Some(c) => n.first() == Some(c) && matches(&p[1..], &n[1..]),
        }
    }
    matches(pattern.as_bytes(), name.as_bytes())
}
