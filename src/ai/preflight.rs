//! Capability-bundle preflight.
//!
//! A job that names a required capability only runs after the bundle is
//! found under the configured search roots and synced into the provider's
//! home directory. Syncing happens immediately before each invocation, not
//! at process startup, so bundle edits on disk reach long-running
//! unattended schedulers without a restart.

use crate::config::{EnforcementMode, SkillsConfig};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Marker file a directory must carry to count as a capability bundle.
pub const BUNDLE_MANIFEST: &str = "SKILL.md";

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("required capability bundle missing: {name}")]
    CapabilityMissing { name: String },
    #[error("no bundle home configured for provider {provider}")]
    NoProviderHome { provider: String },
    #[error("capability sync failed for {name}: {reason}")]
    Sync { name: String, reason: String },
}

/// Where the required bundle was found and where it was synced to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSync {
    pub name: String,
    pub source: PathBuf,
    pub home: PathBuf,
}

/// Result of a preflight: the (possibly capability-enforced) prompt, plus
/// sync details when enforcement ran.
#[derive(Debug, Clone)]
pub struct PreflightOutcome {
    pub prompt: String,
    pub bundle: Option<BundleSync>,
}

pub struct SkillPreflight {
    enabled: bool,
    mode: EnforcementMode,
    search_roots: Vec<PathBuf>,
    provider: String,
    home: Option<PathBuf>,
}

impl SkillPreflight {
    pub fn from_config(skills: &SkillsConfig, provider: &str) -> Self {
        let home = skills
            .provider_home
            .get(provider)
            .map(|raw| expand_home(raw));
        Self {
            enabled: skills.enabled,
            mode: skills.mode,
            search_roots: skills.search_roots.clone(),
            provider: provider.to_string(),
            home,
        }
    }

    /// Validate and sync the job's required capability, returning the
    /// prompt to send. Strict mode fails the job before any invocation
    /// attempt; warn mode logs and degrades to the base prompt.
    pub fn prepare(
        &self,
        job_id: &str,
        required: Option<&str>,
        base_prompt: &str,
    ) -> Result<PreflightOutcome, PreflightError> {
        let Some(name) = required.filter(|_| self.enabled) else {
            return Ok(PreflightOutcome {
                prompt: base_prompt.to_string(),
                bundle: None,
            });
        };

        match self.locate_and_sync(name) {
            Ok(sync) => {
                info!(
                    job = %job_id,
                    bundle = %sync.name,
                    source = %sync.source.display(),
                    home = %sync.home.display(),
                    "capability preflight passed for {}",
                    job_id
                );
                let prompt = enforced_prompt(job_id, base_prompt, &sync);
                Ok(PreflightOutcome {
                    prompt,
                    bundle: Some(sync),
                })
            }
            Err(e) => match self.mode {
                EnforcementMode::Strict => {
                    error!(job = %job_id, error = %e, "capability preflight failed for {}", job_id);
                    Err(e)
                }
                EnforcementMode::Warn => {
                    warn!(
                        job = %job_id,
                        error = %e,
                        "capability preflight degraded for {}, using base prompt",
                        job_id
                    );
                    Ok(PreflightOutcome {
                        prompt: base_prompt.to_string(),
                        bundle: None,
                    })
                }
            },
        }
    }

    /// Ordered search roots plus the provider home as a final fallback.
    fn source_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.search_roots.clone();
        if let Some(home) = &self.home {
            if !roots.contains(home) {
                roots.push(home.clone());
            }
        }
        roots
    }

    fn locate_and_sync(&self, name: &str) -> Result<BundleSync, PreflightError> {
        let home = self.home.clone().ok_or_else(|| PreflightError::NoProviderHome {
            provider: self.provider.clone(),
        })?;

        let roots = self.source_roots();
        let source = roots
            .iter()
            .map(|root| root.join(name))
            .find(|dir| dir.join(BUNDLE_MANIFEST).is_file())
            .ok_or_else(|| PreflightError::CapabilityMissing {
                name: name.to_string(),
            })?;

        self.sync_bundles(&roots, &home).map_err(|reason| PreflightError::Sync {
            name: name.to_string(),
            reason,
        })?;

        Ok(BundleSync {
            name: name.to_string(),
            source,
            home: home.join(name),
        })
    }

    /// Overwrite-by-name copy of every bundle under the search roots into
    /// the provider home. First root wins on name collisions.
    fn sync_bundles(&self, roots: &[PathBuf], home: &Path) -> Result<(), String> {
        fs::create_dir_all(home).map_err(|e| format!("cannot create {}: {e}", home.display()))?;

        let mut seen: Vec<String> = Vec::new();
        for root in roots {
            let Ok(entries) = fs::read_dir(root) else {
                continue;
            };
            for entry in entries.flatten() {
                let source = entry.path();
                if !source.join(BUNDLE_MANIFEST).is_file() {
                    continue;
                }
                let Some(bundle_name) = source.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if seen.iter().any(|s| s == bundle_name) {
                    continue;
                }
                seen.push(bundle_name.to_string());

                let target = home.join(bundle_name);
                // Skip self-copy when the home is itself a search root.
                if same_path(&source, &target) {
                    continue;
                }
                if target.is_dir() {
                    fs::remove_dir_all(&target)
                        .map_err(|e| format!("cannot replace {}: {e}", target.display()))?;
                }
                copy_dir_recursive(&source, &target)
                    .map_err(|e| format!("cannot copy {}: {e}", source.display()))?;
            }
        }
        Ok(())
    }
}

fn enforced_prompt(job_id: &str, base: &str, sync: &BundleSync) -> String {
    format!(
        "[Capability enforcement]\n\
         - task: {job_id}\n\
         - required bundle: {name}\n\
         - bundle path: {source}\n\
         - provider home path: {home}\n\
         - Read the bundle's SKILL.md first and follow its workflow strictly.\n\
         - If the bundle cannot be loaded, report the failure and stop; do not fall back to a generic flow.\n\n\
         [Task]\n{base}",
        name = sync.name,
        source = sync.source.display(),
        home = sync.home.display(),
    )
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(raw)
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn copy_dir_recursive(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}
