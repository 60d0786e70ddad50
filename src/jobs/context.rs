//! Job context for dependency injection.
//!
//! Read-only collaborators shared by every handler, constructed once at
//! startup and passed by reference, never reached through globals.

use crate::ai::{Invoker, ProviderSpec, SkillPreflight};
use crate::config::{Config, ConfigError};
use crate::core::MarketCalendar;
use crate::notify::Notifier;
use std::sync::Arc;

pub struct JobContext {
    pub config: Arc<Config>,
    pub provider: ProviderSpec,
    pub invoker: Invoker,
    pub preflight: SkillPreflight,
    pub calendar: Arc<MarketCalendar>,
    pub notifier: Arc<dyn Notifier>,
}

impl JobContext {
    /// Resolve the provider and derive the rest from config. Unknown
    /// provider ids fail here, before any job is registered.
    pub fn new(config: Arc<Config>, notifier: Arc<dyn Notifier>) -> Result<Self, ConfigError> {
        let provider = ProviderSpec::resolve(&config.ai)?;
        let preflight = SkillPreflight::from_config(&config.ai.skills, provider.id());
        let invoker = Invoker::new(&config.paths.workdir);
        let calendar = Arc::new(MarketCalendar::from_config(&config.calendar));
        Ok(Self {
            config,
            provider,
            invoker,
            preflight,
            calendar,
            notifier,
        })
    }
}
