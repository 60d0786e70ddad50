//! Configuration loading.
//!
//! A single TOML file drives the scheduler. String values may carry
//! `${ENV}` / `${ENV:default}` tokens so credentials stay out of the repo;
//! tokens are resolved against the process environment after parsing and
//! before deserialization.

use crate::signals::SuccessPolicy;
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown ai provider: {0}")]
    UnknownProvider(String),
    #[error("custom provider requires a non-empty command template")]
    EmptyTemplate,
    #[error("invalid schedule value: {0}")]
    InvalidSchedule(String),
}

/// Deployment environment, used to pick the log format.
pub fn environment() -> String {
    std::env::var("SIGNALYST_ENV").unwrap_or_else(|_| "development".to_string())
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub schedule: ScheduleConfig,
    pub ai: AiConfig,
    pub trading: TradingConfig,
    pub risk: RiskConfig,
    pub signals: SignalsConfig,
    pub email: EmailConfig,
    pub calendar: CalendarConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut value: toml::Value = toml::from_str(raw)?;
        resolve_value(&mut value);
        Ok(value.try_into()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Working directory the reasoning command runs in.
    pub workdir: PathBuf,
    pub outputs_dir: PathBuf,
    pub strategy_dir: PathBuf,
    pub intraday_dir: PathBuf,
    pub candidates_dir: PathBuf,
    pub lease_file: PathBuf,
    pub holdings_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            outputs_dir: PathBuf::from("outputs"),
            strategy_dir: PathBuf::from("strategy"),
            intraday_dir: PathBuf::from("intraday"),
            candidates_dir: PathBuf::from("outputs/candidates"),
            lease_file: PathBuf::from("scheduler.lease"),
            holdings_file: PathBuf::from("outputs/current_holdings.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub news_day: String,
    pub news_time: String,
    pub daily_time: String,
    pub monitor_start: String,
    pub monitor_end: String,
    pub monitor_interval_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            news_day: "sun".to_string(),
            news_time: "00:00".to_string(),
            daily_time: "08:00".to_string(),
            monitor_start: "09:00".to_string(),
            monitor_end: "13:30".to_string(),
            monitor_interval_minutes: 30,
        }
    }
}

/// Parse `HH:MM` into a local time of day.
pub fn parse_time(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ConfigError::InvalidSchedule(format!("bad time of day: {value}")))
}

pub fn parse_weekday(value: &str) -> Result<Weekday, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        other => Err(ConfigError::InvalidSchedule(format!("bad weekday: {other}"))),
    }
}

pub const DEFAULT_ALLOWED_TOOLS: &str = "Bash,Read,Write,Glob,Grep,WebSearch,WebFetch";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Selected provider id. Resolved into a closed descriptor at load time;
    /// unknown ids are rejected before any job ever fires.
    pub provider: String,
    pub timeout_minutes: TimeoutConfig,
    pub retry: RetryConfig,
    pub claude: BuiltinProviderConfig,
    pub custom: CustomProviderConfig,
    pub skills: SkillsConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_string(),
            timeout_minutes: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            claude: BuiltinProviderConfig::default(),
            custom: CustomProviderConfig::default(),
            skills: SkillsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub news: u64,
    pub daily: u64,
    pub monitor: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            news: 10,
            daily: 15,
            monitor: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_seconds: 3,
        }
    }
}

/// Prompt delivery mode for the external reasoning command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Prompt substituted into the command line.
    Argument,
    /// Prompt written to the child's stdin; argv carries fixed flags only.
    Piped,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuiltinProviderConfig {
    pub command: String,
    pub prompt_flag: String,
    pub extra_args: Vec<String>,
    pub delivery: DeliveryMode,
}

impl Default for BuiltinProviderConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            prompt_flag: "-p".to_string(),
            extra_args: vec![
                "--allowedTools".to_string(),
                DEFAULT_ALLOWED_TOOLS.to_string(),
            ],
            delivery: DeliveryMode::Argument,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CustomProviderConfig {
    /// Command template; `{prompt}` marks where the prompt is substituted
    /// in argument mode.
    pub template: String,
    pub delivery: DeliveryMode,
    pub shell: bool,
}

impl Default for CustomProviderConfig {
    fn default() -> Self {
        Self {
            template: String::new(),
            delivery: DeliveryMode::Argument,
            shell: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Missing capability aborts the job before invocation.
    Strict,
    /// Missing capability logs and proceeds with a degraded prompt.
    Warn,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    pub enabled: bool,
    pub mode: EnforcementMode,
    /// Ordered search roots; first bundle match wins.
    pub search_roots: Vec<PathBuf>,
    /// Job kind -> required capability bundle name.
    pub job_map: HashMap<String, String>,
    /// Provider id -> home directory bundles are synced into.
    pub provider_home: HashMap<String, String>,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        let mut job_map = HashMap::new();
        job_map.insert("news".to_string(), "news-stock-picker".to_string());
        job_map.insert("daily".to_string(), "tw-stock-analyzer".to_string());
        job_map.insert("monitor".to_string(), "single-stock-analyzer".to_string());

        let mut provider_home = HashMap::new();
        provider_home.insert("claude".to_string(), "~/.claude/skills".to_string());
        provider_home.insert("custom".to_string(), "~/.codex/skills".to_string());

        Self {
            enabled: true,
            mode: EnforcementMode::Strict,
            search_roots: vec![PathBuf::from("skills")],
            job_map,
            provider_home,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub risk_level: String,
    pub capital: f64,
    pub trading_period: String,
    pub holdings: Vec<String>,
    pub focus_sectors: Vec<String>,
    pub monitor_buy_ratio: f64,
    pub monitor_sell_ratio: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            risk_level: "moderate".to_string(),
            capital: 1_000_000.0,
            trading_period: "short".to_string(),
            holdings: Vec::new(),
            focus_sectors: Vec::new(),
            monitor_buy_ratio: 0.2,
            monitor_sell_ratio: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Share of capital one position may consume.
    pub max_position_pct: f64,
    /// Cap on accepted buy candidates per run.
    pub max_open_positions: usize,
    /// Existing-holdings cap per instrument, in shares.
    pub max_holding_quantity: u64,
    /// Shares per board lot, used for notional sizing.
    pub board_lot: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_pct: 0.2,
            max_open_positions: 5,
            max_holding_quantity: 5_000,
            board_lot: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SignalsConfig {
    pub success_policy: SuccessPolicy,
    pub min_bullish_factors: usize,
    pub min_bearish_factors: usize,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            success_policy: SuccessPolicy::Any,
            min_bullish_factors: 3,
            min_bearish_factors: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: String,
    pub password: String,
    pub recipient: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 587,
            sender: String::new(),
            password: String::new(),
            recipient: String::new(),
        }
    }
}

impl EmailConfig {
    /// Whether enough fields are present to build a transport.
    pub fn is_configured(&self) -> bool {
        !self.smtp_host.is_empty() && !self.sender.is_empty() && !self.recipient.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CalendarConfig {
    /// Exchange holidays as ISO dates, e.g. `"2026-02-17"`.
    pub holidays: Vec<String>,
}

fn resolve_value(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => *s = resolve_env_tokens(s),
        toml::Value::Array(items) => items.iter_mut().for_each(resolve_value),
        toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| resolve_value(v)),
        _ => {}
    }
}

fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replace `${NAME}` / `${NAME:default}` tokens with environment values.
/// Malformed tokens are left as-is.
fn resolve_env_tokens(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let token = &tail[..end];
        let (name, default) = match token.split_once(':') {
            Some((n, d)) => (n, Some(d)),
            None => (token, None),
        };
        if is_env_name(name) {
            match std::env::var(name) {
                Ok(v) => out.push_str(&v),
                Err(_) => out.push_str(default.unwrap_or("")),
            }
        } else {
            out.push_str(&rest[start..start + 2 + end + 1]);
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}
