//! signalyst: unattended trading-intelligence report scheduler.
//!
//! Drives an external natural-language reasoning CLI on a cron clock,
//! validates that each run actually produced a fresh report artifact,
//! extracts structured trade signals from the artifacts, filters them
//! through a risk policy, and notifies an operator. Runs under a
//! single-instance lease.

pub mod ai;
pub mod config;
pub mod core;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod notify;
pub mod report;
pub mod reporting;
pub mod risk;
pub mod signals;
