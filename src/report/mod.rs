//! Artifact parsing: structured field blocks and plan watch-lists.

pub mod parser;

pub use parser::{
    parse_plan_watchlist, parse_signal_artifact, parse_signal_report, split_field_block,
    FieldBlock, FieldValue, ParseError, ParsedReport, PlanWatchlist,
};
