//! Usage accounting for ragloom.
//!
//! Counts how often wrapped operations were actually called versus served
//! from cache, accumulates token usage reported by completion backends, and
//! keeps long payloads out of debug logs unless verbose logging is on.

pub mod log;
pub mod stats;
pub mod tokens;

pub use log::LogVerbosity;
pub use stats::{CallStatistics, StatisticsSnapshot};
pub use tokens::{TokenTracker, TokenUsage, UsageSnapshot};
