//! Data models for the dashboard feed.
//!
//! - `StatsSnapshot`: headline totals (students, programs, colleges)
//! - `ChartRecord`, `ChartSnapshot`: sanitized per-program and per-college counts
//! - `StatsResponse`, `ChartsResponse`: raw wire shapes from the backend
//! - `FetchState`: where the coordinator is in its refresh cycle

pub mod chart;
pub mod state;
pub mod stats;

pub use chart::{ChartKind, ChartRecord, ChartSnapshot, ChartsResponse};
pub use state::FetchState;
pub use stats::{StatsResponse, StatsSnapshot};
