use serde::{Deserialize, Serialize};

/// Headline totals shown at the top of the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct StatsSnapshot {
    pub total_students: u64,
    pub total_programs: u64,
    pub total_colleges: u64,
}

/// Raw body of the stats endpoint. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub total_students: Option<i64>,
    #[serde(default)]
    pub total_programs: Option<i64>,
    #[serde(default)]
    pub total_colleges: Option<i64>,
}

fn non_negative(value: Option<i64>) -> u64 {
    value.map(|v| v.max(0) as u64).unwrap_or(0)
}

impl From<StatsResponse> for StatsSnapshot {
    fn from(raw: StatsResponse) -> Self {
        Self {
            total_students: non_negative(raw.total_students),
            total_programs: non_negative(raw.total_programs),
            total_colleges: non_negative(raw.total_colleges),
        }
    }
}
