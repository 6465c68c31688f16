use std::fmt;

use serde::{Deserialize, Serialize};

/// Which aggregate a chart record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ChartKind {
    Program,
    College,
}

impl ChartKind {
    /// Prefix used for wire field names and synthetic codes.
    pub fn prefix(&self) -> &'static str {
        match self {
            ChartKind::Program => "program",
            ChartKind::College => "college",
        }
    }

    /// Field carrying the record code in the raw payload (e.g. `program_code`).
    pub fn code_field(&self) -> &'static str {
        match self {
            ChartKind::Program => "program_code",
            ChartKind::College => "college_code",
        }
    }

    /// Field carrying the display name in the raw payload (e.g. `program_name`).
    pub fn name_field(&self) -> &'static str {
        match self {
            ChartKind::Program => "program_name",
            ChartKind::College => "college_name",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One bar/slice of a chart after sanitizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ChartRecord {
    pub code: String,
    pub name: String,
    pub student_count: u64,
}

/// Both chart series, each sorted by descending `student_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ChartSnapshot {
    pub by_program: Vec<ChartRecord>,
    pub by_college: Vec<ChartRecord>,
}

impl ChartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.by_program.is_empty() && self.by_college.is_empty()
    }
}

/// Raw body of the charts endpoint.
///
/// The series are kept as untyped JSON; they only become `ChartRecord`s after
/// passing through `sanitize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartsResponse {
    #[serde(default)]
    pub students_by_program: serde_json::Value,
    #[serde(default)]
    pub students_by_college: serde_json::Value,
}
