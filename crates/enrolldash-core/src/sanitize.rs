//! Normalization of untrusted chart records.
//!
//! The charts endpoint returns loosely shaped JSON. Everything that reaches
//! the dashboard state goes through `sanitize` first, which never fails: bad
//! input produces fewer records, not an error.

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{ChartKind, ChartRecord, ChartSnapshot, ChartsResponse};

/// Fallback field for the record code when the kind-specific one is missing.
const CODE_FALLBACK_FIELD: &str = "code";

/// Fallback field for the display name.
const NAME_FALLBACK_FIELD: &str = "name";

/// Count fields, checked in order. `studentCount` lets sanitized output be
/// fed back through unchanged.
const COUNT_FIELDS: [&str; 3] = ["student_count", "studentCount", "count"];

/// Sanitize one raw chart series.
///
/// Non-array input yields an empty list. Non-object entries are skipped and
/// do not count towards the `{kind}_{index}` position of synthetic codes.
/// Records whose count resolves to zero are dropped, and the result is sorted
/// by descending count with ties kept in their original order.
pub fn sanitize(raw: &Value, kind: ChartKind) -> Vec<ChartRecord> {
    let Some(items) = raw.as_array() else {
        if !raw.is_null() {
            debug!(%kind, "Chart series is not an array, ignoring");
        }
        return Vec::new();
    };

    let mut records: Vec<ChartRecord> = items
        .iter()
        .filter_map(Value::as_object)
        .enumerate()
        .map(|(index, obj)| to_record(obj, kind, index))
        .filter(|record| record.student_count > 0)
        .collect();

    // sort_by is stable, so equal counts keep their input order
    records.sort_by(|a, b| b.student_count.cmp(&a.student_count));

    if records.len() != items.len() {
        debug!(%kind, raw = items.len(), kept = records.len(), "Dropped chart records");
    }

    records
}

/// Sanitize both series of a charts response.
pub fn sanitize_charts(raw: &ChartsResponse) -> ChartSnapshot {
    ChartSnapshot {
        by_program: sanitize(&raw.students_by_program, ChartKind::Program),
        by_college: sanitize(&raw.students_by_college, ChartKind::College),
    }
}

fn to_record(obj: &Map<String, Value>, kind: ChartKind, index: usize) -> ChartRecord {
    let code = text_field(obj, kind.code_field())
        .or_else(|| text_field(obj, CODE_FALLBACK_FIELD))
        .unwrap_or_else(|| format!("{}_{}", kind.prefix(), index));

    let name = text_field(obj, kind.name_field())
        .or_else(|| text_field(obj, NAME_FALLBACK_FIELD))
        .unwrap_or_else(|| code.clone());

    let student_count = COUNT_FIELDS
        .iter()
        .find_map(|field| obj.get(*field).filter(|v| !v.is_null()))
        .map(coerce_count)
        .unwrap_or(0);

    ChartRecord {
        code,
        name,
        student_count,
    }
}

/// Read a field as non-empty trimmed text. Numbers are rendered as strings;
/// anything else counts as absent.
fn text_field(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Coerce a count to a non-negative integer. Non-numeric, negative, and
/// non-finite values become 0; fractions truncate.
fn coerce_count(value: &Value) -> u64 {
    let number = match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return v;
            }
            n.as_f64()
        }
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    };

    match number {
        Some(v) if v.is_finite() && v > 0.0 => v.trunc() as u64,
        _ => 0,
    }
}
