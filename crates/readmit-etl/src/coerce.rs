// Type coercion and feature derivation
//
// Applied to a normalized table, in this order:
//   1. parse the admission/discharge timestamps (unparseable -> null)
//   2. derive HOSPITAL_LOS_HOURS from them (null if either is null)
//   3. store timestamps as integer epoch seconds
//   4. coerce flags through a truthy conversion (null -> false)
//   5. fill null counts with 0
//   6. derive FREQUENT_FLYER from PREVIOUS_ADMISSIONS
//   7. coerce counts to integers (unparseable -> 0)
//
// Nothing here fails. Each cell is classified as absent, valid, or present
// but invalid, and every cell that had to be filled or defaulted is counted
// in a `CoercionReport`. Running the coercer over its own output changes
// nothing.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::schema::{ColumnKind, SchemaRegistry};
use crate::table::{Table, Value};

const SECONDS_PER_HOUR: f64 = 3600.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// `YYYYMMDD`, only tried on eight-digit cells
const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

const TRUTHY: &[&str] = &["true", "t", "yes", "y", "1"];
const FALSY: &[&str] = &["false", "f", "no", "n", "0"];

/// Result of interpreting one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellOutcome<T> {
    /// The cell was null
    Absent,
    /// The cell held a usable value
    Valid(T),
    /// The cell held something that could not be interpreted
    Invalid,
}

impl<T> CellOutcome<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            CellOutcome::Valid(v) => Some(v),
            _ => None,
        }
    }
}

/// Interpret a cell as an instant, in epoch seconds
pub fn parse_timestamp(value: &Value) -> CellOutcome<i64> {
    match value {
        Value::Null => CellOutcome::Absent,
        Value::Int(n) => CellOutcome::Valid(*n),
        Value::Float(f) if f.is_finite() => CellOutcome::Valid(f.trunc() as i64),
        Value::Text(s) => parse_timestamp_text(s.trim()),
        _ => CellOutcome::Invalid,
    }
}

fn parse_timestamp_text(s: &str) -> CellOutcome<i64> {
    if s.is_empty() {
        return CellOutcome::Absent;
    }

    // Eight digits read as a compact date before they can read as epoch seconds
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(dt) = NaiveDate::parse_from_str(s, COMPACT_DATE_FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return CellOutcome::Valid(dt.and_utc().timestamp());
        }
    }

    if let Ok(epoch) = s.parse::<i64>() {
        return CellOutcome::Valid(epoch);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return CellOutcome::Valid(dt.timestamp());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return CellOutcome::Valid(dt.and_utc().timestamp());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return CellOutcome::Valid(dt.and_utc().timestamp());
            }
        }
    }

    CellOutcome::Invalid
}

/// Interpret a cell as a boolean
pub fn parse_flag(value: &Value) -> CellOutcome<bool> {
    match value {
        Value::Null => CellOutcome::Absent,
        Value::Bool(b) => CellOutcome::Valid(*b),
        Value::Int(n) => CellOutcome::Valid(*n != 0),
        Value::Float(f) if f.is_nan() => CellOutcome::Invalid,
        Value::Float(f) => CellOutcome::Valid(*f != 0.0),
        Value::Text(s) => {
            let lowered = s.trim().to_lowercase();
            if TRUTHY.contains(&lowered.as_str()) {
                CellOutcome::Valid(true)
            } else if FALSY.contains(&lowered.as_str()) {
                CellOutcome::Valid(false)
            } else {
                match lowered.parse::<f64>() {
                    Ok(f) if !f.is_nan() => CellOutcome::Valid(f != 0.0),
                    _ => CellOutcome::Invalid,
                }
            }
        },
    }
}

/// Interpret a cell as an integer, truncating fractional values
pub fn parse_count(value: &Value) -> CellOutcome<i64> {
    match value {
        Value::Null => CellOutcome::Absent,
        Value::Int(n) => CellOutcome::Valid(*n),
        Value::Bool(b) => CellOutcome::Valid(i64::from(*b)),
        Value::Float(f) if f.is_finite() => CellOutcome::Valid(f.trunc() as i64),
        Value::Float(_) => CellOutcome::Invalid,
        Value::Text(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return CellOutcome::Valid(n);
            }
            match s.parse::<f64>() {
                Ok(f) if f.is_finite() => CellOutcome::Valid(f.trunc() as i64),
                _ => CellOutcome::Invalid,
            }
        },
    }
}

/// Per-column repair counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnTally {
    /// Null cells replaced by the column default
    pub filled: usize,
    /// Present but uninterpretable cells replaced by the column default
    pub defaulted: usize,
}

/// Counts of cells the coercer had to repair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoercionReport {
    pub rows: usize,
    pub filled_cells: usize,
    pub defaulted_cells: usize,
    pub columns: BTreeMap<String, ColumnTally>,
}

impl CoercionReport {
    fn filled(&mut self, column: &str) {
        self.filled_cells += 1;
        self.columns.entry(column.to_string()).or_default().filled += 1;
    }

    fn defaulted(&mut self, column: &str) {
        self.defaulted_cells += 1;
        self.columns.entry(column.to_string()).or_default().defaulted += 1;
    }

    /// Fold another report (e.g. from a later chunk) into this one
    pub fn merge(&mut self, other: CoercionReport) {
        self.rows += other.rows;
        self.filled_cells += other.filled_cells;
        self.defaulted_cells += other.defaulted_cells;
        for (column, tally) in other.columns {
            let entry = self.columns.entry(column).or_default();
            entry.filled += tally.filled;
            entry.defaulted += tally.defaulted;
        }
    }

    pub fn is_clean(&self) -> bool {
        self.filled_cells == 0 && self.defaulted_cells == 0
    }
}

/// Applies the registry's coercion rules to normalized tables
pub struct TypeCoercer<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> TypeCoercer<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Coerce a table whose columns are exactly the registry's, in order
    pub fn coerce(&self, mut table: Table) -> (Table, CoercionReport) {
        debug_assert!(table.columns().iter().map(String::as_str).eq(self.registry.names()));

        let mut report = CoercionReport {
            rows: table.len(),
            ..Default::default()
        };

        let derived = self.registry.derived();
        let position = |name: &str| self.registry.position(name);
        let admission = position(&derived.admission);
        let discharge = position(&derived.discharge);
        let length_of_stay = position(&derived.length_of_stay);
        let previous = position(&derived.previous_admissions);
        let frequent_flyer = position(&derived.frequent_flyer);
        let threshold = derived.frequent_flyer_threshold;

        let columns = self.registry.columns();

        for row in table.rows_mut() {
            // Steps 1-3: timestamps and length of stay
            for (idx, spec) in columns.iter().enumerate() {
                if spec.kind != ColumnKind::Timestamp {
                    continue;
                }
                row[idx] = match parse_timestamp(&row[idx]) {
                    CellOutcome::Valid(epoch) => Value::Int(epoch),
                    CellOutcome::Absent => Value::Null,
                    CellOutcome::Invalid => {
                        report.defaulted(&spec.name);
                        Value::Null
                    },
                };
            }

            if let Some(los) = length_of_stay {
                let start = admission.and_then(|i| row[i].as_i64());
                let end = discharge.and_then(|i| row[i].as_i64());
                row[los] = match (start, end) {
                    (Some(start), Some(end)) => {
                        Value::Float((end as f64 - start as f64) / SECONDS_PER_HOUR)
                    },
                    _ => Value::Null,
                };
            }

            // Step 4: flags
            for (idx, spec) in columns.iter().enumerate() {
                if spec.kind != ColumnKind::Flag || Some(idx) == frequent_flyer {
                    continue;
                }
                row[idx] = Value::Bool(match parse_flag(&row[idx]) {
                    CellOutcome::Valid(b) => b,
                    CellOutcome::Absent => {
                        report.filled(&spec.name);
                        false
                    },
                    CellOutcome::Invalid => {
                        report.defaulted(&spec.name);
                        false
                    },
                });
            }

            // Steps 5 and 7: counts, null-filled then integer-coerced
            for (idx, spec) in columns.iter().enumerate() {
                if spec.kind != ColumnKind::Count {
                    continue;
                }
                row[idx] = Value::Int(match parse_count(&row[idx]) {
                    CellOutcome::Valid(n) => n,
                    CellOutcome::Absent => {
                        report.filled(&spec.name);
                        0
                    },
                    CellOutcome::Invalid => {
                        report.defaulted(&spec.name);
                        0
                    },
                });
            }

            // Step 6: frequent flyer, always recomputed
            if let Some(ff) = frequent_flyer {
                let admissions = previous.and_then(|i| row[i].as_i64()).unwrap_or(0);
                row[ff] = Value::Bool(admissions > threshold);
            }

            // Remaining kinds keep their own null semantics
            for (idx, spec) in columns.iter().enumerate() {
                match spec.kind {
                    ColumnKind::Identifier => {
                        row[idx] = match parse_count(&row[idx]) {
                            CellOutcome::Valid(n) => Value::Int(n),
                            CellOutcome::Absent => Value::Null,
                            CellOutcome::Invalid => {
                                report.defaulted(&spec.name);
                                Value::Null
                            },
                        };
                    },
                    ColumnKind::Target => {
                        row[idx] = match parse_flag(&row[idx]) {
                            CellOutcome::Valid(b) => Value::Bool(b),
                            CellOutcome::Absent => Value::Null,
                            CellOutcome::Invalid => {
                                report.defaulted(&spec.name);
                                Value::Null
                            },
                        };
                    },
                    ColumnKind::Text => {
                        if let Some(text) = row[idx].to_text() {
                            row[idx] = Value::Text(text);
                        }
                    },
                    _ => {},
                }
            }
        }

        if report.defaulted_cells > 0 {
            warn!(
                rows = report.rows,
                defaulted = report.defaulted_cells,
                "replaced uninterpretable cells with column defaults"
            );
        }
        debug!(
            rows = report.rows,
            filled = report.filled_cells,
            defaulted = report.defaulted_cells,
            "coercion complete"
        );

        (table, report)
    }
}
