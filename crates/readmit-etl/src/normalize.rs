// Column normalization
//
// Maps whatever columns a source carries onto the schema registry:
// headers are trimmed and upper-cased, registry columns the source lacks
// become all-null columns, extra source columns are dropped, and the output
// is always in registry order. A source sharing no column with the registry
// is rejected outright.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{EtlError, Result};
use crate::schema::SchemaRegistry;
use crate::table::{Table, Value};

/// Canonical form of a header cell
pub fn normalize_header(name: &str) -> String {
    name.trim().to_uppercase()
}

/// How one source's columns map onto the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: Vec<String>,
    /// For each registry column, the index of the source column feeding it
    sources: Vec<Option<usize>>,
    found: Vec<String>,
    missing: Vec<String>,
    dropped: Vec<String>,
}

impl ColumnMapping {
    /// Registry columns present in the source, in registry order
    pub fn found(&self) -> &[String] {
        &self.found
    }

    /// Registry columns filled with nulls
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Source columns not in the registry, plus duplicate headers
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Reshape a source table into registry order
    pub fn apply(&self, table: &Table) -> Table {
        let rows = table
            .rows()
            .iter()
            .map(|row| {
                self.sources
                    .iter()
                    .map(|source| match source {
                        Some(idx) => row.get(*idx).cloned().unwrap_or(Value::Null),
                        None => Value::Null,
                    })
                    .collect()
            })
            .collect();

        Table::with_rows(self.columns.clone(), rows)
    }
}

/// Maps source tables onto a schema registry
pub struct ColumnNormalizer<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> ColumnNormalizer<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Work out the mapping for a header row
    pub fn plan(&self, source_name: &str, headers: &[String]) -> Result<ColumnMapping> {
        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(headers.len());
        let mut dropped = Vec::new();

        for (idx, header) in headers.iter().enumerate() {
            let name = normalize_header(header);
            if !self.registry.contains(&name) || by_name.contains_key(&name) {
                dropped.push(header.clone());
                continue;
            }
            by_name.insert(name, idx);
        }

        if by_name.is_empty() {
            return Err(EtlError::SchemaMismatch {
                source_name: source_name.to_string(),
            });
        }

        let mut sources = Vec::with_capacity(self.registry.len());
        let mut found = Vec::new();
        let mut missing = Vec::new();

        for name in self.registry.names() {
            let source = by_name.get(name).copied();
            match source {
                Some(_) => found.push(name.to_string()),
                None => missing.push(name.to_string()),
            }
            sources.push(source);
        }

        info!(
            source = %source_name,
            found = found.len(),
            missing = missing.len(),
            "mapped source columns onto schema"
        );
        if !missing.is_empty() {
            warn!(source = %source_name, columns = ?missing, "filling absent columns with nulls");
        }
        if !dropped.is_empty() {
            debug!(source = %source_name, columns = ?dropped, "dropping columns outside the schema");
        }

        Ok(ColumnMapping {
            columns: self.registry.names().map(str::to_string).collect(),
            sources,
            found,
            missing,
            dropped,
        })
    }

    /// Plan and apply in one step
    pub fn normalize(&self, source_name: &str, table: &Table) -> Result<Table> {
        let mapping = self.plan(source_name, table.columns())?;
        Ok(mapping.apply(table))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_headers_are_trimmed_and_upper_cased() {
        assert_eq!(normalize_header("  subject_id "), "SUBJECT_ID");
        assert_eq!(normalize_header("Readmit_30"), "READMIT_30");
    }

    #[test]
    fn test_missing_columns_become_null() {
        let registry = SchemaRegistry::readmission();
        let table = Table::with_rows(
            headers(&["age", " subject_id"]),
            vec![vec![Value::text("70"), Value::text("11")]],
        );

        let out = ColumnNormalizer::new(&registry)
            .normalize("partial.csv", &table)
            .unwrap();

        let expected: Vec<&str> = registry.names().collect();
        assert_eq!(out.columns(), expected.as_slice());
        assert_eq!(out.get(0, "SUBJECT_ID"), Some(&Value::text("11")));
        assert_eq!(out.get(0, "AGE"), Some(&Value::text("70")));
        assert_eq!(out.get(0, "READMIT_30"), Some(&Value::Null));
        assert_eq!(out.get(0, "ADMITTIME"), Some(&Value::Null));
    }

    #[test]
    fn test_extra_columns_are_dropped_and_first_duplicate_wins() {
        let registry = SchemaRegistry::readmission();
        let table = Table::with_rows(
            headers(&["AGE", "ward", "age"]),
            vec![vec![Value::text("40"), Value::text("B2"), Value::text("99")]],
        );

        let normalizer = ColumnNormalizer::new(&registry);
        let mapping = normalizer.plan("dupes.csv", table.columns()).unwrap();
        assert_eq!(mapping.found(), &["AGE"]);
        assert_eq!(mapping.missing().len(), 25);
        assert_eq!(mapping.dropped(), &["ward", "age"]);

        let out = mapping.apply(&table);
        assert_eq!(out.columns().len(), 26);
        assert_eq!(out.get(0, "AGE"), Some(&Value::text("40")));
        assert!(out.column_index("WARD").is_none());
    }

    #[test]
    fn test_zero_overlap_is_rejected() {
        let registry = SchemaRegistry::readmission();
        let err = ColumnNormalizer::new(&registry)
            .plan("weather.csv", &headers(&["city", "temperature"]))
            .unwrap_err();

        assert!(matches!(
            err,
            EtlError::SchemaMismatch { ref source_name } if source_name == "weather.csv"
        ));
    }
}
