//! Patient rows from the warehouse table
//!
//! Columns are selected and decoded through the schema registry, so the
//! API serves exactly the shape the pipeline loads.

use readmit_etl::{load::validate_destination, ColumnKind, ColumnSpec, SchemaRegistry, Value};
use serde_json::Map;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::{DbError, DbResult};
use crate::patient::PatientRecord;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 500;

/// Newest row for one subject
pub async fn get_by_subject(
    pool: &PgPool,
    destination: &str,
    registry: &SchemaRegistry,
    subject_id: i64,
) -> DbResult<Option<PatientRecord>> {
    let sql = format!(
        "{} WHERE subject_id = $1 ORDER BY loaded_at DESC, id DESC LIMIT 1",
        select_clause(destination, registry)?
    );

    let row = sqlx::query(&sql)
        .bind(subject_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| decode_record(&r, registry)).transpose()
}

/// Most recently loaded rows, newest first
pub async fn list_recent(
    pool: &PgPool,
    destination: &str,
    registry: &SchemaRegistry,
    limit: i64,
) -> DbResult<Vec<PatientRecord>> {
    let sql = format!(
        "{} ORDER BY loaded_at DESC, id DESC LIMIT $1",
        select_clause(destination, registry)?
    );

    let rows = sqlx::query(&sql)
        .bind(limit.clamp(1, MAX_LIST_LIMIT))
        .fetch_all(pool)
        .await?;

    rows.iter().map(|r| decode_record(r, registry)).collect()
}

fn select_clause(destination: &str, registry: &SchemaRegistry) -> DbResult<String> {
    validate_destination(destination).map_err(|e| DbError::InvalidTable(e.to_string()))?;

    let columns = registry
        .columns()
        .iter()
        .map(ColumnSpec::sql_name)
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("SELECT {} FROM {}", columns, destination))
}

fn decode_record(row: &PgRow, registry: &SchemaRegistry) -> DbResult<PatientRecord> {
    let mut fields = Map::with_capacity(registry.len());
    for spec in registry.columns() {
        fields.insert(spec.name.clone(), decode_value(row, spec)?.to_json());
    }
    Ok(PatientRecord::new(fields))
}

fn decode_value(row: &PgRow, spec: &ColumnSpec) -> Result<Value, sqlx::Error> {
    let column = spec.sql_name();
    let value = match spec.kind {
        ColumnKind::Identifier | ColumnKind::Count | ColumnKind::Timestamp => row
            .try_get::<Option<i64>, _>(column.as_str())?
            .map(Value::Int),
        ColumnKind::Flag | ColumnKind::Target => row
            .try_get::<Option<bool>, _>(column.as_str())?
            .map(Value::Bool),
        ColumnKind::Hours => row
            .try_get::<Option<f64>, _>(column.as_str())?
            .map(Value::Float),
        ColumnKind::Text => row
            .try_get::<Option<String>, _>(column.as_str())?
            .map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_select_clause_follows_registry_order() {
        let registry = SchemaRegistry::readmission();
        let sql = select_clause("readmission", &registry).unwrap();

        assert!(sql.starts_with("SELECT subject_id, "));
        assert!(sql.ends_with(" FROM readmission"));
        assert_eq!(sql.matches(", ").count(), registry.len() - 1);
    }

    #[test]
    fn test_select_clause_rejects_unsafe_table() {
        let registry = SchemaRegistry::readmission();
        let err = select_clause("readmission; DROP TABLE x", &registry).unwrap_err();
        assert!(matches!(err, DbError::InvalidTable(_)));
    }
}
