// Schema registry for the readmission table
//
// The registry is the single source of truth for which columns a loaded row
// carries, in which order, and how each column is coerced. The normalizer,
// the coercer and the loader all read it; nothing else hard-codes column names.

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};

/// Semantic type of a registry column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Integer key, null when unparseable
    Identifier,
    /// Non-negative integer, 0 when missing or unparseable
    Count,
    /// Boolean, false when missing
    Flag,
    /// Instant, stored as integer epoch seconds
    Timestamp,
    /// Derived duration in hours, nullable float
    Hours,
    /// Free text, passed through
    Text,
    /// Nullable boolean label
    Target,
}

impl ColumnKind {
    /// PostgreSQL column type used by the destination table
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Identifier | ColumnKind::Count | ColumnKind::Timestamp => "BIGINT",
            ColumnKind::Flag | ColumnKind::Target => "BOOLEAN",
            ColumnKind::Hours => "DOUBLE PRECISION",
            ColumnKind::Text => "TEXT",
        }
    }
}

/// One column of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Name as it appears in the warehouse (unquoted, lowercase)
    pub fn sql_name(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Columns that are recomputed rather than read from the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub admission: String,
    pub discharge: String,
    pub length_of_stay: String,
    pub previous_admissions: String,
    pub frequent_flyer: String,
    /// A patient is a frequent flyer when previous admissions exceed this
    pub frequent_flyer_threshold: i64,
}

impl Default for DerivedFeatures {
    fn default() -> Self {
        Self {
            admission: "ADMITTIME".to_string(),
            discharge: "DISCHTIME".to_string(),
            length_of_stay: "HOSPITAL_LOS_HOURS".to_string(),
            previous_admissions: "PREVIOUS_ADMISSIONS".to_string(),
            frequent_flyer: "FREQUENT_FLYER".to_string(),
            frequent_flyer_threshold: 3,
        }
    }
}

/// Ordered list of expected columns plus the derived-feature wiring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    columns: Vec<ColumnSpec>,
    derived: DerivedFeatures,
}

const READMISSION_COLUMNS: &[(&str, ColumnKind)] = &[
    ("SUBJECT_ID", ColumnKind::Identifier),
    ("DAYS_SINCE_LAST_ADMISSION", ColumnKind::Count),
    ("PREVIOUS_ADMISSIONS", ColumnKind::Count),
    ("FREQUENT_FLYER", ColumnKind::Flag),
    ("TOTAL_ICU_LOS_HOURS", ColumnKind::Count),
    ("HOSPITAL_LOS_HOURS", ColumnKind::Hours),
    ("NUM_ICU_STAYS", ColumnKind::Count),
    ("CHARLSON_SCORE", ColumnKind::Count),
    ("HAS_RENAL_FAILURE", ColumnKind::Flag),
    ("ADMITTIME", ColumnKind::Timestamp),
    ("DISCHTIME", ColumnKind::Timestamp),
    ("CHARLSON_CHF", ColumnKind::Flag),
    ("TOTAL_DIAGNOSES", ColumnKind::Count),
    ("AGE", ColumnKind::Count),
    ("HAS_ANTICOAGULANTS", ColumnKind::Flag),
    ("DIAGNOSIS", ColumnKind::Text),
    ("CHARLSON_COPD", ColumnKind::Flag),
    ("HAS_OPIOIDS", ColumnKind::Flag),
    ("TOTAL_MEDICATIONS", ColumnKind::Count),
    ("HAS_INSULIN", ColumnKind::Flag),
    ("HAS_ANTIBIOTICS", ColumnKind::Flag),
    ("HAS_DIURETICS", ColumnKind::Flag),
    ("HAS_PNEUMONIA", ColumnKind::Flag),
    ("CHARLSON_MI", ColumnKind::Flag),
    ("AGE_CATEGORY", ColumnKind::Count),
    ("READMIT_30", ColumnKind::Target),
];

impl SchemaRegistry {
    /// Build a registry, checking that the derived features point at
    /// columns of the right kind
    pub fn new(columns: Vec<ColumnSpec>, derived: DerivedFeatures) -> Result<Self> {
        let registry = Self { columns, derived };
        registry.validate()?;
        Ok(registry)
    }

    /// The 26-column readmission schema
    pub fn readmission() -> Self {
        Self {
            columns: READMISSION_COLUMNS
                .iter()
                .map(|(name, kind)| ColumnSpec::new(*name, *kind))
                .collect(),
            derived: DerivedFeatures::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(EtlError::config("schema registry has no columns"));
        }

        for (i, column) in self.columns.iter().enumerate() {
            if column.name.trim().is_empty() || column.name != column.name.to_uppercase() {
                return Err(EtlError::config(format!(
                    "column name '{}' must be non-empty upper case",
                    column.name
                )));
            }
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(EtlError::config(format!("duplicate column '{}'", column.name)));
            }
        }

        let expect_kind = |name: &str, kinds: &[ColumnKind]| -> Result<()> {
            match self.get(name) {
                Some(spec) if kinds.contains(&spec.kind) => Ok(()),
                Some(spec) => Err(EtlError::config(format!(
                    "derived column '{}' has kind {:?}, expected one of {:?}",
                    name, spec.kind, kinds
                ))),
                None => Err(EtlError::config(format!(
                    "derived column '{}' is not in the registry",
                    name
                ))),
            }
        };

        expect_kind(&self.derived.admission, &[ColumnKind::Timestamp])?;
        expect_kind(&self.derived.discharge, &[ColumnKind::Timestamp])?;
        expect_kind(&self.derived.length_of_stay, &[ColumnKind::Hours])?;
        expect_kind(&self.derived.previous_admissions, &[ColumnKind::Count])?;
        expect_kind(&self.derived.frequent_flyer, &[ColumnKind::Flag])?;

        Ok(())
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn derived(&self) -> &DerivedFeatures {
        &self.derived
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Columns of one kind, in registry order
    pub fn of_kind(&self, kind: ColumnKind) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(move |c| c.kind == kind)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::readmission()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_readmission_registry_order() {
        let registry = SchemaRegistry::readmission();
        let names: Vec<&str> = registry.names().collect();

        assert_eq!(names.len(), 26);
        assert_eq!(names[0], "SUBJECT_ID");
        assert_eq!(names[5], "HOSPITAL_LOS_HOURS");
        assert_eq!(names[9], "ADMITTIME");
        assert_eq!(names[25], "READMIT_30");
    }

    #[test]
    fn test_readmission_registry_is_valid() {
        let registry = SchemaRegistry::readmission();
        SchemaRegistry::new(registry.columns().to_vec(), registry.derived().clone()).unwrap();
    }

    #[test]
    fn test_kind_counts() {
        let registry = SchemaRegistry::readmission();
        assert_eq!(registry.of_kind(ColumnKind::Count).count(), 9);
        assert_eq!(registry.of_kind(ColumnKind::Flag).count(), 11);
        assert_eq!(registry.of_kind(ColumnKind::Timestamp).count(), 2);
        assert_eq!(registry.of_kind(ColumnKind::Target).count(), 1);
    }

    #[test]
    fn test_rejects_derived_column_of_wrong_kind() {
        let columns = vec![
            ColumnSpec::new("ADMITTIME", ColumnKind::Text),
            ColumnSpec::new("DISCHTIME", ColumnKind::Timestamp),
        ];
        let err = SchemaRegistry::new(columns, DerivedFeatures::default()).unwrap_err();
        assert!(err.to_string().contains("ADMITTIME"));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let mut columns = SchemaRegistry::readmission().columns().to_vec();
        columns.push(ColumnSpec::new("AGE", ColumnKind::Count));
        let err = SchemaRegistry::new(columns, DerivedFeatures::default()).unwrap_err();
        assert!(err.to_string().contains("duplicate column 'AGE'"));
    }

    #[test]
    fn test_sql_name_is_lowercase() {
        let spec = ColumnSpec::new("HOSPITAL_LOS_HOURS", ColumnKind::Hours);
        assert_eq!(spec.sql_name(), "hospital_los_hours");
        assert_eq!(spec.kind.sql_type(), "DOUBLE PRECISION");
    }
}
