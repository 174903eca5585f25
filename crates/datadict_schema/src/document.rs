//! Document Types
//!
//! Source-of-truth documents for the description workflow. A SchemaDocument
//! is what extraction produced; a DescriptionDocument is what generation
//! produced. Both are immutable inputs here: downstream stages read them to
//! export, validate, and write back, but never modify them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Logical role of a table within a segment.
///
/// The CSV review file carries this tag in its `table` column instead of the
/// physical table name; multiple physical tables can share a type, so the
/// physical identity must be recovered via the DescriptionDocument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    Master,
    Attribute,
    Behavior,
}

impl TableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableType::Master => "master",
            TableType::Attribute => "attribute",
            TableType::Behavior => "behavior",
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How generation classified a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Attribute,
    Behavior,
}

/// A column as extracted from the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
}

/// A physical table as extracted from the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaTable {
    pub table_type: TableType,
    pub database: String,
    pub table: String,
    pub columns: Vec<SchemaColumn>,
}

/// The extracted source-of-truth for a segment.
///
/// `samples` holds optional sample rows per table type, used only to improve
/// PII detection during CSV export. Values are raw JSON because sample cells
/// can be any warehouse type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub segment_name: String,
    pub tables: Vec<SchemaTable>,
    #[serde(default)]
    pub samples: BTreeMap<TableType, Vec<BTreeMap<String, serde_json::Value>>>,
}

impl SchemaDocument {
    /// Look up an extracted column type by `(table_type, column_name)`.
    pub fn column_type(&self, table_type: TableType, column: &str) -> Option<&str> {
        self.tables
            .iter()
            .filter(|t| t.table_type == table_type)
            .flat_map(|t| t.columns.iter())
            .find(|c| c.name == column)
            .map(|c| c.col_type.as_str())
    }

    /// Sample values for one column of one table type, nulls removed.
    pub fn sample_values(&self, table_type: TableType, column: &str) -> Vec<String> {
        let Some(rows) = self.samples.get(&table_type) else {
            return Vec::new();
        };
        rows.iter()
            .filter_map(|row| row.get(column))
            .filter(|v| !v.is_null())
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// A generated column description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionColumn {
    pub column_name: String,
    #[serde(default)]
    pub description: String,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_hint: Option<String>,
    /// Warehouse type, present once schema types have been merged in.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub col_type: Option<String>,
}

/// One table's worth of generated descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionTable {
    pub table_type: TableType,
    pub database: String,
    pub table: String,
    pub columns: Vec<DescriptionColumn>,
}

impl DescriptionTable {
    /// The `source` value the CSV round-trip uses for this table's columns.
    /// Falls back to the "TD" sentinel when extraction recorded no database,
    /// matching the export format.
    pub fn source(&self) -> &str {
        if self.database.is_empty() {
            "TD"
        } else {
            &self.database
        }
    }
}

/// The generated description document for a segment. Produced once by
/// generation, consumed by export, and used by validation as the original
/// to diff the edited CSV against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionDocument {
    pub segment_name: String,
    pub generated_at: DateTime<Utc>,
    pub tables: Vec<DescriptionTable>,
}

impl DescriptionDocument {
    /// Total column count across all tables.
    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }

    /// Return a copy with warehouse types filled in from the extracted
    /// schema, so immutable-field validation has types to compare against.
    /// Columns the schema does not know keep whatever type they carried.
    pub fn with_schema_types(&self, schema: &SchemaDocument) -> DescriptionDocument {
        let mut merged = self.clone();
        for table in &mut merged.tables {
            for column in &mut table.columns {
                if let Some(col_type) = schema.column_type(table.table_type, &column.column_name) {
                    column.col_type = Some(col_type.to_string());
                }
            }
        }
        merged
    }
}

/// Column in the form snapshots record and the fetch API returns:
/// `[name, type, description]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTriple(pub String, pub String, pub String);

impl ColumnTriple {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn col_type(&self) -> &str {
        &self.1
    }

    pub fn description(&self) -> &str {
        &self.2
    }
}

/// Column in the form the schema-replace API expects:
/// `[name, type, alias, description]`. The alias slot is passed through as
/// null so an update never clears unrelated metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnQuad(pub String, pub String, pub Option<String>, pub String);

impl ColumnQuad {
    /// Build a write payload from a fetched triple, substituting a new
    /// description when one is supplied.
    pub fn from_triple(current: &ColumnTriple, new_description: Option<&str>) -> Self {
        ColumnQuad(
            current.0.clone(),
            current.1.clone(),
            None,
            new_description.unwrap_or(current.description()).to_string(),
        )
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn col_type(&self) -> &str {
        &self.1
    }

    pub fn description(&self) -> &str {
        &self.3
    }

    /// The triple a reader would see after this quad is applied.
    pub fn to_triple(&self) -> ColumnTriple {
        ColumnTriple(self.0.clone(), self.1.clone(), self.3.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_doc() -> SchemaDocument {
        serde_json::from_value(serde_json::json!({
            "segment_name": "Customer",
            "tables": [
                {
                    "table_type": "master",
                    "database": "prod_db",
                    "table": "customers",
                    "columns": [
                        { "name": "customer_id", "type": "string" },
                        { "name": "email", "type": "string" }
                    ]
                },
                {
                    "table_type": "behavior",
                    "database": "prod_db",
                    "table": "events",
                    "columns": [
                        { "name": "event_ts", "type": "long" }
                    ]
                }
            ],
            "samples": {
                "master": [
                    { "customer_id": "c-1", "email": "a@example.com", "age": 41 },
                    { "customer_id": "c-2", "email": null }
                ]
            }
        }))
        .expect("schema document should deserialize")
    }

    #[test]
    fn test_column_type_lookup_scoped_by_table_type() {
        let doc = schema_doc();
        assert_eq!(doc.column_type(TableType::Master, "email"), Some("string"));
        assert_eq!(doc.column_type(TableType::Behavior, "event_ts"), Some("long"));
        assert_eq!(doc.column_type(TableType::Behavior, "email"), None);
    }

    #[test]
    fn test_sample_values_skip_nulls_and_stringify() {
        let doc = schema_doc();
        assert_eq!(
            doc.sample_values(TableType::Master, "email"),
            vec!["a@example.com".to_string()]
        );
        assert_eq!(doc.sample_values(TableType::Master, "age"), vec!["41".to_string()]);
        assert!(doc.sample_values(TableType::Attribute, "email").is_empty());
    }

    #[test]
    fn test_with_schema_types_fills_missing_types() {
        let schema = schema_doc();
        let descriptions: DescriptionDocument = serde_json::from_value(serde_json::json!({
            "segment_name": "Customer",
            "generated_at": "2026-02-02T10:00:00Z",
            "tables": [{
                "table_type": "master",
                "database": "prod_db",
                "table": "customers",
                "columns": [
                    { "column_name": "email", "description": "Email", "classification": "attribute" }
                ]
            }]
        }))
        .expect("description document should deserialize");

        assert_eq!(descriptions.tables[0].columns[0].col_type, None);
        let merged = descriptions.with_schema_types(&schema);
        assert_eq!(merged.tables[0].columns[0].col_type.as_deref(), Some("string"));
    }

    #[test]
    fn test_quad_from_triple_preserves_current_description() {
        let current = ColumnTriple("id".into(), "string".into(), "old".into());
        let kept = ColumnQuad::from_triple(&current, None);
        assert_eq!(kept.description(), "old");
        assert_eq!(kept.2, None);

        let replaced = ColumnQuad::from_triple(&current, Some("new"));
        assert_eq!(replaced.description(), "new");
        assert_eq!(replaced.to_triple(), ColumnTriple("id".into(), "string".into(), "new".into()));
    }

    #[test]
    fn test_triple_serializes_as_array() {
        let triple = ColumnTriple("email".into(), "string".into(), "Email address".into());
        let json = serde_json::to_string(&triple).expect("serialize");
        assert_eq!(json, r#"["email","string","Email address"]"#);
    }

    #[test]
    fn test_source_falls_back_to_sentinel() {
        let table = DescriptionTable {
            table_type: TableType::Master,
            database: String::new(),
            table: "customers".into(),
            columns: Vec::new(),
        };
        assert_eq!(table.source(), "TD");
    }
}
