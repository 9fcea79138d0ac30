pub mod bootstrap;
pub mod catalog;
pub mod index;
pub mod registry;

use crate::error::{Nl2SqlError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Number of column names included in a table's embedding text.
const EMBEDDING_COLUMN_PREVIEW: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    pub id: String,
    pub table_id: String,
    pub column_name: String,
    pub column_alias: Option<String>,
    pub description: Option<String>,
    pub data_type: String,
    pub data_length: Option<u32>,
    pub decimal_scale: Option<u32>,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub foreign_key_table: Option<String>,
    pub foreign_key_column: Option<String>,
    pub is_auto_increment: bool,
    pub ordinal_position: u32,
}

impl ColumnInfo {
    /// `VARCHAR(50)`, `DECIMAL(10,2)` or the bare type name.
    pub fn type_signature(&self) -> String {
        match (self.data_length, self.decimal_scale) {
            (Some(len), Some(scale)) => format!("{}({},{})", self.data_type, len, scale),
            (Some(len), None) => format!("{}({})", self.data_type, len),
            _ => self.data_type.clone(),
        }
    }

    /// One-line description used in model prompts:
    /// `name(alias) TYPE(len,scale) - description [PK] [FK]`.
    pub fn to_description(&self) -> String {
        let mut desc = self.column_name.clone();
        if let Some(alias) = non_empty(&self.column_alias) {
            desc.push_str(&format!("({})", alias));
        }
        desc.push(' ');
        desc.push_str(&self.type_signature());
        if let Some(description) = non_empty(&self.description) {
            desc.push_str(" - ");
            desc.push_str(description);
        }
        if self.is_primary_key {
            desc.push_str(" [PK]");
        }
        if self.is_foreign_key {
            desc.push_str(" [FK]");
        }
        desc
    }

    pub fn to_sql_definition(&self) -> String {
        let nullable_str = if self.nullable { "" } else { " NOT NULL" };
        let default_str = self
            .default_value
            .as_ref()
            .map(|v| format!(" DEFAULT {}", v))
            .unwrap_or_default();
        format!(
            "{} {}{}{}",
            self.column_name,
            self.type_signature(),
            nullable_str,
            default_str
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableInfo {
    pub id: String,
    pub table_name: String,
    pub table_alias: Option<String>,
    pub description: Option<String>,
    pub db_type: Option<String>,
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Option<String>,
    /// column name -> "table.column"
    pub foreign_keys: BTreeMap<String, String>,
    pub indexes: Vec<IndexInfo>,
    pub estimated_rows: Option<u64>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TableInfo {
    /// Builds a table record from a validated spec. Column ids are always fresh.
    pub(crate) fn from_spec(
        id: String,
        spec: TableSpec,
        created_at: DateTime<Utc>,
        enabled: bool,
    ) -> Self {
        let columns: Vec<ColumnInfo> = spec
            .columns
            .into_iter()
            .enumerate()
            .map(|(i, col)| col.into_column(&id, i))
            .collect();

        let primary_key = spec.primary_key.or_else(|| {
            columns
                .iter()
                .find(|c| c.is_primary_key)
                .map(|c| c.column_name.clone())
        });

        let mut foreign_keys = spec.foreign_keys;
        for col in columns.iter().filter(|c| c.is_foreign_key) {
            if let (Some(table), Some(column)) = (&col.foreign_key_table, &col.foreign_key_column) {
                foreign_keys
                    .entry(col.column_name.clone())
                    .or_insert_with(|| format!("{}.{}", table, column));
            }
        }

        Self {
            id,
            table_name: spec.table_name,
            table_alias: spec.table_alias,
            description: spec.description,
            db_type: spec.db_type,
            database_name: spec.database_name,
            schema_name: spec.schema_name,
            columns,
            primary_key,
            foreign_keys,
            indexes: spec.indexes,
            estimated_rows: spec.estimated_rows,
            metadata: spec.metadata,
            enabled,
            created_at,
            updated_at: Utc::now(),
        }
    }

    /// Deterministic text projection fed to the embedding model.
    pub fn to_embedding_text(&self) -> String {
        let mut text = format!("table: {}", self.table_name);
        if let Some(alias) = non_empty(&self.table_alias) {
            text.push_str(&format!(", alias: {}", alias));
        }
        text.push_str("\ndescription: ");
        text.push_str(self.description.as_deref().unwrap_or(""));

        if !self.columns.is_empty() {
            let preview: Vec<&str> = self
                .columns
                .iter()
                .take(EMBEDDING_COLUMN_PREVIEW)
                .map(|c| c.column_name.as_str())
                .collect();
            text.push_str("\nincludes columns: ");
            text.push_str(&preview.join(", "));
            if self.columns.len() > EMBEDDING_COLUMN_PREVIEW {
                text.push_str(&format!(
                    " ...and {} more",
                    self.columns.len() - EMBEDDING_COLUMN_PREVIEW
                ));
            }
        }
        text
    }

    pub fn to_ddl(&self) -> String {
        let mut definitions: Vec<String> = self
            .columns
            .iter()
            .map(|col| col.to_sql_definition())
            .collect();

        if let Some(pk) = &self.primary_key {
            definitions.push(format!("PRIMARY KEY ({})", pk));
        }

        for (column, reference) in &self.foreign_keys {
            if let Some((table, target)) = reference.split_once('.') {
                definitions.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    column, table, target
                ));
            }
        }

        format!(
            "CREATE TABLE {} (\n    {}\n);",
            self.table_name,
            definitions.join(",\n    ")
        )
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.column_name.clone()).collect()
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.column_name.eq_ignore_ascii_case(name))
    }
}

/// Submitted table definition; registering it fully replaces any table of the same name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSpec {
    pub table_name: String,
    #[serde(default)]
    pub table_alias: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub db_type: Option<String>,
    #[serde(default)]
    pub database_name: Option<String>,
    #[serde(default)]
    pub schema_name: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, String>,
    #[serde(default)]
    pub indexes: Vec<IndexInfo>,
    #[serde(default)]
    pub estimated_rows: Option<u64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl TableSpec {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.table_alias = Some(alias.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn db_type(mut self, db_type: impl Into<String>) -> Self {
        self.db_type = Some(db_type.into());
        self
    }

    pub fn database(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = Some(database_name.into());
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(Nl2SqlError::InvalidTable(
                "table name must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if col.column_name.trim().is_empty() {
                return Err(Nl2SqlError::InvalidTable(format!(
                    "table {} has a column without a name",
                    self.table_name
                )));
            }
            if !seen.insert(col.column_name.to_lowercase()) {
                return Err(Nl2SqlError::InvalidTable(format!(
                    "duplicate column {} in table {}",
                    col.column_name, self.table_name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub column_name: String,
    #[serde(default)]
    pub column_alias: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default)]
    pub data_length: Option<u32>,
    #[serde(default)]
    pub decimal_scale: Option<u32>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default)]
    pub foreign_key_table: Option<String>,
    #[serde(default)]
    pub foreign_key_column: Option<String>,
    #[serde(default)]
    pub is_auto_increment: bool,
    #[serde(default)]
    pub ordinal_position: Option<u32>,
}

fn default_data_type() -> String {
    "VARCHAR".to_string()
}

impl ColumnSpec {
    pub fn new(column_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.column_alias = Some(alias.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.data_length = Some(length);
        self
    }

    pub fn scale(mut self, length: u32, scale: u32) -> Self {
        self.data_length = Some(length);
        self.decimal_scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = Some(false);
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.is_foreign_key = true;
        self.foreign_key_table = Some(table.into());
        self.foreign_key_column = Some(column.into());
        self
    }

    fn into_column(self, table_id: &str, index: usize) -> ColumnInfo {
        ColumnInfo {
            id: uuid::Uuid::new_v4().to_string(),
            table_id: table_id.to_string(),
            column_name: self.column_name,
            column_alias: self.column_alias,
            description: self.description,
            data_type: self.data_type,
            data_length: self.data_length,
            decimal_scale: self.decimal_scale,
            nullable: self.nullable.unwrap_or(true),
            default_value: self.default_value,
            is_primary_key: self.is_primary_key,
            is_foreign_key: self.is_foreign_key,
            foreign_key_table: self.foreign_key_table,
            foreign_key_column: self.foreign_key_column,
            is_auto_increment: self.is_auto_increment,
            ordinal_position: self.ordinal_position.unwrap_or(index as u32 + 1),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}
