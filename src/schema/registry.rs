use super::{TableInfo, TableSpec};
use crate::error::{Nl2SqlError, Result};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Optional narrowing for [`SchemaRegistry::list`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableFilter {
    /// Exact database name match.
    pub database: Option<String>,
    /// Dialect tag, matched case-insensitively.
    pub db_type: Option<String>,
}

impl TableFilter {
    fn matches(&self, table: &TableInfo) -> bool {
        let database_ok = match &self.database {
            Some(db) => table.database_name.as_deref() == Some(db.as_str()),
            None => true,
        };
        let db_type_ok = match &self.db_type {
            Some(t) => table
                .db_type
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(t)),
            None => true,
        };
        database_ok && db_type_ok
    }
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, TableInfo>,
    /// table name -> table id
    name_index: HashMap<String, String>,
}

impl Inner {
    fn upsert(&mut self, spec: TableSpec) -> TableInfo {
        let existing = self
            .name_index
            .get(&spec.table_name)
            .and_then(|id| self.tables.get(id));

        let table = match existing {
            Some(old) => {
                debug!("Replacing table {} ({})", old.table_name, old.id);
                TableInfo::from_spec(old.id.clone(), spec, old.created_at, old.enabled)
            }
            None => TableInfo::from_spec(uuid::Uuid::new_v4().to_string(), spec, Utc::now(), true),
        };

        self.name_index
            .insert(table.table_name.clone(), table.id.clone());
        self.tables.insert(table.id.clone(), table.clone());
        table
    }

    fn remove(&mut self, id: &str) -> Option<TableInfo> {
        let table = self.tables.remove(id)?;
        self.name_index.remove(&table.table_name);
        Some(table)
    }
}

/// In-memory catalog of table definitions.
///
/// One lock guards both the id map and the name index, so a reader never sees
/// a table id paired with another write's columns.
#[derive(Default)]
pub struct SchemaRegistry {
    inner: RwLock<Inner>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the table, or fully replaces the one with the same name
    /// (keeping its id and creation time).
    pub async fn upsert(&self, spec: TableSpec) -> Result<TableInfo> {
        spec.validate()?;
        let table = self.inner.write().await.upsert(spec);
        info!("Saved table {} ({} columns)", table.table_name, table.columns.len());
        Ok(table)
    }

    /// Validates every spec before writing any of them.
    pub async fn upsert_many(&self, specs: Vec<TableSpec>) -> Result<Vec<TableInfo>> {
        for spec in &specs {
            spec.validate()?;
        }
        let mut inner = self.inner.write().await;
        let tables: Vec<TableInfo> = specs.into_iter().map(|spec| inner.upsert(spec)).collect();
        info!("Saved {} tables", tables.len());
        Ok(tables)
    }

    pub async fn get(&self, id: &str) -> Result<TableInfo> {
        self.inner
            .read()
            .await
            .tables
            .get(id)
            .cloned()
            .ok_or_else(|| Nl2SqlError::TableNotFound(id.to_string()))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<TableInfo> {
        let inner = self.inner.read().await;
        inner
            .name_index
            .get(name)
            .and_then(|id| inner.tables.get(id))
            .cloned()
            .ok_or_else(|| Nl2SqlError::TableNotFound(name.to_string()))
    }

    /// Tables for the given ids, in input order; unknown ids are skipped.
    pub async fn get_many(&self, ids: &[String]) -> Vec<TableInfo> {
        let inner = self.inner.read().await;
        ids.iter()
            .filter_map(|id| inner.tables.get(id).cloned())
            .collect()
    }

    pub async fn get_by_names(&self, names: &[String]) -> Vec<TableInfo> {
        let inner = self.inner.read().await;
        names
            .iter()
            .filter_map(|name| inner.name_index.get(name))
            .filter_map(|id| inner.tables.get(id).cloned())
            .collect()
    }

    /// Matching tables sorted by name.
    pub async fn list(&self, filter: &TableFilter) -> Vec<TableInfo> {
        let mut tables: Vec<TableInfo> = self
            .inner
            .read()
            .await
            .tables
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tables.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        tables
    }

    /// Removes the table and its columns. Absent ids are a no-op.
    pub async fn delete(&self, id: &str) -> Option<TableInfo> {
        let removed = self.inner.write().await.remove(id);
        if let Some(table) = &removed {
            info!("Deleted table {} ({})", table.table_name, table.id);
        }
        removed
    }

    pub async fn delete_by_name(&self, name: &str) -> Option<TableInfo> {
        let mut inner = self.inner.write().await;
        let id = inner.name_index.get(name).cloned()?;
        let removed = inner.remove(&id);
        if let Some(table) = &removed {
            info!("Deleted table {} ({})", table.table_name, table.id);
        }
        removed
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.tables.len()
    }

    pub async fn exists(&self, name: &str) -> bool {
        self.inner.read().await.name_index.contains_key(name)
    }
}
