use super::TableInfo;
use super::registry::SchemaRegistry;
use crate::error::Result;
use crate::vector_store::VectorStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const META_TABLE_ID: &str = "tableId";

/// Semantic index over per-table descriptive text, keyed by table id.
pub struct SchemaIndex {
    store: Arc<dyn VectorStore>,
    registry: Arc<SchemaRegistry>,
}

impl SchemaIndex {
    pub fn new(store: Arc<dyn VectorStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self { store, registry }
    }

    /// Delete-then-add so a stale vector never outlives an update.
    pub async fn index(&self, table: &TableInfo) -> Result<()> {
        self.store.delete(std::slice::from_ref(&table.id)).await?;
        self.store
            .upsert(&table.id, &table.to_embedding_text(), index_metadata(table))
            .await?;
        debug!("Indexed table {} ({})", table.table_name, table.id);
        Ok(())
    }

    pub async fn unindex(&self, table_id: &str) -> Result<()> {
        self.store.delete(&[table_id.to_string()]).await?;
        debug!("Removed table {} from index", table_id);
        Ok(())
    }

    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<TableInfo>> {
        Ok(self
            .retrieve_with_score(query, top_k)
            .await?
            .into_iter()
            .map(|(table, _)| table)
            .collect())
    }

    /// Candidates with their cosine similarity, best first. Hits whose id no
    /// longer resolves in the registry are dropped.
    pub async fn retrieve_with_score(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(TableInfo, f32)>> {
        let hits = self.store.search(query, top_k).await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let table_id = hit
                .metadata
                .get(META_TABLE_ID)
                .cloned()
                .unwrap_or(hit.id);
            match self.registry.get(&table_id).await {
                Ok(table) => results.push((table, hit.score)),
                Err(_) => warn!("Index entry {} has no registry table, skipping", table_id),
            }
        }
        debug!("Retrieved {} candidate tables for query", results.len());
        Ok(results)
    }

    pub async fn indexed_ids(&self) -> Result<Vec<String>> {
        Ok(self.store.ids().await?)
    }
}

fn index_metadata(table: &TableInfo) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert(META_TABLE_ID.to_string(), table.id.clone());
    metadata.insert("tableName".to_string(), table.table_name.clone());
    let optional = [
        ("tableAlias", &table.table_alias),
        ("dbType", &table.db_type),
        ("databaseName", &table.database_name),
        ("description", &table.description),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            metadata.insert(key.to_string(), value.clone());
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashing::HashingEmbedder;
    use crate::schema::{ColumnSpec, TableSpec};
    use crate::vector_store::InMemoryVectorStore;

    fn setup() -> (Arc<SchemaRegistry>, SchemaIndex) {
        let registry = Arc::new(SchemaRegistry::new());
        let store = Arc::new(InMemoryVectorStore::new(Arc::new(
            HashingEmbedder::new(1 << 16).unwrap(),
        )));
        let index = SchemaIndex::new(store, Arc::clone(&registry));
        (registry, index)
    }

    fn users_spec() -> TableSpec {
        TableSpec::new("users")
            .description("stores registered user records")
            .column(ColumnSpec::new("user_id", "BIGINT").primary_key())
            .column(ColumnSpec::new("username", "VARCHAR"))
            .column(ColumnSpec::new("email", "VARCHAR"))
    }

    #[tokio::test]
    async fn test_retrieve_ranks_matching_table_first() {
        let (registry, index) = setup();
        let users = registry.upsert(users_spec()).await.unwrap();
        let products = registry
            .upsert(
                TableSpec::new("products")
                    .description("catalog items with price and stock")
                    .column(ColumnSpec::new("product_id", "BIGINT")),
            )
            .await
            .unwrap();
        index.index(&users).await.unwrap();
        index.index(&products).await.unwrap();

        let scored = index.retrieve_with_score("how many users are there", 2).await.unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].0.table_name, "users");
        assert!(scored[0].1 > scored[1].1);

        let top = index.retrieve("how many users are there", 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, users.id);
    }

    #[tokio::test]
    async fn test_reindex_keeps_single_entry() {
        let (registry, index) = setup();
        let users = registry.upsert(users_spec()).await.unwrap();
        index.index(&users).await.unwrap();

        let updated = registry
            .upsert(users_spec().description("customer accounts"))
            .await
            .unwrap();
        index.index(&updated).await.unwrap();

        assert_eq!(index.indexed_ids().await.unwrap(), vec![users.id.clone()]);
        let hits = index.retrieve("customer accounts", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_drifted_entries_are_dropped() {
        let (registry, index) = setup();
        let users = registry.upsert(users_spec()).await.unwrap();
        index.index(&users).await.unwrap();

        // registry write without the matching index update
        registry.delete(&users.id).await;

        assert!(index.retrieve("users", 3).await.unwrap().is_empty());
        assert_eq!(index.indexed_ids().await.unwrap().len(), 1);

        index.unindex(&users.id).await.unwrap();
        assert!(index.indexed_ids().await.unwrap().is_empty());
    }

    #[test]
    fn test_metadata_round_trips_table_id() {
        let table = TableInfo::from_spec(
            "abc".to_string(),
            users_spec(),
            chrono::Utc::now(),
            true,
        );
        let metadata = index_metadata(&table);
        assert_eq!(metadata.get(META_TABLE_ID).map(String::as_str), Some("abc"));
        assert_eq!(metadata.get("tableName").map(String::as_str), Some("users"));
        assert!(!metadata.contains_key("tableAlias"));
    }
}
