use super::index::SchemaIndex;
use super::registry::SchemaRegistry;
use super::{TableInfo, TableSpec};
use crate::error::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Schema writes that keep the registry and the semantic index in lockstep.
/// Each index update is issued only after its registry write has committed,
/// and a registry write plus its index update run as one unit under `writes`.
pub struct SchemaCatalog {
    registry: Arc<SchemaRegistry>,
    index: Arc<SchemaIndex>,
    writes: Mutex<()>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub indexed: usize,
    pub removed_orphans: usize,
}

impl SchemaCatalog {
    pub fn new(registry: Arc<SchemaRegistry>, index: Arc<SchemaIndex>) -> Self {
        Self {
            registry,
            index,
            writes: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn index(&self) -> &Arc<SchemaIndex> {
        &self.index
    }

    pub async fn save_table(&self, spec: TableSpec) -> Result<TableInfo> {
        let _guard = self.writes.lock().await;
        let table = self.registry.upsert(spec).await?;
        self.index.index(&table).await?;
        Ok(table)
    }

    pub async fn save_tables(&self, specs: Vec<TableSpec>) -> Result<Vec<TableInfo>> {
        let _guard = self.writes.lock().await;
        let tables = self.registry.upsert_many(specs).await?;
        for table in &tables {
            self.index.index(table).await?;
        }
        Ok(tables)
    }

    /// Idempotent; returns whether a table was removed.
    pub async fn delete_table(&self, id: &str) -> Result<bool> {
        let _guard = self.writes.lock().await;
        match self.registry.delete(id).await {
            Some(table) => {
                self.index.unindex(&table.id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn delete_table_by_name(&self, name: &str) -> Result<bool> {
        let _guard = self.writes.lock().await;
        match self.registry.delete_by_name(name).await {
            Some(table) => {
                self.index.unindex(&table.id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-embeds every registry table and drops index entries with no table.
    pub async fn rebuild_index(&self) -> Result<RebuildReport> {
        let _guard = self.writes.lock().await;
        let tables = self.registry.list(&Default::default()).await;
        let live: HashSet<&str> = tables.iter().map(|t| t.id.as_str()).collect();

        let mut removed_orphans = 0;
        for id in self.index.indexed_ids().await? {
            if !live.contains(id.as_str()) {
                self.index.unindex(&id).await?;
                removed_orphans += 1;
            }
        }

        for table in &tables {
            self.index.index(table).await?;
        }

        info!(
            "Rebuilt schema index: {} tables indexed, {} orphans removed",
            tables.len(),
            removed_orphans
        );
        Ok(RebuildReport {
            indexed: tables.len(),
            removed_orphans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashing::HashingEmbedder;
    use crate::schema::ColumnSpec;
    use crate::vector_store::{InMemoryVectorStore, VectorHit, VectorStore, VectorStoreError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Holds back writes whose text mentions "slow".
    struct DelayedStore {
        inner: InMemoryVectorStore,
    }

    #[async_trait]
    impl VectorStore for DelayedStore {
        async fn upsert(
            &self,
            id: &str,
            text: &str,
            metadata: HashMap<String, String>,
        ) -> std::result::Result<(), VectorStoreError> {
            if text.contains("slow") {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.inner.upsert(id, text, metadata).await
        }

        async fn delete(&self, ids: &[String]) -> std::result::Result<(), VectorStoreError> {
            self.inner.delete(ids).await
        }

        async fn search(
            &self,
            query: &str,
            top_k: usize,
        ) -> std::result::Result<Vec<VectorHit>, VectorStoreError> {
            self.inner.search(query, top_k).await
        }

        async fn ids(&self) -> std::result::Result<Vec<String>, VectorStoreError> {
            self.inner.ids().await
        }

        async fn len(&self) -> std::result::Result<usize, VectorStoreError> {
            self.inner.len().await
        }
    }

    fn setup() -> (SchemaCatalog, Arc<InMemoryVectorStore>) {
        let registry = Arc::new(SchemaRegistry::new());
        let store = Arc::new(InMemoryVectorStore::new(Arc::new(
            HashingEmbedder::new(1 << 16).unwrap(),
        )));
        let index = Arc::new(SchemaIndex::new(store.clone(), Arc::clone(&registry)));
        (SchemaCatalog::new(registry, index), store)
    }

    fn spec(name: &str) -> TableSpec {
        TableSpec::new(name)
            .description(format!("{} records", name))
            .column(ColumnSpec::new("id", "BIGINT").primary_key())
    }

    #[tokio::test]
    async fn test_save_and_delete_keep_index_in_step() {
        let (catalog, store) = setup();
        let table = catalog.save_table(spec("users")).await.unwrap();
        assert_eq!(store.ids().await.unwrap(), vec![table.id.clone()]);

        assert!(catalog.delete_table(&table.id).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(!catalog.delete_table(&table.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_save_and_delete_by_name() {
        let (catalog, store) = setup();
        catalog
            .save_tables(vec![spec("users"), spec("orders")])
            .await
            .unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        assert!(catalog.delete_table_by_name("orders").await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(catalog.registry().count().await, 1);
    }

    #[tokio::test]
    async fn test_overlapping_saves_index_the_committed_row() {
        let registry = Arc::new(SchemaRegistry::new());
        let store = Arc::new(DelayedStore {
            inner: InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(1 << 16).unwrap())),
        });
        let index = Arc::new(SchemaIndex::new(store.clone(), Arc::clone(&registry)));
        let catalog = Arc::new(SchemaCatalog::new(Arc::clone(&registry), index));

        let first = {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move {
                catalog
                    .save_table(spec("users").description("slow version A"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        catalog
            .save_table(spec("users").description("fast version B"))
            .await
            .unwrap();
        first.await.unwrap().unwrap();

        let committed = registry.get_by_name("users").await.unwrap();
        let hits = store.search("users", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, committed.id);
        assert!(hits[0].text.contains(committed.description.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn test_delete_waits_for_pending_save() {
        let registry = Arc::new(SchemaRegistry::new());
        let store = Arc::new(DelayedStore {
            inner: InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(1 << 16).unwrap())),
        });
        let index = Arc::new(SchemaIndex::new(store.clone(), Arc::clone(&registry)));
        let catalog = Arc::new(SchemaCatalog::new(Arc::clone(&registry), index));

        let save = {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move {
                catalog
                    .save_table(spec("users").description("slow version A"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(catalog.delete_table_by_name("users").await.unwrap());
        save.await.unwrap().unwrap();

        assert_eq!(registry.count().await, 0);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rebuild_removes_orphans() {
        let (catalog, store) = setup();
        catalog.save_table(spec("users")).await.unwrap();
        store
            .upsert("ghost", "table: ghost", HashMap::new())
            .await
            .unwrap();

        let report = catalog.rebuild_index().await.unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.removed_orphans, 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
