use crate::config::AppConfig;
use crate::embedding::Embedder;
use crate::llm::ChatModel;
use crate::nl2sql::pipeline::Nl2SqlPipeline;
use crate::schema::catalog::SchemaCatalog;
use crate::schema::index::SchemaIndex;
use crate::schema::registry::SchemaRegistry;
use crate::vector_store::InMemoryVectorStore;
use std::sync::Arc;

/// Shared application state for the web server
pub struct AppState {
    pub catalog: Arc<SchemaCatalog>,
    pub pipeline: Arc<Nl2SqlPipeline>,
    pub llm_backend: String,
    pub embedding_backend: String,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Wires registry, index, catalog and pipeline around the given collaborators.
    pub fn new(config: &AppConfig, model: Arc<dyn ChatModel>, embedder: Arc<dyn Embedder>) -> Self {
        let registry = Arc::new(SchemaRegistry::new());
        let store = Arc::new(InMemoryVectorStore::new(Arc::clone(&embedder)));
        let index = Arc::new(SchemaIndex::new(store, Arc::clone(&registry)));
        let catalog = Arc::new(SchemaCatalog::new(Arc::clone(&registry), Arc::clone(&index)));
        let pipeline = Arc::new(Nl2SqlPipeline::new(
            registry,
            index,
            Arc::clone(&model),
            config.pipeline.clone(),
        ));

        Self {
            llm_backend: model.name().to_string(),
            embedding_backend: embedder.name().to_string(),
            catalog,
            pipeline,
            startup_time: chrono::Utc::now(),
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        self.catalog.registry()
    }
}
