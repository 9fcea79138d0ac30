use super::field_selector::FieldSelector;
use super::sql_synthesizer::SqlSynthesizer;
use super::{
    Confidence, Dialect, QueryType, RelevantField, Relevance, SqlGenerationResult,
    detect_query_type, is_read_only,
};
use crate::config::PipelineConfig;
use crate::error::{Nl2SqlError, Result};
use crate::llm::ChatModel;
use crate::schema::TableInfo;
use crate::schema::index::SchemaIndex;
use crate::schema::registry::SchemaRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// A translate call. Unset options take the configured pipeline defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslateRequest {
    pub query: String,
    #[serde(default)]
    pub dialect: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub max_rows: Option<usize>,
    #[serde(default)]
    pub include_explanation: Option<bool>,
    /// Drop candidates that belong to another database.
    #[serde(default)]
    pub database_name: Option<String>,
    /// Use these registry tables instead of semantic retrieval.
    #[serde(default)]
    pub table_names: Option<Vec<String>>,
}

impl TranslateRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsedTable {
    pub table_name: String,
    pub table_alias: Option<String>,
    pub description: Option<String>,
    pub columns: Vec<String>,
}

impl From<&TableInfo> for UsedTable {
    fn from(table: &TableInfo) -> Self {
        Self {
            table_name: table.table_name.clone(),
            table_alias: table.table_alias.clone(),
            description: table.description.clone(),
            columns: table.column_names(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedField {
    pub table_name: String,
    pub column_name: String,
    pub relevance: Relevance,
    pub usage: String,
}

impl From<&RelevantField> for SelectedField {
    fn from(field: &RelevantField) -> Self {
        Self {
            table_name: field.table_name.clone(),
            column_name: field.column.column_name.clone(),
            relevance: field.relevance,
            usage: field.usage.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub retrieval_ms: u64,
    pub selection_ms: u64,
    pub generation_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub id: String,
    pub natural_language_query: String,
    pub generated_sql: String,
    pub sql_dialect: String,
    /// `generated`, or `empty` when the model produced no usable SQL.
    pub status: String,
    pub query_type: QueryType,
    pub is_read_only: bool,
    pub confidence: Confidence,
    pub used_tables: Vec<UsedTable>,
    pub relevant_fields: Vec<SelectedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Advisory only; nothing is executed here.
    pub max_rows: usize,
    pub timings: StageTimings,
    pub created_at: DateTime<Utc>,
}

/// Retrieval, field selection and SQL synthesis, strictly in that order.
pub struct Nl2SqlPipeline {
    registry: Arc<SchemaRegistry>,
    index: Arc<SchemaIndex>,
    selector: FieldSelector,
    synthesizer: SqlSynthesizer,
    defaults: PipelineConfig,
}

impl Nl2SqlPipeline {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        index: Arc<SchemaIndex>,
        model: Arc<dyn ChatModel>,
        defaults: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            index,
            selector: FieldSelector::new(Arc::clone(&model)),
            synthesizer: SqlSynthesizer::new(model),
            defaults,
        }
    }

    pub async fn run(
        &self,
        query: &str,
        dialect: &str,
        top_k: usize,
        max_rows: usize,
        include_explanation: bool,
    ) -> Result<PipelineResult> {
        self.translate(TranslateRequest {
            query: query.to_string(),
            dialect: Some(dialect.to_string()),
            top_k: Some(top_k),
            max_rows: Some(max_rows),
            include_explanation: Some(include_explanation),
            ..Default::default()
        })
        .await
    }

    pub async fn translate(&self, request: TranslateRequest) -> Result<PipelineResult> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(Nl2SqlError::InvalidRequest("query must not be empty".to_string()));
        }
        let top_k = request.top_k.unwrap_or(self.defaults.default_top_k);
        if top_k == 0 {
            return Err(Nl2SqlError::InvalidRequest("top_k must be at least 1".to_string()));
        }
        let dialect_name = request
            .dialect
            .clone()
            .unwrap_or_else(|| self.defaults.default_dialect.clone());
        let dialect = Dialect::parse(&dialect_name);
        let max_rows = request.max_rows.unwrap_or(self.defaults.default_max_rows);
        let include_explanation = request.include_explanation.unwrap_or(true);

        info!("Translating query with dialect {} (top_k={})", dialect, top_k);
        let started = Instant::now();

        let stage = Instant::now();
        let candidates = self.candidates(query, top_k, &request).await?;
        let retrieval_ms = elapsed_ms(stage);
        info!("Retrieved {} candidate tables", candidates.len());

        let stage = Instant::now();
        let fields = self
            .selector
            .select(query, &candidates, dialect)
            .await
            .inspect_err(|e| error!("Field selection failed: {}", e))?;
        let selection_ms = elapsed_ms(stage);

        let stage = Instant::now();
        let generated = self
            .synthesizer
            .generate(query, &candidates, &fields, dialect)
            .await
            .inspect_err(|e| error!("SQL generation failed: {}", e))?;
        let generation_ms = elapsed_ms(stage);

        let used_tables = used_tables(&candidates, &fields, &generated);
        let sql = generated.sql;
        let result = PipelineResult {
            id: uuid::Uuid::new_v4().to_string(),
            natural_language_query: query.to_string(),
            status: if sql.is_empty() { "empty" } else { "generated" }.to_string(),
            query_type: detect_query_type(&sql),
            is_read_only: is_read_only(&sql),
            generated_sql: sql,
            sql_dialect: dialect_name,
            confidence: generated.confidence,
            used_tables,
            relevant_fields: fields.iter().map(SelectedField::from).collect(),
            explanation: include_explanation.then_some(generated.explanation),
            max_rows,
            timings: StageTimings {
                retrieval_ms,
                selection_ms,
                generation_ms,
                total_ms: elapsed_ms(started),
            },
            created_at: Utc::now(),
        };

        info!(
            "Translation {} finished in {} ms ({:?}, {:?} confidence)",
            result.id, result.timings.total_ms, result.query_type, result.confidence
        );
        Ok(result)
    }

    async fn candidates(
        &self,
        query: &str,
        top_k: usize,
        request: &TranslateRequest,
    ) -> Result<Vec<TableInfo>> {
        let mut candidates = match request.table_names.as_deref() {
            Some(names) if !names.is_empty() => self.registry.get_by_names(names).await,
            _ => self
                .index
                .retrieve(query, top_k)
                .await
                .inspect_err(|e| error!("Schema retrieval failed: {}", e))?,
        };

        if let Some(database) = &request.database_name {
            candidates.retain(|t| t.database_name.as_deref() == Some(database.as_str()));
        }
        Ok(candidates)
    }
}

/// Tables named by the model, else tables owning a selected field, else all candidates.
fn used_tables(
    candidates: &[TableInfo],
    fields: &[RelevantField],
    generated: &SqlGenerationResult,
) -> Vec<UsedTable> {
    let named: Vec<&TableInfo> = candidates
        .iter()
        .filter(|t| {
            generated
                .tables
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&t.table_name))
        })
        .collect();
    if !named.is_empty() {
        return named.into_iter().map(UsedTable::from).collect();
    }

    let with_fields: Vec<&TableInfo> = candidates
        .iter()
        .filter(|t| fields.iter().any(|f| f.column.table_id == t.id))
        .collect();
    if !with_fields.is_empty() {
        return with_fields.into_iter().map(UsedTable::from).collect();
    }

    candidates.iter().map(UsedTable::from).collect()
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
