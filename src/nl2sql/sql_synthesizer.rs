use super::{Confidence, Dialect, QueryType, RelevantField, SqlGenerationResult, detect_query_type};
use crate::error::Result;
use crate::llm::ChatModel;
use crate::schema::TableInfo;
use crate::util::json_extract::{extract_select_statement, normalize_sql, parse_embedded_json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const FALLBACK_EXPLANATION: &str = "SQL extracted from unstructured model output";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationResponse {
    #[serde(default)]
    sql: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    query_type: Option<String>,
    #[serde(default)]
    tables: Option<Vec<String>>,
    #[serde(default)]
    confidence: Option<String>,
}

pub struct SqlSynthesizer {
    model: Arc<dyn ChatModel>,
}

impl SqlSynthesizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Asks the model for SQL over the selected fields. Never fails for
    /// output quality; degraded answers come back as `UNKNOWN` / `low`.
    pub async fn generate(
        &self,
        query: &str,
        tables: &[TableInfo],
        fields: &[RelevantField],
        dialect: Dialect,
    ) -> Result<SqlGenerationResult> {
        info!("Generating SQL with dialect {}", dialect);

        let context = build_context(tables, fields);
        let system_prompt = build_system_prompt(dialect);
        let user_prompt = build_user_prompt(query, &context);

        let response = self.model.complete(&system_prompt, &user_prompt).await?;
        debug!("SQL generator response: {}", response);

        let result = parse_generation(&response);
        if result.sql.is_empty() {
            warn!("Model output contained no usable SQL");
        } else {
            info!("SQL generated: {}", result.sql);
        }
        Ok(result)
    }
}

/// One block per table that owns at least one selected field, in table order.
fn build_context(tables: &[TableInfo], fields: &[RelevantField]) -> String {
    let mut context = String::new();

    for table in tables {
        let table_fields: Vec<&RelevantField> = fields
            .iter()
            .filter(|f| f.column.table_id == table.id)
            .collect();
        if table_fields.is_empty() {
            continue;
        }

        context.push_str(&format!("\nTable: {}", table.table_name));
        if let Some(alias) = table.table_alias.as_deref().filter(|a| !a.is_empty()) {
            context.push_str(&format!(" ({})", alias));
        }
        context.push('\n');
        context.push_str(&format!(
            "Description: {}\n",
            table.description.as_deref().unwrap_or("")
        ));
        context.push_str("Relevant fields:\n");

        for field in table_fields {
            let col = &field.column;
            context.push_str(&format!("  - {} {}", col.column_name, col.type_signature()));
            if let Some(desc) = col.description.as_deref().filter(|d| !d.is_empty()) {
                context.push_str(&format!(" ({})", desc));
            }
            if col.is_primary_key {
                context.push_str(" [PK]");
            }
            if col.is_foreign_key {
                context.push_str(" [FK]");
            }
            context.push('\n');
        }

        if let Some(pk) = &table.primary_key {
            context.push_str(&format!("Primary key: {}\n", pk));
        }
        if !table.foreign_keys.is_empty() {
            context.push_str("Foreign keys:\n");
            for (column, reference) in &table.foreign_keys {
                context.push_str(&format!("  {} -> {}\n", column, reference));
            }
        }
    }

    context
}

fn build_system_prompt(dialect: Dialect) -> String {
    format!(
        r#"You are an expert SQL engineer. Using the user's natural-language query and the
relevant tables and fields provided, write an accurate and efficient SQL statement.

SQL dialect: {}

{}

Rules:
1. Use only the tables and columns provided
2. Join related tables correctly with JOIN
3. Filter rows with appropriate WHERE conditions
4. Use aggregate functions (COUNT, SUM, AVG, ...) when needed
5. Use GROUP BY and HAVING when needed
6. Sort with ORDER BY
7. Limit the returned rows with LIMIT (default 100 rows)
8. Use table aliases for readability
9. Do not use SELECT *; list the columns explicitly
10. Make sure the syntax is correct for the specified dialect

Output format:
{{
  "sql": "the SQL statement",
  "explanation": "natural-language explanation of the statement",
  "queryType": "SELECT/INSERT/UPDATE/DELETE",
  "tables": ["tables used"],
  "confidence": "high/medium/low"
}}"#,
        dialect,
        dialect.guidance()
    )
}

fn build_user_prompt(query: &str, context: &str) -> String {
    format!(
        "User query: {}\n\nRelevant tables and fields:\n{}\n\n\
         Generate the SQL statement from the information above.\n\
         Return only the JSON result without any other text.",
        query, context
    )
}

fn parse_generation(response: &str) -> SqlGenerationResult {
    match parse_embedded_json::<GenerationResponse>(response) {
        Some(parsed) => from_structured(parsed),
        None => {
            warn!("No usable JSON in SQL generator response, extracting SQL directly");
            let sql = extract_select_statement(response)
                .map(|s| normalize_sql(&s))
                .unwrap_or_default();
            SqlGenerationResult {
                sql,
                explanation: FALLBACK_EXPLANATION.to_string(),
                query_type: QueryType::Unknown,
                tables: Vec::new(),
                confidence: Confidence::Low,
            }
        }
    }
}

fn from_structured(parsed: GenerationResponse) -> SqlGenerationResult {
    let sql = normalize_sql(parsed.sql.as_deref().unwrap_or(""));
    let explanation = parsed.explanation.unwrap_or_default();
    let tables = parsed.tables.unwrap_or_default();

    if sql.is_empty() {
        return SqlGenerationResult {
            sql,
            explanation,
            query_type: QueryType::Unknown,
            tables,
            confidence: Confidence::Low,
        };
    }

    let query_type = match parsed.query_type.as_deref().and_then(QueryType::from_keyword) {
        Some(QueryType::Other) | Some(QueryType::Unknown) | None => detect_query_type(&sql),
        Some(kind) => kind,
    };

    SqlGenerationResult {
        sql,
        explanation,
        query_type,
        tables,
        confidence: Confidence::parse_or_medium(parsed.confidence.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Nl2SqlError;
    use crate::llm::LlmError;
    use crate::nl2sql::Relevance;
    use crate::schema::{ColumnSpec, TableSpec};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct RecordingModel {
        response: String,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl RecordingModel {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(&self, system: &str, user: &str) -> std::result::Result<String, LlmError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            Ok(self.response.clone())
        }
        fn name(&self) -> &str {
            "recording"
        }
    }

    struct TimeoutModel;

    #[async_trait]
    impl ChatModel for TimeoutModel {
        async fn complete(&self, _system: &str, _user: &str) -> std::result::Result<String, LlmError> {
            Err(LlmError::ConnectionError("operation timed out".to_string()))
        }
        fn name(&self) -> &str {
            "timeout"
        }
    }

    fn tables() -> Vec<TableInfo> {
        let users = TableSpec::new("users")
            .description("stores registered user records")
            .column(ColumnSpec::new("user_id", "BIGINT").primary_key())
            .column(ColumnSpec::new("username", "VARCHAR").length(50).description("login name"));
        let orders = TableSpec::new("orders")
            .description("customer orders")
            .column(ColumnSpec::new("order_id", "BIGINT").primary_key());
        vec![
            TableInfo::from_spec("u".to_string(), users, Utc::now(), true),
            TableInfo::from_spec("o".to_string(), orders, Utc::now(), true),
        ]
    }

    fn fields(tables: &[TableInfo]) -> Vec<RelevantField> {
        tables[0]
            .columns
            .iter()
            .map(|c| RelevantField {
                column: c.clone(),
                table_name: "users".to_string(),
                relevance: Relevance::High,
                usage: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_context_skips_tables_without_fields() {
        let tables = tables();
        let context = build_context(&tables, &fields(&tables));
        assert!(context.contains("Table: users"));
        assert!(context.contains("  - user_id BIGINT [PK]"));
        assert!(context.contains("  - username VARCHAR(50) (login name)"));
        assert!(!context.contains("orders"));
        assert!(build_context(&tables, &[]).is_empty());
    }

    #[test]
    fn test_system_prompt_carries_rules_and_dialect() {
        let prompt = build_system_prompt(Dialect::SqlServer);
        assert!(prompt.contains("SQL dialect: sqlserver"));
        assert!(prompt.contains("SELECT TOP n"));
        assert!(prompt.contains("10. Make sure the syntax is correct"));
        assert!(build_system_prompt(Dialect::parse("teradata")).contains("Generic SQL rules"));
    }

    #[test]
    fn test_structured_output_is_normalized() {
        let response = r#"```json
{"sql": "  SELECT COUNT(u.user_id) FROM users u;; ", "explanation": "counts users",
 "queryType": "SELECT", "tables": ["users"], "confidence": "high"}
```"#;
        let result = parse_generation(response);
        assert_eq!(result.sql, "SELECT COUNT(u.user_id) FROM users u;");
        assert_eq!(result.query_type, QueryType::Select);
        assert_eq!(result.tables, vec!["users"]);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.explanation, "counts users");
    }

    #[test]
    fn test_unrecognized_query_type_is_detected_from_sql() {
        let response = r#"{"sql": "delete from users where user_id = 1", "queryType": "SELECT/DELETE"}"#;
        let result = parse_generation(response);
        assert_eq!(result.sql, "delete from users where user_id = 1;");
        assert_eq!(result.query_type, QueryType::Delete);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_fallback_extracts_select_through_semicolon() {
        let response = "Sure, run this: SELECT id FROM users WHERE active = 1; then enjoy.";
        let result = parse_generation(response);
        assert_eq!(result.sql, "SELECT id FROM users WHERE active = 1;");
        assert_eq!(result.query_type, QueryType::Unknown);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.tables.is_empty());
    }

    #[test]
    fn test_fallback_without_select_is_empty() {
        let result = parse_generation("I cannot answer that question.");
        assert!(result.sql.is_empty());
        assert_eq!(result.query_type, QueryType::Unknown);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_blank_sql_in_json_is_degraded() {
        let result = parse_generation(r#"{"sql": "   ", "explanation": "no idea", "confidence": "high"}"#);
        assert!(result.sql.is_empty());
        assert_eq!(result.query_type, QueryType::Unknown);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_non_empty_sql_always_ends_with_one_semicolon() {
        let responses = [
            r#"{"sql": "SELECT 1"}"#,
            r#"{"sql": "SELECT 1 ;\n"}"#,
            "SELECT 2",
            "```sql\nselect 3;\n```",
        ];
        for response in responses {
            let sql = parse_generation(response).sql;
            assert!(sql.ends_with(';') && !sql.ends_with(";;"), "{:?}", sql);
            assert_eq!(sql, sql.trim());
        }
    }

    #[tokio::test]
    async fn test_generate_sends_query_and_context() {
        let model = Arc::new(RecordingModel::new(r#"{"sql": "SELECT 1", "tables": []}"#));
        let synthesizer = SqlSynthesizer::new(model.clone());
        let tables = tables();
        let result = synthesizer
            .generate("how many users", &tables, &fields(&tables), Dialect::MySql)
            .await
            .unwrap();
        assert_eq!(result.sql, "SELECT 1;");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("MySQL specific rules"));
        assert!(prompts[0].1.starts_with("User query: how many users"));
        assert!(prompts[0].1.contains("Table: users"));
    }

    #[tokio::test]
    async fn test_generate_calls_model_without_candidates() {
        let model = Arc::new(RecordingModel::new("no tables available"));
        let synthesizer = SqlSynthesizer::new(model.clone());
        let result = synthesizer.generate("q", &[], &[], Dialect::Generic).await.unwrap();
        assert!(result.sql.is_empty());
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_generation_unavailable() {
        let synthesizer = SqlSynthesizer::new(Arc::new(TimeoutModel));
        let result = synthesizer.generate("q", &[], &[], Dialect::MySql).await;
        assert!(matches!(result, Err(Nl2SqlError::GenerationUnavailable(_))));
    }
}
