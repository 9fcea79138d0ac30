use super::{Dialect, RelevantField, Relevance};
use crate::error::Result;
use crate::llm::ChatModel;
use crate::schema::TableInfo;
use crate::util::json_extract::parse_embedded_json;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionResponse {
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    fields: Option<Vec<SelectedField>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectedField {
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    column_name: Option<String>,
    #[serde(default)]
    relevance: Option<String>,
    #[serde(default)]
    usage: Option<String>,
}

/// Narrows candidate tables down to the columns a query needs.
pub struct FieldSelector {
    model: Arc<dyn ChatModel>,
}

impl FieldSelector {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Fails only when the model call itself fails; unusable output yields
    /// an empty selection.
    pub async fn select(
        &self,
        query: &str,
        candidates: &[TableInfo],
        dialect: Dialect,
    ) -> Result<Vec<RelevantField>> {
        if candidates.is_empty() {
            warn!("No candidate tables provided for field selection");
            return Ok(Vec::new());
        }

        info!(
            "Selecting relevant fields from {} candidate tables",
            candidates.len()
        );

        let system_prompt = build_system_prompt(dialect);
        let user_prompt = build_user_prompt(query, &build_candidate_context(candidates));

        let response = self.model.complete(&system_prompt, &user_prompt).await?;
        debug!("Field selector response: {}", response);

        let fields = parse_selection(&response, candidates);
        info!("Selected {} relevant fields", fields.len());
        Ok(fields)
    }
}

fn build_candidate_context(tables: &[TableInfo]) -> String {
    let mut context = String::new();

    for table in tables {
        context.push_str(&format!("\n=== Table: {}", table.table_name));
        if let Some(alias) = table.table_alias.as_deref().filter(|a| !a.is_empty()) {
            context.push_str(&format!(" ({})", alias));
        }
        context.push_str(" ===\n");
        context.push_str(&format!(
            "Description: {}\n",
            table.description.as_deref().unwrap_or("")
        ));
        context.push_str("Columns:\n");
        for col in &table.columns {
            context.push_str(&format!("  - {}\n", col.to_description()));
        }

        if let Some(pk) = &table.primary_key {
            context.push_str(&format!("Primary key: {}\n", pk));
        }

        if !table.foreign_keys.is_empty() {
            context.push_str("Foreign keys:\n");
            for (column, reference) in &table.foreign_keys {
                context.push_str(&format!("  - {} -> {}\n", column, reference));
            }
        }
    }

    context
}

fn build_system_prompt(dialect: Dialect) -> String {
    format!(
        r#"You are an expert at selecting database fields. From the candidate tables and columns,
identify the fields that are most relevant to the user's natural-language query.

Rules:
1. Analyse the intent of the query carefully
2. Choose the most relevant columns from the candidate tables
3. Consider each column's business meaning, data type and relationships
4. Always include every foreign key column listed under "Foreign keys"
5. Prefer columns with a clear business meaning
6. Respond with a single JSON object

SQL dialect: {}

Output format:
{{
  "reasoning": "short explanation of why these fields were chosen",
  "fields": [
    {{
      "tableName": "table name",
      "columnName": "column name",
      "relevance": "high/medium/low",
      "usage": "how the column is used in the query"
    }}
  ]
}}"#,
        dialect
    )
}

fn build_user_prompt(query: &str, context: &str) -> String {
    format!(
        "User query: {}\n\nCandidate tables and columns:\n{}\n\n\
         Analyse the query and select the most relevant fields from the candidates.\n\
         Return only the JSON result without any other text.",
        query, context
    )
}

/// Resolves `(tableName, columnName)` pairs against the candidates,
/// case-insensitively. Pairs that do not resolve are dropped.
fn parse_selection(response: &str, candidates: &[TableInfo]) -> Vec<RelevantField> {
    let Some(parsed) = parse_embedded_json::<SelectionResponse>(response) else {
        warn!("No usable JSON in field selector response");
        return Vec::new();
    };

    if let Some(reasoning) = &parsed.reasoning {
        debug!("Field selection reasoning: {}", reasoning);
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    for selected in parsed.fields.unwrap_or_default() {
        let (Some(table_name), Some(column_name)) = (&selected.table_name, &selected.column_name)
        else {
            continue;
        };

        let resolved = candidates
            .iter()
            .find(|t| t.table_name.eq_ignore_ascii_case(table_name))
            .and_then(|t| t.find_column(column_name).map(|c| (t, c)));

        match resolved {
            Some((table, column)) => {
                if seen.insert(column.id.clone()) {
                    fields.push(RelevantField {
                        column: column.clone(),
                        table_name: table.table_name.clone(),
                        relevance: Relevance::parse_or_medium(selected.relevance.as_deref()),
                        usage: selected.usage.clone().unwrap_or_default(),
                    });
                }
            }
            None => warn!(
                "Dropping unresolved field {}.{} from selection",
                table_name, column_name
            ),
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Nl2SqlError;
    use crate::llm::LlmError;
    use crate::schema::{ColumnSpec, TableSpec};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedModel {
        response: String,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _system: &str, _user: &str) -> std::result::Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct DownModel;

    #[async_trait]
    impl ChatModel for DownModel {
        async fn complete(&self, _system: &str, _user: &str) -> std::result::Result<String, LlmError> {
            Err(LlmError::ConnectionError("connection refused".to_string()))
        }
        fn name(&self) -> &str {
            "down"
        }
    }

    fn candidates() -> Vec<TableInfo> {
        let users = TableSpec::new("users")
            .alias("Users")
            .description("stores registered user records")
            .column(ColumnSpec::new("user_id", "BIGINT").primary_key())
            .column(ColumnSpec::new("username", "VARCHAR").length(50))
            .column(ColumnSpec::new("email", "VARCHAR"));
        let orders = TableSpec::new("orders")
            .description("customer orders")
            .column(ColumnSpec::new("order_id", "BIGINT").primary_key())
            .column(ColumnSpec::new("user_id", "BIGINT").references("users", "user_id"));
        vec![
            TableInfo::from_spec("u".to_string(), users, Utc::now(), true),
            TableInfo::from_spec("o".to_string(), orders, Utc::now(), true),
        ]
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_model() {
        let model = Arc::new(ScriptedModel::new("{}"));
        let selector = FieldSelector::new(model.clone());
        let fields = selector.select("anything", &[], Dialect::MySql).await.unwrap();
        assert!(fields.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolves_fields_case_insensitively() {
        let response = r#"Here is my answer:
{
  "reasoning": "count users",
  "fields": [
    {"tableName": "USERS", "columnName": "User_Id", "relevance": "high", "usage": "count"},
    {"tableName": "users", "columnName": "username", "relevance": "low"},
    {"tableName": "users", "columnName": "user_id", "relevance": "high"},
    {"tableName": "users", "columnName": "password"},
    {"tableName": "payments", "columnName": "amount"}
  ]
}"#;
        let model = Arc::new(ScriptedModel::new(response));
        let selector = FieldSelector::new(model.clone());
        let fields = selector
            .select("how many users", &candidates(), Dialect::MySql)
            .await
            .unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let names: Vec<&str> = fields.iter().map(|f| f.column.column_name.as_str()).collect();
        assert_eq!(names, vec!["user_id", "username"]);
        assert_eq!(fields[0].table_name, "users");
        assert_eq!(fields[0].relevance, Relevance::High);
        assert_eq!(fields[0].usage, "count");
        assert_eq!(fields[1].relevance, Relevance::Low);
    }

    #[tokio::test]
    async fn test_unparsable_output_is_empty_selection() {
        for response in ["I could not decide.", "{\"fields\": [oops]}", "{\"fields\": null}"] {
            let selector = FieldSelector::new(Arc::new(ScriptedModel::new(response)));
            let fields = selector.select("q", &candidates(), Dialect::Generic).await.unwrap();
            assert!(fields.is_empty(), "response {:?}", response);
        }
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let selector = FieldSelector::new(Arc::new(DownModel));
        let result = selector.select("q", &candidates(), Dialect::MySql).await;
        assert!(matches!(result, Err(Nl2SqlError::GenerationUnavailable(_))));
    }

    #[test]
    fn test_context_lists_keys() {
        let context = build_candidate_context(&candidates());
        assert!(context.contains("=== Table: users (Users) ==="));
        assert!(context.contains("  - username VARCHAR(50)"));
        assert!(context.contains("Primary key: order_id"));
        assert!(context.contains("  - user_id -> users.user_id"));
    }

    #[test]
    fn test_prompt_demands_join_keys() {
        let prompt = build_system_prompt(Dialect::PostgreSql);
        assert!(prompt.contains("Always include every foreign key column listed under \"Foreign keys\"\n"));
        assert!(prompt.contains("SQL dialect: postgresql"));
        assert!(prompt.contains("\"columnName\""));
    }
}
