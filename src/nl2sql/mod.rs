pub mod field_selector;
pub mod pipeline;
pub mod sql_synthesizer;

use crate::schema::ColumnInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target SQL variant. Unknown names fall back to [`Dialect::Generic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    PostgreSql,
    Sqlite,
    Oracle,
    SqlServer,
    Generic,
}

impl Dialect {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "mysql" => Dialect::MySql,
            "postgresql" => Dialect::PostgreSql,
            "sqlite" => Dialect::Sqlite,
            "oracle" => Dialect::Oracle,
            "sqlserver" => Dialect::SqlServer,
            _ => Dialect::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::PostgreSql => "postgresql",
            Dialect::Sqlite => "sqlite",
            Dialect::Oracle => "oracle",
            Dialect::SqlServer => "sqlserver",
            Dialect::Generic => "generic",
        }
    }

    /// Dialect-specific rules appended to the generation prompt.
    pub fn guidance(&self) -> &'static str {
        match self {
            Dialect::MySql => {
                "MySQL specific rules:\n\
                 - Quote table and column names with backticks (`)\n\
                 - LIMIT syntax: LIMIT offset, count or LIMIT count OFFSET offset\n\
                 - REGEXP is available for pattern matching\n\
                 - Date functions: NOW(), DATE_FORMAT(), DATEDIFF()"
            }
            Dialect::PostgreSql => {
                "PostgreSQL specific rules:\n\
                 - Quote identifiers with double quotes (\") when needed\n\
                 - LIMIT syntax: LIMIT count OFFSET offset\n\
                 - Use ILIKE for case-insensitive matching\n\
                 - Date functions: NOW(), TO_CHAR(), AGE()\n\
                 - JSON/JSONB operators are available"
            }
            Dialect::Sqlite => {
                "SQLite specific rules:\n\
                 - Quote identifiers with double quotes (\") or square brackets\n\
                 - LIMIT syntax: LIMIT count OFFSET offset\n\
                 - Date functions: datetime(), date(), strftime()\n\
                 - Some advanced SQL features are not supported"
            }
            Dialect::Oracle => {
                "Oracle specific rules:\n\
                 - Quote identifiers with double quotes (\")\n\
                 - Limit rows with ROWNUM or FETCH FIRST n ROWS ONLY\n\
                 - Date functions: SYSDATE, TO_DATE(), TO_CHAR()\n\
                 - Use the DUAL table for pseudo queries"
            }
            Dialect::SqlServer => {
                "SQL Server specific rules:\n\
                 - Quote identifiers with square brackets ([])\n\
                 - Limit rows with TOP: SELECT TOP n ...\n\
                 - Date functions: GETDATE(), CONVERT(), FORMAT()\n\
                 - Paginate with OFFSET ... FETCH"
            }
            Dialect::Generic => {
                "Generic SQL rules:\n\
                 - Use standard SQL syntax\n\
                 - Limit returned rows with LIMIT or TOP"
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Other,
    Unknown,
}

impl QueryType {
    /// Exact statement keyword, case-insensitive. `None` for anything else.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.trim().to_uppercase().as_str() {
            "SELECT" => Some(QueryType::Select),
            "INSERT" => Some(QueryType::Insert),
            "UPDATE" => Some(QueryType::Update),
            "DELETE" => Some(QueryType::Delete),
            "CREATE" => Some(QueryType::Create),
            "ALTER" => Some(QueryType::Alter),
            "DROP" => Some(QueryType::Drop),
            "OTHER" => Some(QueryType::Other),
            "UNKNOWN" => Some(QueryType::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Missing or unrecognized tiers read as medium.
    pub fn parse_or_medium(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("high") => Confidence::High,
            Some("low") => Confidence::Low,
            _ => Confidence::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl Relevance {
    pub fn parse_or_medium(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("high") => Relevance::High,
            Some("low") => Relevance::Low,
            _ => Relevance::Medium,
        }
    }
}

/// Classifies a statement by its first keyword.
pub fn detect_query_type(sql: &str) -> QueryType {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return QueryType::Unknown;
    }
    let keyword: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    match QueryType::from_keyword(&keyword) {
        Some(QueryType::Other) | Some(QueryType::Unknown) | None => QueryType::Other,
        Some(kind) => kind,
    }
}

pub fn is_read_only(sql: &str) -> bool {
    detect_query_type(sql) == QueryType::Select
}

/// A column chosen for one specific query.
#[derive(Debug, Clone, Serialize)]
pub struct RelevantField {
    pub column: ColumnInfo,
    pub table_name: String,
    pub relevance: Relevance,
    pub usage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlGenerationResult {
    pub sql: String,
    pub explanation: String,
    pub query_type: QueryType,
    pub tables: Vec<String>,
    pub confidence: Confidence,
}
