use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Nl2SqlError;
use crate::nl2sql::pipeline::{PipelineResult, TranslateRequest};
use crate::schema::catalog::RebuildReport;
use crate::schema::registry::TableFilter;
use crate::schema::{TableInfo, TableSpec};
use crate::web::state::AppState;

type ApiResult<T> = Result<T, (StatusCode, String)>;

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DdlResponse {
    pub table_name: String,
    pub ddl: String,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub table_count: usize,
    pub indexed_count: usize,
    pub llm_backend: String,
    pub embedding_backend: String,
}

fn error_response(err: Nl2SqlError) -> (StatusCode, String) {
    let status = match &err {
        Nl2SqlError::TableNotFound(_) => StatusCode::NOT_FOUND,
        Nl2SqlError::InvalidTable(_) | Nl2SqlError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Nl2SqlError::RetrievalUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Nl2SqlError::GenerationUnavailable(_) => StatusCode::BAD_GATEWAY,
        Nl2SqlError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }
    (status, err.to_string())
}

pub async fn translate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<Json<PipelineResult>> {
    info!("Received translate request: {}", request.query);
    state
        .pipeline
        .translate(request)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn list_tables(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TableFilter>,
) -> Json<Vec<TableInfo>> {
    Json(state.registry().list(&filter).await)
}

pub async fn save_table(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<TableSpec>,
) -> ApiResult<Json<TableInfo>> {
    state
        .catalog
        .save_table(spec)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn save_tables(
    State(state): State<Arc<AppState>>,
    Json(specs): Json<Vec<TableSpec>>,
) -> ApiResult<Json<Vec<TableInfo>>> {
    state
        .catalog
        .save_tables(specs)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn count_tables(State(state): State<Arc<AppState>>) -> Json<CountResponse> {
    Json(CountResponse {
        count: state.registry().count().await,
    })
}

pub async fn get_table(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TableInfo>> {
    state.registry().get(&id).await.map(Json).map_err(error_response)
}

pub async fn get_table_ddl(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DdlResponse>> {
    let table = state.registry().get(&id).await.map_err(error_response)?;
    Ok(Json(DdlResponse {
        ddl: table.to_ddl(),
        table_name: table.table_name,
    }))
}

pub async fn get_table_by_name(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<TableInfo>> {
    state
        .registry()
        .get_by_name(&name)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_table(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .catalog
        .delete_table(&id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_table_by_name(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .catalog
        .delete_table_by_name(&name)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rebuild_index(State(state): State<Arc<AppState>>) -> ApiResult<Json<RebuildReport>> {
    state
        .catalog
        .rebuild_index()
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn system_status(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SystemStatus>> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    let indexed_count = state
        .catalog
        .index()
        .indexed_ids()
        .await
        .map_err(error_response)?
        .len();

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        table_count: state.registry().count().await,
        indexed_count,
        llm_backend: state.llm_backend.clone(),
        embedding_backend: state.embedding_backend.clone(),
    }))
}
