use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Translation
            .route("/nl2sql/translate", post(handlers::api::translate))
            // Schema management
            .route(
                "/nl2sql/tables",
                get(handlers::api::list_tables).post(handlers::api::save_table),
            )
            .route("/nl2sql/tables/batch", post(handlers::api::save_tables))
            .route("/nl2sql/tables/count", get(handlers::api::count_tables))
            .route(
                "/nl2sql/tables/by-name/{name}",
                get(handlers::api::get_table_by_name).delete(handlers::api::delete_table_by_name),
            )
            .route(
                "/nl2sql/tables/{id}",
                get(handlers::api::get_table).delete(handlers::api::delete_table),
            )
            .route("/nl2sql/tables/{id}/ddl", get(handlers::api::get_table_ddl))
            .route("/nl2sql/index/rebuild", post(handlers::api::rebuild_index))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
