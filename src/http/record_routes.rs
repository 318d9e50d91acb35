//! # Record Routes
//!
//! Generic CRUD over any collection, with no per-collection code anywhere.
//! List parameters: `filter`, `sort`, `cursor`, `limit`, `expand`. The full
//! query map is also exposed to rules as `@request.query.*`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};

use crate::executor::{EngineError, ListQuery};

use super::problem::ApiError;
use super::state::AppState;

/// Routes under `/collections/:collection/records`.
pub fn record_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/collections/:collection/records",
            get(list_records).post(create_record),
        )
        .route(
            "/collections/:collection/records/:id",
            get(view_record).patch(update_record).delete(delete_record),
        )
}

fn body_object(body: Value) -> Result<Map<String, Value>, ApiError> {
    body.as_object().cloned().ok_or_else(|| {
        ApiError(EngineError::BadRequest(
            "request body must be a JSON object".to_string(),
        ))
    })
}

fn list_query(params: &HashMap<String, String>) -> Result<ListQuery, ApiError> {
    let limit = match params.get("limit") {
        Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
            ApiError(EngineError::BadRequest("limit must be an integer".to_string()))
        })?),
        None => None,
    };

    Ok(ListQuery {
        filter: params.get("filter").cloned(),
        sort: params.get("sort").cloned(),
        cursor: params.get("cursor").cloned(),
        limit,
        expand: params.get("expand").cloned(),
    })
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let expand = params.get("expand").cloned();
    let ctx = state.request_context(&headers, params);
    let data = body_object(body)?;

    let record = state
        .executor
        .create(&collection, &ctx, data, expand.as_deref())?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let query = list_query(&params)?;
    let ctx = state.request_context(&headers, params);

    let result = state.executor.list(&collection, &ctx, &query)?;
    Ok(Json(result))
}

async fn view_record(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let expand = params.get("expand").cloned();
    let ctx = state.request_context(&headers, params);

    let record = state
        .executor
        .view(&collection, &ctx, &id, expand.as_deref())?;
    Ok(Json(record))
}

async fn update_record(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let expand = params.get("expand").cloned();
    let ctx = state.request_context(&headers, params);
    let patch = body_object(body)?;

    let record = state
        .executor
        .update(&collection, &ctx, &id, patch, expand.as_deref())?;
    Ok(Json(record))
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.request_context(&headers, params);
    state.executor.delete(&collection, &ctx, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
