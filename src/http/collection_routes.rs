//! # Collection Routes
//!
//! Administrative schema operations: define, inspect, alter, drop.
//! Every response carries the collection's schema version so migration
//! tooling can stamp what it produced.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::schema::{CollectionDiff, FieldDef, RuleSet};

use super::problem::ApiError;
use super::state::AppState;

/// Routes under `/collections`.
pub fn collection_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/collections", get(list_collections).post(define_collection))
        .route(
            "/collections/:name",
            get(get_collection)
                .patch(alter_collection)
                .delete(drop_collection),
        )
}

/// Body of a define request.
#[derive(Debug, Deserialize)]
pub struct DefineCollectionRequest {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub rules: RuleSet,
}

/// Body of an alter request.
#[derive(Debug, Deserialize)]
pub struct AlterCollectionRequest {
    #[serde(default)]
    pub add: Vec<FieldDef>,
    #[serde(default)]
    pub change: Vec<FieldDef>,
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default)]
    pub rules: Option<RuleSet>,
}

impl From<AlterCollectionRequest> for CollectionDiff {
    fn from(request: AlterCollectionRequest) -> Self {
        Self {
            add: request.add,
            change: request.change,
            remove: request.remove,
            rules: request.rules,
        }
    }
}

async fn define_collection(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<DefineCollectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.request_context(&headers, params);
    let collection =
        state
            .executor
            .define_collection(&ctx, &body.name, body.fields, body.rules)?;
    Ok((StatusCode::CREATED, Json(collection)))
}

async fn list_collections(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.request_context(&headers, params);
    let collections = state.executor.list_collections(&ctx)?;
    Ok(Json(collections))
}

async fn get_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.request_context(&headers, params);
    let collection = state.executor.get_collection(&ctx, &name)?;
    Ok(Json(collection))
}

async fn alter_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<AlterCollectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.request_context(&headers, params);
    let collection = state
        .executor
        .alter_collection(&ctx, &name, body.into())?;
    Ok(Json(collection))
}

async fn drop_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.request_context(&headers, params);
    state.executor.drop_collection(&ctx, &name)?;
    Ok(StatusCode::NO_CONTENT)
}
