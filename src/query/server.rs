use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::core::{OptionId, ProductId, Projector, ValueId};
use crate::error::Error;
use crate::index::SearchIndex;
use crate::query::engine::{FacetQueryEngine, SearchResponse};
use crate::query::filter::parse_filters;
use crate::query::pagination::PageRequest;
use crate::stats::{IndexStats, SyncReport};
use crate::storage::{CatalogPage, CatalogReader};
use crate::sync::SyncOrchestrator;

/// 所有 handler 共享的状态
#[derive(Clone)]
pub struct AppState {
    pub engine: FacetQueryEngine,
    pub reader: CatalogReader,
    pub index: Arc<dyn SearchIndex>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub default_page_size: u64,
}

impl AppState {
    pub fn new(
        reader: CatalogReader,
        index: Arc<dyn SearchIndex>,
        orchestrator: Arc<SyncOrchestrator>,
        default_page_size: u64,
    ) -> Self {
        Self {
            engine: FacetQueryEngine::new(index.clone()),
            reader,
            index,
            orchestrator,
            default_page_size,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/products", get(products_handler))
        .route("/products/ids", get(product_ids_handler))
        .route("/catalog/products", get(catalog_products_handler))
        .route("/options", get(options_handler))
        .route("/sync", post(sync_handler))
        .route("/load", post(sync_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub struct QueryServer {
    pub state: AppState,
}

impl QueryServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        let app = router(self.state);
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        tracing::info!("HTTP Query Server listening on port {}", port);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// `Error` → HTTP 响应：`{ "error": <kind>, "message": <text> }`
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::SyncInProgress => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        let body = json!({ "error": self.0.kind(), "message": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

fn parse_from_id(raw: Option<&str>) -> crate::Result<ProductId> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s
            .parse::<ProductId>()
            .map_err(|_| Error::validation(format!("invalid from_id parameter: {}", s))),
        None => Ok(0),
    }
}

/// `count` 与 `/products` 共用同一校验区间
fn parse_count(raw: Option<&str>, default_size: u64) -> crate::Result<usize> {
    Ok(PageRequest::parse(None, raw, default_size)?.limit())
}

async fn products_handler(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<SearchResponse>> {
    let filters = parse_filters(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    let lookup = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };
    let request = PageRequest::parse(lookup("page"), lookup("count"), state.default_page_size)?;
    Ok(Json(state.engine.search(&filters, request)?))
}

#[derive(Serialize)]
pub struct ProductIdsEntry {
    pub product_id: ProductId,
    pub option_ids: BTreeSet<OptionId>,
    pub option_value_ids: BTreeSet<ValueId>,
}

#[derive(Serialize)]
pub struct ProductIdsResponse {
    pub product_ids: Vec<ProductIdsEntry>,
    pub next_product_id: Option<ProductId>,
    pub count: usize,
}

/// 直接从目录投影（不经过索引），供下游按 keyset 拉取
async fn product_ids_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ProductIdsResponse>> {
    let from_id = parse_from_id(param(&params, "from_id"))?;
    let count = parse_count(param(&params, "count"), state.default_page_size)?;
    let page = state.reader.read_page(from_id, count)?;

    let product_ids: Vec<ProductIdsEntry> = page
        .products
        .iter()
        .map(|p| {
            let projection = Projector::project(p);
            ProductIdsEntry {
                product_id: projection.product_id,
                option_ids: projection.option_ids,
                option_value_ids: projection.option_value_ids,
            }
        })
        .collect();

    Ok(Json(ProductIdsResponse {
        count: product_ids.len(),
        product_ids,
        next_product_id: page.next_product_id,
    }))
}

async fn catalog_products_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<CatalogPage>> {
    let from_id = parse_from_id(param(&params, "from_id"))?;
    let count = parse_count(param(&params, "count"), state.default_page_size)?;
    Ok(Json(state.reader.read_page(from_id, count)?))
}

async fn options_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let options = state.reader.options()?;
    Ok(Json(options).into_response())
}

/// 触发后台同步，立即返回；进度只在日志里
async fn sync_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let from_id = parse_from_id(param(&params, "from_id"))?;
    match state.orchestrator.spawn(from_id) {
        Ok(_) => {
            tracing::info!("Sync triggered over HTTP from product {}", from_id);
            let body = json!({
                "status": "started",
                "message": format!("sync started from product {}", from_id),
            });
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
        Err(Error::SyncInProgress) => {
            let body = json!({
                "status": "already_running",
                "message": Error::SyncInProgress.to_string(),
            });
            Ok((StatusCode::CONFLICT, Json(body)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub index: IndexStats,
    pub sync_running: bool,
    pub last_sync: Option<SyncReport>,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        index: state.index.stats(),
        sync_running: state.orchestrator.is_running(),
        last_sync: state.orchestrator.last_report(),
    })
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let catalog = state.reader.source().ping();
    let index = state.index.ping();

    let describe = |r: &crate::Result<()>| match r {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    };
    let healthy = catalog.is_ok() && index.is_ok();
    let body = json!({
        "status": if healthy { "ok" } else { "unavailable" },
        "catalog": describe(&catalog),
        "index": describe(&index),
    });

    if healthy {
        (StatusCode::OK, Json(body)).into_response()
    } else {
        tracing::warn!("Health check failed: {}", body);
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}
