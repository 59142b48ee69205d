mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;

pub use self::error::*;
pub use self::state::*;
pub use self::types::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::retrieve_handler, api::rerank_handler, api::asset_handler),
    components(schemas(
        types::RetrieveRequest,
        types::RerankRequest,
        types::CandidatesResponse,
        types::AssetResponse,
        crate::retriever::Candidate,
        crate::catalog::BoundingBox,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/retrieve", post(api::retrieve_handler))
        .route("/rerank", post(api::rerank_handler))
        .route("/assets/{id}", get(api::asset_handler))
        .route("/api-docs/openapi.json", get(api::openapi_handler))
        // 请求体限制：1M
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .with_state(state)
}
