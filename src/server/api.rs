use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum_auth::AuthBearer;
use log::info;
use tokio::task::spawn_blocking;
use utoipa::OpenApi;

use super::ApiDoc;
use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::utils::check_size;

fn check_token(state: &AppState, token: &str) -> Result<()> {
    if state.token != token {
        return Err(AppError::unauthorized());
    }
    Ok(())
}

/// 检索资产
#[utoipa::path(
    post,
    path = "/retrieve",
    request_body = RetrieveRequest,
    responses(
        (status = 200, body = CandidatesResponse),
    )
)]
pub async fn retrieve_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<CandidatesResponse>> {
    check_token(&state, &token)?;
    if let Some(size) = req.size {
        check_size(size).map_err(AppError::bad_request)?;
    }

    let start = Instant::now();
    info!("正在检索: {:?}", req.queries);

    let count = req.count.unwrap_or(state.count);
    let state2 = state.clone();
    let mut candidates = spawn_blocking(move || -> anyhow::Result<_> {
        let candidates = state2.retriever.retrieve(&req.queries, req.threshold)?;
        match req.size {
            Some(size) => {
                Ok(state2.reranker.rerank(state2.retriever.catalog(), size, candidates)?)
            }
            None => Ok(candidates),
        }
    })
    .await??;
    candidates.truncate(count);

    Ok(Json(CandidatesResponse { time: start.elapsed().as_millis() as u64, candidates }))
}

/// 按目标尺寸重排候选
#[utoipa::path(
    post,
    path = "/rerank",
    request_body = RerankRequest,
    responses(
        (status = 200, body = CandidatesResponse),
    )
)]
pub async fn rerank_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(req): Json<RerankRequest>,
) -> Result<Json<CandidatesResponse>> {
    check_token(&state, &token)?;
    check_size(req.size).map_err(AppError::bad_request)?;

    let start = Instant::now();
    let candidates = state.reranker.rerank(state.retriever.catalog(), req.size, req.candidates)?;

    Ok(Json(CandidatesResponse { time: start.elapsed().as_millis() as u64, candidates }))
}

/// 查询资产的类别和包围盒，被过滤掉的资产同样可查
#[utoipa::path(
    get,
    path = "/assets/{id}",
    params(("id" = String, Path, description = "资产 ID")),
    responses(
        (status = 200, body = AssetResponse),
        (status = 404),
    )
)]
pub async fn asset_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(id): Path<String>,
) -> Result<Json<AssetResponse>> {
    check_token(&state, &token)?;

    let catalog = state.retriever.catalog();
    if catalog.annotation(&id).is_none() {
        return Err(AppError::not_found(&id));
    }
    let position = catalog.position(&id);

    Ok(Json(AssetResponse {
        retrievable: position.is_some(),
        origin: position.map(|i| catalog.origin(i)),
        category: catalog.category(&id).map(str::to_string),
        bounding_box: catalog.bounding_box(&id),
        asset_id: id,
    }))
}

pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
