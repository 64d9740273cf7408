use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::AppError;
use crate::search::service::{PagedResult, SearchService};

/// Query string of `GET /api/v1/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Free text or a document id. Missing means the empty term.
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Core search logic, separated from the HTTP layer for testability.
pub async fn process_search(
    service: &SearchService,
    params: SearchParams,
    default_per_page: u64,
) -> Result<PagedResult, AppError> {
    let page = params.page.unwrap_or(1);
    let per_page = params
        .per_page
        .unwrap_or_else(|| i64::try_from(default_per_page).unwrap_or(i64::MAX));

    service.search(params.search.as_deref(), page, per_page).await
}

/// Axum handler for `GET /api/v1/search`.
pub async fn search_handler(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<PagedResult>, AppError> {
    let Query(params) = params.map_err(|e| AppError::InvalidArgument(e.body_text()))?;
    let result = process_search(&state.search, params, state.default_per_page).await?;
    Ok(Json(result))
}
