use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Html;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::AppError;
use crate::rendering::reference::{render_reference, Reference};

#[derive(Debug, Default, Deserialize)]
pub struct RenderParams {
    #[serde(rename = "postId")]
    pub post_id: Option<String>,
}

/// Axum handler for `GET /api/v1/render`.
///
/// Responds with the reference fragment, or an empty body when the
/// reference does not resolve.
pub async fn render_handler(
    State(state): State<AppState>,
    params: Result<Query<RenderParams>, QueryRejection>,
) -> Result<Html<String>, AppError> {
    let Query(params) = params.map_err(|e| AppError::InvalidArgument(e.body_text()))?;
    let reference = params
        .post_id
        .as_deref()
        .map(Reference::from_param)
        .unwrap_or_default();

    Ok(Html(render_reference(&state.resolver, &reference).await))
}
