//! Prometheus exposition endpoint

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::api::{error::ApiResult, state::ApiState};
use crate::config::load_targets;

/// GET /metrics
///
/// Pull model: an inbound scrape triggers one full query cycle, then renders
/// the registry. The target list is re-read on every call so the exporter
/// always mirrors the file Prometheus is configured with. Always 200 with
/// whatever subset of servers succeeded; 500 only if the encoder itself fails.
pub async fn get_metrics(State(state): State<ApiState>) -> ApiResult<Response> {
    let targets = load_targets(&state.settings.targets_file);
    debug!("scrape requested, querying {} target(s)", targets.len());

    state.scraper.run_cycle(targets).await;

    let body = state.metrics.render()?;
    let content_type = state.metrics.content_type();

    Ok(([(CONTENT_TYPE, content_type)], body).into_response())
}
