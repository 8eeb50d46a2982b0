// HTTP request handlers
use crate::application::kpi_service::KpiRequest;
use crate::domain::count_data::Period;
use crate::domain::kpi::error::KpiError;
use crate::domain::kpi::range::RangeId;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct SelectionQuery {
    pub sites: String,
    pub start: i64,
    pub end: i64,
    pub indicator: Option<String>,
}

#[derive(Deserialize)]
pub struct KpiQuery {
    pub sites: String,
    pub start: i64,
    pub end: i64,
    pub indicator: Option<String>,
    pub group_by: Option<RangeId>,
    pub compare_start: Option<i64>,
    pub compare_end: Option<i64>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Indicators and ranges available for a site selection
pub async fn list_indicators(
    Query(query): Query<SelectionQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let site_ids = parse_site_ids(&query.sites);
    if site_ids.is_empty() {
        return bad_request("no site selected");
    }

    let period = Period::new(query.start, query.end);
    match state
        .kpi_service
        .descriptors(&site_ids, period, query.indicator.as_deref())
        .await
    {
        Ok(descriptors) => Json(descriptors).into_response(),
        Err(e) => error_response(e),
    }
}

/// Compute one KPI over a site selection, optionally against a compared period
pub async fn compute_kpi(
    Query(query): Query<KpiQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let site_ids = parse_site_ids(&query.sites);
    if site_ids.is_empty() {
        return bad_request("no site selected");
    }

    let compared_period = match (query.compare_start, query.compare_end) {
        (Some(start), Some(end)) => Some(Period::new(start, end)),
        _ => None,
    };
    let request = KpiRequest {
        site_ids,
        period: Period::new(query.start, query.end),
        indicator: query.indicator,
        group_by: query.group_by,
        compared_period,
    };

    match state.kpi_service.compute(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

fn parse_site_ids(sites: &str) -> Vec<String> {
    sites
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Invalid queries are the caller's fault, everything else is ours
fn error_response(err: anyhow::Error) -> Response {
    if let Some(kpi_error) = err.downcast_ref::<KpiError>() {
        tracing::warn!("Rejected KPI query: {}", kpi_error);
        return bad_request(&kpi_error.to_string());
    }

    tracing::error!("KPI request failed: {:#}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "failed to compute KPI" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_site_ids() {
        assert_eq!(parse_site_ids("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_site_ids(" , ").is_empty());
    }

    #[test]
    fn test_error_response_status() {
        let invalid = anyhow::Error::new(KpiError::InvalidQuery("missing period".to_string()));
        assert_eq!(error_response(invalid).status(), StatusCode::BAD_REQUEST);

        let failure = anyhow::anyhow!("connection refused");
        assert_eq!(error_response(failure).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
