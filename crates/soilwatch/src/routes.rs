use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use soilwatch_core::pipeline::parse_depth_list;
use soilwatch_core::{FetchError, NoDataReason, Outcome, PipelineError, TemperatureUnit};
use tracing::{error, warn};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MoistureQuery {
    pub sensor: Option<String>,
    pub tz: Option<String>,
    pub depths: Option<String>,
    pub days: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemperatureQuery {
    pub sensor: Option<String>,
    pub tz: Option<String>,
    pub depth: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Serialize)]
struct DataBody<T: Serialize> {
    status: &'static str,
    #[serde(flatten)]
    data: T,
}

#[derive(Debug, Serialize)]
struct NoDataBody {
    status: &'static str,
    reason: NoDataReason,
    message: String,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn moisture(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MoistureQuery>,
) -> Result<Response, ApiError> {
    let depths = query
        .depths
        .as_deref()
        .map(parse_depth_list)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let days = parse_optional(query.days.as_deref(), "days")?;
    let request = state.moisture_request(query.sensor, query.tz.as_deref(), depths, days)?;

    let outcome = state.pipeline().moisture(&request, Utc::now(), None).await?;
    Ok(outcome_response(outcome))
}

pub async fn temperature(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TemperatureQuery>,
) -> Result<Response, ApiError> {
    let depth = parse_optional(query.depth.as_deref(), "depth")?;
    let unit = query
        .unit
        .as_deref()
        .map(str::parse::<TemperatureUnit>)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let request = state.temperature_request(query.sensor, query.tz.as_deref(), depth, unit)?;

    let outcome = state
        .pipeline()
        .temperature(&request, Utc::now(), None)
        .await?;
    Ok(outcome_response(outcome))
}

fn parse_optional<T>(raw: Option<&str>, name: &str) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|err| ApiError::BadRequest(format!("invalid {name} '{value}': {err}")))
        })
        .transpose()
}

fn outcome_response<T: Serialize>(outcome: Outcome<T>) -> Response {
    match outcome {
        Outcome::Data(data) => Json(DataBody { status: "ok", data }).into_response(),
        Outcome::NoData(reason) => Json(NoDataBody {
            status: "no_data",
            reason,
            message: reason.to_string(),
        })
        .into_response(),
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidRequest(message) => ApiError::BadRequest(message),
            other => ApiError::Pipeline(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "error": message })),
            )
                .into_response(),
            ApiError::Pipeline(PipelineError::Fetch(FetchError::Status { status, body })) => {
                warn!(upstream_status = status, "upstream returned an error");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({
                        "status": "upstream_error",
                        "upstreamStatus": status,
                        "upstreamBody": body,
                    })),
                )
                    .into_response()
            }
            ApiError::Pipeline(PipelineError::Fetch(err)) => {
                warn!(error = %err, "upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "status": "upstream_error", "error": err.to_string() })),
                )
                    .into_response()
            }
            ApiError::Pipeline(PipelineError::Cancelled) => (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({ "status": "error", "error": "request cancelled" })),
            )
                .into_response(),
            ApiError::Pipeline(err) => {
                error!(error = %err, "pipeline failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": "error", "error": err.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
