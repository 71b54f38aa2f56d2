use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::America::Los_Angeles;
use http_body_util::BodyExt;
use serde_json::Value;
use soilwatch::{create_app, AppState};
use soilwatch_core::config::RequestDefaults;
use soilwatch_core::{FetchError, Pipeline, ReadingSource};
use soilwatch_parser::ChannelDepthTable;
use tower::ServiceExt;

enum Reply {
    Csv(String),
    Status(u16, &'static str),
}

struct StaticSource(Reply);

#[async_trait]
impl ReadingSource for StaticSource {
    async fn fetch_csv(&self, _sensor: &str, _from: DateTime<Utc>) -> Result<String, FetchError> {
        match &self.0 {
            Reply::Csv(body) => Ok(body.clone()),
            Reply::Status(status, body) => Err(FetchError::Status {
                status: *status,
                body: body.to_string(),
            }),
        }
    }
}

fn app(reply: Reply) -> Router {
    let pipeline = Pipeline::new(Arc::new(StaticSource(reply)), ChannelDepthTable::new());
    let state = AppState::new(pipeline, RequestDefaults::default()).expect("default state");
    create_app(state, &[])
}

/// Two rows an hour apart, ending an hour before the request runs, written as the
/// Los Angeles wall clock that the default zone expects.
fn recent_export() -> String {
    let stamp = |hours: i64| {
        (Utc::now() - Duration::hours(hours))
            .with_timezone(&Los_Angeles)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    };
    format!(
        "Date Time,V1,A1(15),A2(56),T1(15),T2(56)\n\
         {},4.1,0.200,0.300,19.0,18.0\n\
         {},4.1,0.240,0.340,21.0,18.5\n",
        stamp(2),
        stamp(1)
    )
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_check_answers_ok() {
    let response = app(Reply::Csv(String::new()))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn missing_sensor_is_bad_request() {
    let (status, body) = get(app(Reply::Csv(recent_export())), "/moisture").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().expect("message").contains("sensor"));
}

#[tokio::test]
async fn malformed_parameters_are_bad_requests() {
    for uri in [
        "/moisture?sensor=North&days=week",
        "/moisture?sensor=North&days=0",
        "/moisture?sensor=North&depths=6,deep",
        "/moisture?sensor=North&tz=Mars/Olympus",
        "/temperature?sensor=North&unit=kelvin",
        "/temperature?sensor=North&depth=-3",
    ] {
        let (status, _) = get(app(Reply::Csv(recent_export())), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn moisture_summary_is_returned_as_json() {
    let (status, body) = get(
        app(Reply::Csv(recent_export())),
        "/moisture?sensor=North&depths=6,22&days=7",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sensor"], "North");
    assert_eq!(body["timezone"], "America/Los_Angeles");
    assert_eq!(body["windowDays"], 7);

    let depths = body["depths"].as_array().expect("depths");
    assert_eq!(depths.len(), 2);
    assert_eq!(depths[0]["column"], "A1(15)");
    assert_eq!(depths[0]["latestValue"], 24.0);
    assert_eq!(depths[0]["windowAverage"], 22.0);
    assert_eq!(depths[0]["windowCount"], 2);
    assert_eq!(depths[1]["column"], "A2(56)");
    assert_eq!(depths[1]["latestValue"], 34.0);
}

#[tokio::test]
async fn oversized_window_covers_whole_export() {
    let (status, body) = get(
        app(Reply::Csv(recent_export())),
        "/moisture?sensor=North&depths=6&days=4000000000",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["windowDays"], 4_000_000_000u32);
    assert_eq!(body["depths"][0]["windowAverage"], 22.0);
    assert_eq!(body["depths"][0]["windowCount"], 2);
}

#[tokio::test]
async fn temperature_defaults_to_fahrenheit() {
    let (status, body) = get(
        app(Reply::Csv(recent_export())),
        "/temperature?sensor=North",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["unit"], "fahrenheit");
    assert_eq!(body["column"], "T1(15)");
    assert_eq!(body["today"]["current"], 69.8);
}

#[tokio::test]
async fn export_without_channels_is_no_data() {
    let (status, body) = get(
        app(Reply::Csv("Date Time,V1\n2024-07-15 09:00:00,4.1\n".to_string())),
        "/moisture?sensor=North",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_data");
    assert_eq!(body["reason"], "no_recognized_columns");
}

#[tokio::test]
async fn upstream_failure_maps_to_bad_gateway() {
    let (status, body) = get(
        app(Reply::Status(503, "maintenance window")),
        "/temperature?sensor=North",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "upstream_error");
    assert_eq!(body["upstreamStatus"], 503);
    assert_eq!(body["upstreamBody"], "maintenance window");
}
