use axum::extract::{Query as QueryString, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use datastream_sdk::{ClientConfig, DataStreamClient, Datapoint, Query, StreamError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const API_KEY: &str = "secret";

#[derive(Clone, Default)]
struct Recorded {
    writes: Arc<Mutex<Vec<(&'static str, Value)>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", API_KEY))
        .unwrap_or(false)
}

async fn read_stream(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "bad api key"}))).into_response();
    }
    Json(json!({
        "name": "steps",
        "nickname": "Steps",
        "schema": "{\"type\":\"integer\"}",
        "downlink": null,
        "ephemeral": true
    }))
    .into_response()
}

async fn create_stream(Json(schema): Json<Value>) -> Json<Value> {
    Json(json!({
        "name": "steps",
        "nickname": "",
        "schema": schema.to_string(),
        "downlink": false,
        "ephemeral": false
    }))
}

async fn read_data(QueryString(params): QueryString<HashMap<String, String>>) -> Response {
    if params.get("q").map(String::as_str) == Some("length") {
        // Plain text, as older servers answer.
        return "42\n".into_response();
    }
    Json(json!([{ "t": 1.0, "d": params }])).into_response()
}

async fn post_data(State(recorded): State<Recorded>, Json(body): Json<Value>) -> StatusCode {
    recorded.writes.lock().unwrap().push(("POST", body));
    StatusCode::OK
}

async fn put_data(State(recorded): State<Recorded>, Json(body): Json<Value>) -> StatusCode {
    recorded.writes.lock().unwrap().push(("PUT", body));
    StatusCode::OK
}

async fn missing() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"msg": "stream not found"}))).into_response()
}

async fn serve() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route(
            "/api/v1/alice/phone/steps",
            get(read_stream).post(create_stream),
        )
        .route(
            "/api/v1/alice/phone/steps/data",
            get(read_data).post(post_data).put(put_data),
        )
        .route("/api/v1/alice/phone/missing", get(missing))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api/v1", addr), recorded)
}

async fn client(url: &str) -> DataStreamClient {
    DataStreamClient::connect(ClientConfig::new(url).with_api_key(API_KEY))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_open_stream_reads_metadata() {
    let (url, _) = serve().await;
    let client = client(&url).await;

    let stream = client.open_stream("alice/phone/steps").await.unwrap();

    assert_eq!(stream.nickname(), Some("Steps"));
    assert!(!stream.downlink());
    assert!(stream.ephemeral());
    assert_eq!(stream.schema().unwrap(), json!({"type": "integer"}));
}

#[tokio::test]
async fn test_missing_api_key_is_a_transport_error() {
    let (url, _) = serve().await;
    let client = DataStreamClient::connect(ClientConfig::new(&url)).await.unwrap();

    let err = client.open_stream("alice/phone/steps").await.unwrap_err();
    match err {
        StreamError::Transport { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "bad api key");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_not_found_propagates_status() {
    let (url, _) = serve().await;
    let client = client(&url).await;

    let err = client.open_stream("alice/phone/missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_create_posts_schema() {
    let (url, _) = serve().await;
    let client = client(&url).await;
    let mut stream = client.stream("alice/phone/steps");

    let schema = json!({"type": "object", "properties": {"n": {"type": "integer"}}});
    stream.create(&schema).await.unwrap();

    assert_eq!(stream.schema().unwrap(), schema);
}

#[tokio::test]
async fn test_length_accepts_plain_text() {
    let (url, _) = serve().await;
    let client = client(&url).await;

    let length = client.stream("alice/phone/steps").length().await.unwrap();
    assert_eq!(length, 42);
}

#[tokio::test]
async fn test_query_parameters_reach_the_server() {
    let (url, _) = serve().await;
    let client = client(&url).await;
    let stream = client.stream("alice/phone/steps");

    let points = stream
        .query(&Query::index(2, 9).with_transform("$ > 1"))
        .await
        .unwrap();

    assert_eq!(
        points,
        vec![Datapoint::at(
            1.0,
            json!({"i1": "2", "i2": "9", "transform": "$ > 1"})
        )]
    );
}

#[tokio::test]
async fn test_inserts_use_post_and_put() {
    let (url, recorded) = serve().await;
    let client = client(&url).await;
    let stream = client.stream("alice/phone/steps");

    stream
        .insert_many(&[Datapoint::at(5.0, 1), Datapoint::at(6.0, 2)], false)
        .await
        .unwrap();
    stream.insert(3).await.unwrap();

    assert_eq!(
        *recorded.writes.lock().unwrap(),
        vec![
            ("POST", json!([{"t": 5.0, "d": 1}, {"t": 6.0, "d": 2}])),
            ("PUT", json!([{"d": 3}])),
        ]
    );
}
