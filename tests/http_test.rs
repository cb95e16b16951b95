//! Uploads over real HTTP against a local axum receiver

use axum::{
    Json, Router,
    extract::{Multipart, Query},
    http::StatusCode,
    routing::post,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use upbox::config::UploadConfig;
use upbox::transport::HttpConfig;
use upbox::{
    EventHub, EventKind, FileDescriptor, FileSelection, HttpTransporter, PathPicker, UploadError,
    UploadEvent, UploadOrchestrator, UploadOutcome, UrlParams, UserData,
};

/// Echoes every multipart field and the query string back as JSON
async fn receive(
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        fields.push(json!({
            "name": name,
            "file_name": file_name,
            "content_type": content_type,
            "data": String::from_utf8_lossy(&data),
        }));
    }
    Ok(Json(json!({ "query": query, "fields": fields })))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn spawn_receiver() -> SocketAddr {
    let app = Router::new()
        .route("/upload", post(receive))
        .route("/broken", post(broken));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn transporter() -> Arc<HttpTransporter> {
    let config = HttpConfig {
        request_timeout: Duration::from_secs(10),
        chunk_size: 4,
        ..HttpConfig::default()
    };
    Arc::new(HttpTransporter::new(config).unwrap())
}

fn orchestrator(endpoint: String, hub: EventHub) -> UploadOrchestrator {
    let config = UploadConfig {
        endpoint,
        ..UploadConfig::default()
    };
    UploadOrchestrator::new(config, hub, transporter())
}

#[tokio::test]
async fn uploads_files_and_user_data_as_multipart() {
    let addr = spawn_receiver().await;
    let percents: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut hub = EventHub::empty();
    let sink = Arc::clone(&percents);
    hub.set(EventKind::Progress, move |event: &UploadEvent<'_>| {
        if let UploadEvent::Progress { report, .. } = event {
            sink.lock().unwrap().push(report.percent.clone());
        }
    });
    let orchestrator = orchestrator(format!("http://{}/upload", addr), hub);

    let files: FileSelection = [
        FileDescriptor::from_bytes("hello.txt", "text/plain", "hello world"),
        FileDescriptor::from_bytes("data.json", "application/json", "{\"a\":1}"),
    ]
    .into_iter()
    .collect();
    let params: UrlParams = [("album", "summer 2024")].into_iter().collect();
    let user_data = UserData::new().with("owner", "ada").with("count", 2);

    let outcome = orchestrator.upload(files, Some(params), user_data).await;

    let response = match outcome {
        UploadOutcome::Completed(response) => response,
        other => panic!("upload did not complete: {:?}", other),
    };
    assert_eq!(response.code, 200);
    assert_eq!(response.status_line, "OK");

    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["query"]["album"], "summer 2024");

    let fields = body["fields"].as_array().unwrap();
    let names: Vec<_> = fields.iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["file1", "file2", "count", "owner"]);

    assert_eq!(fields[0]["file_name"], "hello.txt");
    assert_eq!(fields[0]["content_type"], "text/plain");
    assert_eq!(fields[0]["data"], "hello world");
    assert_eq!(fields[1]["file_name"], "data.json");
    assert_eq!(fields[1]["data"], "{\"a\":1}");
    assert_eq!(fields[2]["data"], "2");
    assert_eq!(fields[3]["data"], "ada");
    assert!(fields[3]["file_name"].is_null());

    let percents = percents.lock().unwrap();
    assert!(!percents.is_empty());
    assert_eq!(percents.last().map(String::as_str), Some("100%"));
}

#[tokio::test]
async fn picks_and_streams_files_from_disk() {
    let addr = spawn_receiver().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("photo.png");
    std::fs::write(&path, b"not really a png").unwrap();

    let orchestrator = orchestrator(format!("http://{}/upload", addr), EventHub::empty());
    let outcome = orchestrator
        .choose_files(&PathPicker::new([path]), None, UserData::new())
        .await
        .unwrap();

    let response = match outcome {
        Some(UploadOutcome::Completed(response)) => response,
        other => panic!("upload did not complete: {:?}", other),
    };
    let body: Value = serde_json::from_str(&response.body).unwrap();
    let field = &body["fields"][0];
    assert_eq!(field["name"], "file1");
    assert_eq!(field["file_name"], "photo.png");
    assert_eq!(field["content_type"], "image/png");
    assert_eq!(field["data"], "not really a png");
}

#[tokio::test]
async fn server_error_maps_to_http_error() {
    let addr = spawn_receiver().await;
    let errors: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut hub = EventHub::empty();
    let sink = Arc::clone(&errors);
    hub.set(EventKind::Error, move |event: &UploadEvent<'_>| {
        if let UploadEvent::Error { error, .. } = event {
            sink.lock().unwrap().push(error.to_string());
        }
    });
    let orchestrator = orchestrator(format!("http://{}/broken", addr), hub);

    let files: FileSelection = [FileDescriptor::from_bytes("a.txt", "text/plain", "a")]
        .into_iter()
        .collect();
    let outcome = orchestrator.upload(files, None, UserData::new()).await;

    assert_eq!(
        outcome,
        UploadOutcome::Failed(UploadError::Http {
            code: 500,
            status_line: "Internal Server Error".to_string()
        })
    );
    assert_eq!(
        errors.lock().unwrap().as_slice(),
        ["Error uploading files: HTTP 500 Internal Server Error"]
    );
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let orchestrator = orchestrator(format!("http://{}/upload", addr), EventHub::empty());
    let files: FileSelection = [FileDescriptor::from_bytes("a.txt", "text/plain", "a")]
        .into_iter()
        .collect();
    let outcome = orchestrator.upload(files, None, UserData::new()).await;

    assert!(matches!(
        outcome,
        UploadOutcome::Failed(UploadError::Transport { .. })
    ));
}
