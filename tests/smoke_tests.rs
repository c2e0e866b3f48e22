//! Smoke tests for the HTTP surface around the JSON endpoints: liveness,
//! headers, multipart uploads and body limits.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{spawn_app, spawn_app_with, test_config};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "reqdesk-test-boundary";

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send_multipart(
    app: &common::TestApp,
    method: &str,
    uri: &str,
    token: &str,
    parts: &[Part<'_>],
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn png(size: usize) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(size.max(8), 0);
    bytes
}

#[tokio::test]
async fn smoke_root_and_health() {
    let app = spawn_app().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "API is running");
    assert_eq!(json["status"], "ok");

    let (status, body) = app.send("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn smoke_metrics_require_admin() {
    let app = spawn_app().await;
    let (_, agent) = app.register("agent@example.com", "agent").await;

    let (status, _) = app.send("GET", "/api/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/metrics", &agent).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn smoke_malformed_input() {
    let app = spawn_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/user/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].is_string());

    let (status, body) = app.post("/api/user/login", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email and password are required");

    let admin = app.admin_token().await;
    let (status, body) = app.get("/api/template/not-a-uuid", &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Template not found");

    let (status, _) = app.get("/api/admin?isActive=maybe", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn smoke_template_preview_upload_is_served() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/template",
        &admin,
        &[
            Part::Text("title", "Open House"),
            Part::Text("category", "flyers"),
            Part::Text("type", "residential"),
            Part::File {
                name: "preview",
                file_name: "open house.png",
                content_type: "image/png",
                bytes: png(512),
            },
        ],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let preview_url = body["template"]["previewUrl"].as_str().unwrap().to_string();
    let path = preview_url
        .split_once("/uploads/")
        .map(|(_, key)| format!("/uploads/{key}"))
        .unwrap();
    assert!(path.starts_with("/uploads/templates/"));
    assert!(path.ends_with("open_house.png"));

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.len(), 512);
}

#[tokio::test]
async fn smoke_preview_must_be_an_image() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/template",
        &admin,
        &[
            Part::Text("title", "Notes"),
            Part::Text("category", "flyers"),
            Part::Text("type", "residential"),
            Part::File {
                name: "preview",
                file_name: "notes.txt",
                content_type: "text/plain",
                bytes: b"hello".to_vec(),
            },
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, body) = app.get("/api/template", &admin).await;
    assert_eq!(body["templates"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn smoke_upload_limits() {
    let mut config = test_config();
    config.uploads.preview_max_bytes = 1024;
    let app = spawn_app_with(config).await;
    let admin = app.admin_token().await;

    // Inside the route's body limit but over the preview policy.
    let (status, _) = send_multipart(
        &app,
        "POST",
        "/api/template",
        &admin,
        &[
            Part::Text("title", "Big"),
            Part::Text("category", "flyers"),
            Part::Text("type", "residential"),
            Part::File {
                name: "preview",
                file_name: "big.png",
                content_type: "image/png",
                bytes: png(4096),
            },
        ],
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    // Past the route's body limit: rejected while reading the body.
    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/template",
        &admin,
        &[
            Part::Text("title", "Huge"),
            Part::Text("category", "flyers"),
            Part::Text("type", "residential"),
            Part::File {
                name: "preview",
                file_name: "huge.png",
                content_type: "image/png",
                bytes: png(200 * 1024),
            },
        ],
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());

    let (_, body) = app.get("/api/template", &admin).await;
    assert_eq!(body["templates"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn smoke_bulk_templates() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let previews = || {
        vec![
            Part::Text("category", "postcards"),
            Part::Text("type", "commercial"),
            Part::File {
                name: "previews",
                file_name: "harbor.png",
                content_type: "image/png",
                bytes: png(64),
            },
            Part::File {
                name: "previews",
                file_name: "skyline.jpg",
                content_type: "image/jpeg",
                bytes: png(64),
            },
        ]
    };

    let (status, body) =
        send_multipart(&app, "POST", "/api/template/bulk", &admin, &previews()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "2 template(s) created, 0 skipped");
    let titles: Vec<&str> = body["created"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["harbor", "skyline"]);

    let (status, body) =
        send_multipart(&app, "POST", "/api/template/bulk", &admin, &previews()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "0 template(s) created, 2 skipped");

    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/template/bulk",
        &admin,
        &[
            Part::Text("category", "postcards"),
            Part::Text("type", "commercial"),
            Part::Text("titlePrefix", "Card"),
            Part::File {
                name: "previews[]",
                file_name: "a.png",
                content_type: "image/png",
                bytes: png(64),
            },
        ],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"][0]["title"], "Card 1");

    let (status, _) = send_multipart(
        &app,
        "POST",
        "/api/template/bulk",
        &admin,
        &[Part::Text("category", "postcards"), Part::Text("type", "commercial")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn smoke_request_with_attachments() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, agent) = app.register("agent@example.com", "agent").await;
    let template_id = app.create_template(&admin, "Flyer").await;

    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/request",
        &agent,
        &[
            Part::Text("templateId", &template_id),
            Part::Text("projectTitle", "Open House"),
            Part::Text("deadline", "2025-06-01"),
            Part::Text("platforms", "[\"instagram\",\"facebook\"]"),
            Part::Text("fileUrls", "https://cdn.example.com/logo.svg"),
            Part::File {
                name: "files",
                file_name: "brief.pdf",
                content_type: "application/pdf",
                bytes: b"%PDF-1.4".to_vec(),
            },
        ],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let request = &body["request"];
    assert_eq!(request["platforms"], json!(["instagram", "facebook"]));
    let files = request["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f["fileType"] == "agent_upload"));

    let request_id = request["id"].as_str().unwrap();
    let (_, va) = app.register("va@example.com", "va").await;
    let (status, body) = send_multipart(
        &app,
        "POST",
        &format!("/api/request/{request_id}/files"),
        &va,
        &[Part::File {
            name: "file",
            file_name: "final.png",
            content_type: "image/png",
            bytes: png(128),
        }],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["file"]["fileType"], "va_completed");
    assert!(
        body["file"]["fileUrl"]
            .as_str()
            .unwrap()
            .contains("/uploads/requests/")
    );
}
