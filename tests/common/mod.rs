#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use reqdesk::config::Config;
use reqdesk::services::{Email, MailError, Mailer};
use reqdesk::state::SharedState;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";
pub const ADMIN_EMAIL: &str = "root@reqdesk.test";

/// Keeps every message instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub shared: Arc<SharedState>,
    pub mailer: RecordingMailer,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.auth.expose_reset_token = true;
    config.security.argon2_memory_cost_kib = 8;
    config.security.argon2_time_cost = 1;
    config.security.argon2_parallelism = 1;
    config.uploads.local_dir = std::env::temp_dir()
        .join(format!("reqdesk-test-{}", uuid::Uuid::new_v4()))
        .display()
        .to_string();
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let mailer = RecordingMailer::default();
    let (shared, _worker) = SharedState::with_mailer(config, Arc::new(mailer.clone()))
        .await
        .expect("failed to create state");
    let shared = Arc::new(shared);

    shared
        .auth_service
        .ensure_admin(ADMIN_EMAIL, PASSWORD, Some("Root"))
        .await
        .expect("failed to create admin");

    let state = reqdesk::api::create_app_state(shared.clone(), None);
    TestApp {
        router: reqdesk::api::router(state),
        shared,
        mailer,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send("DELETE", uri, Some(token), None).await
    }

    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/user/login",
                None,
                json!({"email": email, "password": PASSWORD}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["accessToken"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL).await
    }

    /// Registers an account and returns `(user id, access token)`.
    pub async fn register(&self, email: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/user/register",
                None,
                json!({"email": email, "password": PASSWORD, "role": role}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["accessToken"].as_str().unwrap().to_string(),
        )
    }

    pub async fn create_template(&self, admin: &str, title: &str) -> String {
        let (status, body) = self
            .post(
                "/api/template",
                Some(admin),
                json!({"title": title, "category": "flyers", "type": "residential"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "template failed: {body}");
        body["template"]["id"].as_str().unwrap().to_string()
    }

    pub async fn create_request(&self, agent: &str, template_id: &str, title: &str) -> String {
        let (status, body) = self
            .post(
                "/api/request",
                Some(agent),
                json!({
                    "templateId": template_id,
                    "projectTitle": title,
                    "deadline": "2025-06-01",
                    "platforms": ["instagram"],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "request failed: {body}");
        body["request"]["id"].as_str().unwrap().to_string()
    }

    /// The dispatcher delivers on a background task.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<Email> {
        for _ in 0..100 {
            let sent = self.mailer.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.mailer.sent()
    }
}
