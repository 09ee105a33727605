//! Shared harness: the full router over an in-memory database.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use rollcall_api::auth::{AppState, AppStateInner, ensure_admin};
use rollcall_api::router;
use rollcall_db::Database;
use rollcall_gateway::dispatcher::Dispatcher;
use rollcall_pass::QrRenderer;

pub const ADMIN_EMAIL: &str = "registrar@uni.example";
pub const ADMIN_PASSWORD: &str = "registrar-pass";
pub const PASSWORD: &str = "long-enough-pw";

#[derive(Clone)]
pub struct TestApp {
    pub state: AppState,
    pub admin_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_renderer(QrRenderer::default()).await
    }

    pub async fn with_renderer(qr: QrRenderer) -> Self {
        let db = Database::open_in_memory().unwrap();
        ensure_admin(&db, ADMIN_EMAIL, ADMIN_PASSWORD, "Registrar").unwrap();

        let state = Arc::new(AppStateInner {
            db,
            jwt_secret: "integration-test-secret".into(),
            token_ttl: chrono::Duration::hours(1),
            dispatcher: Dispatcher::new(),
            qr,
            http: reqwest::Client::new(),
        });

        let mut app = Self { state, admin_token: String::new() };
        app.admin_token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        app
    }

    pub async fn request(
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
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = router(self.state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(token), Some(body)).await
    }

    pub async fn signup(&self, name: &str, role: &str) -> (StatusCode, Value) {
        let email = format!("{}@uni.example", name.to_lowercase());
        self.request(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "role": role,
                "department": "Computer Science",
            })),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn student(&self, name: &str) -> (Uuid, String) {
        let (status, body) = self.signup(name, "student").await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (id, body["token"].as_str().unwrap().to_string())
    }

    pub async fn organizer(&self, name: &str) -> (Uuid, String) {
        let (status, body) = self.signup(name, "organizer").await;
        assert_eq!(status, StatusCode::CREATED);
        let id: Uuid = body["user"]["id"].as_str().unwrap().parse().unwrap();

        let (status, _) = self
            .post(&format!("/admin/users/{id}/approve"), &self.admin_token, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);

        let token = self
            .login(&format!("{}@uni.example", name.to_lowercase()), PASSWORD)
            .await;
        (id, token)
    }

    pub async fn create_event(&self, organizer_token: &str, title: &str, capacity: Option<u32>) -> Uuid {
        let (status, body) = self
            .post(
                "/events",
                organizer_token,
                json!({
                    "title": title,
                    "description": "Bring a laptop",
                    "department": "Computer Science",
                    "venue": "Lab 2",
                    "starts_at": "2026-11-03T14:00:00",
                    "capacity": capacity,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        assert_eq!(body["status"], "pending");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn approved_event(&self, organizer_token: &str, title: &str, capacity: Option<u32>) -> Uuid {
        let id = self.create_event(organizer_token, title, capacity).await;
        let (status, body) = self
            .post(&format!("/admin/events/{id}/approve"), &self.admin_token, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "approved");
        id
    }

    /// Serve the router on an ephemeral local port.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(self.state.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }
}
