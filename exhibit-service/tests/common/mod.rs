#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use exhibit_service::config::ExhibitConfig;
use exhibit_service::models::{NewUser, Role, DEFAULT_PROFILE_PHOTO};
use exhibit_service::services::identity::{ensure_bootstrap_admin, BootstrapAdmin};
use exhibit_service::services::{
    IdentityStore, InMemoryStore, MemoryStorage, ModerationService, TransitionPolicy,
};
use exhibit_service::startup::{build_router, AppState};
use exhibit_service::utils::password::{hash_password, Password};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;
use tower_sessions::MemoryStore;

pub const ADMIN_LOGIN: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin12345";
pub const USER_PASSWORD: &str = "password123";

const BOUNDARY: &str = "exhibit-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub storage: Arc<MemoryStorage>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub cookie: Option<String>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(ExhibitConfig::default()).await
    }

    pub async fn spawn_with(config: ExhibitConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let storage = Arc::new(MemoryStorage::new());

        ensure_bootstrap_admin(
            store.as_ref(),
            BootstrapAdmin {
                username: config.bootstrap.username.clone(),
                email: config.bootstrap.email.clone(),
                password: Password::new(config.bootstrap.password.clone()),
            },
        )
        .await
        .expect("Failed to create bootstrap admin");

        let moderation = ModerationService::new(
            store.clone(),
            store.clone(),
            storage.clone(),
            TransitionPolicy::from_strict_flag(config.moderation.strict_transitions),
        );
        let router = build_router(AppState::new(config, moderation), MemoryStore::default());

        Self {
            router,
            store,
            storage,
        }
    }

    /// Insert an identity directly, bypassing sign-up.
    pub async fn seed_user(&self, username: &str, role: Role) -> i32 {
        let password_hash = hash_password(&Password::new(USER_PASSWORD))
            .expect("Failed to hash password")
            .into_string();
        self.store
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash,
                profile_photo_path: DEFAULT_PROFILE_PHOTO.to_string(),
                role,
            })
            .await
            .expect("Failed to seed user")
            .id
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            body,
            cookie,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, cookie).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::POST, uri, cookie).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::DELETE, uri, cookie).body(Body::empty()).unwrap())
            .await
    }

    pub async fn login_raw(&self, login: &str, password: &str) -> TestResponse {
        let body = serde_json::json!({ "login": login, "password": password });
        self.send(
            request(Method::POST, "/api/v1/login", None)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Log in and return the session cookie.
    pub async fn login(&self, login: &str, password: &str) -> String {
        let response = self.login_raw(login, password).await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        response.cookie.expect("login did not set a session cookie")
    }

    pub async fn login_admin(&self) -> String {
        self.login(ADMIN_LOGIN, ADMIN_PASSWORD).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        form: MultipartBody,
    ) -> TestResponse {
        self.send(
            request(method, uri, cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(form.finish()))
                .unwrap(),
        )
        .await
    }

    /// Submit an exhibit of type Photo and return its id.
    pub async fn submit_exhibit(&self, cookie: &str, title: &str) -> i32 {
        let form = MultipartBody::new()
            .text("title", title)
            .text("type", "1")
            .text("description", "A test exhibit")
            .file("file", "photo.png", b"not really a png");
        let response = self
            .multipart(Method::POST, "/api/v1/user/exhibit/create", Some(cookie), form)
            .await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "submission failed: {}",
            response.body
        );
        response.body["id"].as_i64().expect("exhibit id") as i32
    }
}

fn request(method: Method, uri: &str, cookie: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "127.0.0.1");
    match cookie {
        Some(cookie) => builder.header(header::COOKIE, cookie),
        None => builder,
    }
}

#[derive(Default)]
pub struct MultipartBody {
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.buf
    }
}
