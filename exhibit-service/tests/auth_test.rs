mod common;

use axum::http::{Method, StatusCode};
use common::{MultipartBody, TestApp, USER_PASSWORD};
use exhibit_service::models::Role;

fn sign_up_form(username: &str, email: &str, password: &str) -> MultipartBody {
    MultipartBody::new()
        .text("username", username)
        .text("email", email)
        .text("password", password)
}

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app.get("/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn sign_up_creates_a_regular_user() {
    let app = TestApp::spawn().await;

    let response = app
        .multipart(
            Method::POST,
            "/api/v1/sign-up",
            None,
            sign_up_form("alice", "alice@example.com", "password123"),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["username"], "alice");
    assert_eq!(response.body["role"], "User");
    assert_eq!(response.body["profile_photo_path"], "default.png");
    assert!(response.body.get("password_hash").is_none());
    assert_ne!(response.body["id"], 1);
}

#[tokio::test]
async fn sign_up_with_photo_stores_it() {
    let app = TestApp::spawn().await;

    let form = sign_up_form("bob", "bob@example.com", "password123").file(
        "profile_photo",
        "me.jpg",
        b"jpeg bytes",
    );
    let response = app
        .multipart(Method::POST, "/api/v1/sign-up", None, form)
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let photo = response.body["profile_photo_path"].as_str().unwrap();
    assert!(photo.ends_with(".jpg"));
    assert!(app.storage.contains(&format!("users/{}", photo)));
}

#[tokio::test]
async fn sign_up_rejects_duplicates_and_bad_input() {
    let app = TestApp::spawn().await;
    app.seed_user("carol", Role::User).await;

    let duplicate = app
        .multipart(
            Method::POST,
            "/api/v1/sign-up",
            None,
            sign_up_form("carol", "other@example.com", "password123"),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let bad_chars = app
        .multipart(
            Method::POST,
            "/api/v1/sign-up",
            None,
            sign_up_form("dave!", "dave@example.com", "password123"),
        )
        .await;
    assert_eq!(bad_chars.status, StatusCode::BAD_REQUEST);

    let short_password = app
        .multipart(
            Method::POST,
            "/api/v1/sign-up",
            None,
            sign_up_form("erin", "erin@example.com", "short"),
        )
        .await;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_accepts_username_or_email() {
    let app = TestApp::spawn().await;
    app.seed_user("frank", Role::User).await;

    let by_name = app.login_raw("frank", USER_PASSWORD).await;
    assert_eq!(by_name.status, StatusCode::OK);
    assert_eq!(by_name.body["username"], "frank");
    assert!(by_name.cookie.is_some());

    let by_email = app.login_raw("frank@example.com", USER_PASSWORD).await;
    assert_eq!(by_email.status, StatusCode::OK);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthenticated() {
    let app = TestApp::spawn().await;
    app.seed_user("grace", Role::User).await;

    let response = app.login_raw("grace", "wrong-password").await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "unauthenticated");

    let unknown = app.login_raw("nobody", USER_PASSWORD).await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_identifies_the_caller_until_logout() {
    let app = TestApp::spawn().await;
    let id = app.seed_user("heidi", Role::User).await;

    let anonymous = app.get("/api/v1/user/me", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let cookie = app.login("heidi", USER_PASSWORD).await;
    let me = app.get("/api/v1/user/me", Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["id"], id);

    let logout = app.post("/api/v1/user/logout", Some(&cookie)).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);

    let after = app.get("/api/v1/user/me", Some(&cookie)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logged_in_callers_cannot_sign_up_or_log_in_again() {
    let app = TestApp::spawn().await;
    app.seed_user("ivan", Role::User).await;
    let cookie = app.login("ivan", USER_PASSWORD).await;

    let sign_up = app
        .multipart(
            Method::POST,
            "/api/v1/sign-up",
            Some(&cookie),
            sign_up_form("judy", "judy@example.com", "password123"),
        )
        .await;
    assert_eq!(sign_up.status, StatusCode::BAD_REQUEST);

    let again = app
        .send(
            axum::http::Request::builder()
                .method(Method::POST)
                .uri("/api/v1/login")
                .header("cookie", &cookie)
                .header("x-forwarded-for", "127.0.0.1")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(
                    serde_json::json!({ "login": "ivan", "password": USER_PASSWORD }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_profiles_are_visible_to_anyone() {
    let app = TestApp::spawn().await;
    app.seed_user("mallory", Role::User).await;

    let found = app.get("/api/v1/users/mallory", None).await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body["username"], "mallory");

    let missing = app.get("/api/v1/users/nobody", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_photo_update_replaces_the_old_file() {
    let app = TestApp::spawn().await;
    app.seed_user("niaj", Role::User).await;
    let cookie = app.login("niaj", USER_PASSWORD).await;

    let first = app
        .multipart(
            Method::PATCH,
            "/api/v1/user/me/update-photo",
            Some(&cookie),
            MultipartBody::new().file("file", "one.png", b"first"),
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let first_photo = first.body["profile_photo_path"].as_str().unwrap().to_string();
    assert!(app.storage.contains(&format!("users/{}", first_photo)));

    let second = app
        .multipart(
            Method::PATCH,
            "/api/v1/user/me/update-photo",
            Some(&cookie),
            MultipartBody::new().file("file", "two.png", b"second"),
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);
    let second_photo = second.body["profile_photo_path"].as_str().unwrap();
    assert_ne!(second_photo, first_photo);
    assert!(!app.storage.contains(&format!("users/{}", first_photo)));
    assert_eq!(app.storage.len(), 1);
}

#[tokio::test]
async fn anonymous_photo_update_is_unauthenticated() {
    let app = TestApp::spawn().await;

    let empty = app
        .multipart(
            Method::PATCH,
            "/api/v1/user/me/update-photo",
            None,
            MultipartBody::new(),
        )
        .await;
    assert_eq!(empty.status, StatusCode::UNAUTHORIZED);

    let with_file = app
        .multipart(
            Method::PATCH,
            "/api/v1/user/me/update-photo",
            None,
            MultipartBody::new().file("file", "a.png", b"data"),
        )
        .await;
    assert_eq!(with_file.status, StatusCode::UNAUTHORIZED);
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn login_is_rate_limited_per_ip() {
    let mut config = exhibit_service::config::ExhibitConfig::default();
    config.rate_limit.login_attempts = 2;
    config.rate_limit.login_window_seconds = 3600;
    let app = TestApp::spawn_with(config).await;

    for _ in 0..2 {
        let response = app.login_raw("nobody", "whatever-password").await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    let limited = app.login_raw("nobody", "whatever-password").await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
}
