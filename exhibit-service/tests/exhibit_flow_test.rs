mod common;

use axum::http::{Method, StatusCode};
use common::{MultipartBody, TestApp, USER_PASSWORD};
use exhibit_service::models::Role;

#[tokio::test]
async fn exhibit_types_are_public() {
    let app = TestApp::spawn().await;

    let response = app.get("/api/v1/exhibit/types", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let names: Vec<&str> = response
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Photo", "Video", "Audio", "Text"]);
}

#[tokio::test]
async fn submitted_exhibit_is_pending_and_hidden_from_the_public() {
    let app = TestApp::spawn().await;
    app.seed_user("alice", Role::User).await;
    app.seed_user("bob", Role::User).await;
    let alice = app.login("alice", USER_PASSWORD).await;
    let bob = app.login("bob", USER_PASSWORD).await;

    let id = app.submit_exhibit(&alice, "Sunset").await;
    let uri = format!("/api/v1/exhibit/{}", id);

    let own = app.get(&uri, Some(&alice)).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["status"], "Pending");
    assert_eq!(own.body["type"]["name"], "Photo");
    assert_eq!(own.body["author"]["username"], "alice");

    assert_eq!(app.get(&uri, None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, Some(&bob)).await.status, StatusCode::NOT_FOUND);

    let listing = app.get("/api/v1/exhibit", None).await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.body["total"], 0);

    let mine = app.get("/api/v1/user/exhibit/my", Some(&alice)).await;
    assert_eq!(mine.body["total"], 1);
}

#[tokio::test]
async fn approval_publishes_and_rejection_hides() {
    let app = TestApp::spawn().await;
    app.seed_user("carol", Role::User).await;
    let carol = app.login("carol", USER_PASSWORD).await;
    let admin = app.login_admin().await;

    let id = app.submit_exhibit(&carol, "Harbour").await;
    let uri = format!("/api/v1/exhibit/{}", id);

    let approved = app
        .post(&format!("/api/v1/admin/exhibit/approve/{}", id), Some(&admin))
        .await;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.body["status"], "Approved");

    let public = app.get(&uri, None).await;
    assert_eq!(public.status, StatusCode::OK);
    let listing = app.get("/api/v1/exhibit", None).await;
    assert_eq!(listing.body["total"], 1);
    assert_eq!(listing.body["exhibits"][0]["id"], id);

    let rejected = app
        .post(&format!("/api/v1/admin/exhibit/reject/{}", id), Some(&admin))
        .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert_eq!(rejected.body["status"], "Rejected");
    assert_eq!(app.get(&uri, None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_admins_moderate() {
    let app = TestApp::spawn().await;
    app.seed_user("dave", Role::User).await;
    let dave = app.login("dave", USER_PASSWORD).await;
    let id = app.submit_exhibit(&dave, "Selfie").await;
    let uri = format!("/api/v1/admin/exhibit/approve/{}", id);

    assert_eq!(app.post(&uri, None).await.status, StatusCode::UNAUTHORIZED);

    let forbidden = app.post(&uri, Some(&dave)).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["code"], "forbidden");

    let admin = app.login_admin().await;
    let missing = app
        .post("/api/v1/admin/exhibit/approve/9999", Some(&admin))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_listing_filters_by_status_and_author() {
    let app = TestApp::spawn().await;
    app.seed_user("erin", Role::User).await;
    app.seed_user("frank", Role::User).await;
    let erin = app.login("erin", USER_PASSWORD).await;
    let frank = app.login("frank", USER_PASSWORD).await;
    let admin = app.login_admin().await;

    let approved = app.submit_exhibit(&erin, "One").await;
    app.submit_exhibit(&erin, "Two").await;
    app.submit_exhibit(&frank, "Three").await;
    app.post(
        &format!("/api/v1/admin/exhibit/approve/{}", approved),
        Some(&admin),
    )
    .await;

    let all = app.get("/api/v1/exhibit", Some(&admin)).await;
    assert_eq!(all.body["total"], 3);

    let pending = app.get("/api/v1/exhibit?status=pending", Some(&admin)).await;
    assert_eq!(pending.body["total"], 2);

    let by_erin = app.get("/api/v1/exhibit?username=erin", Some(&admin)).await;
    assert_eq!(by_erin.body["total"], 2);

    // Non-admins always get the approved set.
    let as_user = app.get("/api/v1/exhibit?status=pending", Some(&frank)).await;
    assert_eq!(as_user.body["total"], 1);
    assert_eq!(as_user.body["exhibits"][0]["id"], approved);

    let bad_status = app.get("/api/v1/exhibit?status=archived", Some(&admin)).await;
    assert_eq!(bad_status.status, StatusCode::BAD_REQUEST);

    let bad_range = app
        .get(
            "/api/v1/exhibit?start_date=2024-05-02&end_date=2024-05-01",
            Some(&admin),
        )
        .await;
    assert_eq!(bad_range.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submission_requires_login_and_valid_input() {
    let app = TestApp::spawn().await;
    app.seed_user("grace", Role::User).await;
    let grace = app.login("grace", USER_PASSWORD).await;

    let form = || {
        MultipartBody::new()
            .text("title", "Untitled")
            .text("type", "1")
            .text("description", "")
    };

    let anonymous = app
        .multipart(
            Method::POST,
            "/api/v1/user/exhibit/create",
            None,
            form().file("file", "a.png", b"data"),
        )
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let anonymous_without_type = app
        .multipart(
            Method::POST,
            "/api/v1/user/exhibit/create",
            None,
            MultipartBody::new()
                .text("title", "Untitled")
                .file("file", "a.png", b"data"),
        )
        .await;
    assert_eq!(anonymous_without_type.status, StatusCode::UNAUTHORIZED);

    let no_file = app
        .multipart(Method::POST, "/api/v1/user/exhibit/create", Some(&grace), form())
        .await;
    assert_eq!(no_file.status, StatusCode::BAD_REQUEST);

    let bad_type = app
        .multipart(
            Method::POST,
            "/api/v1/user/exhibit/create",
            Some(&grace),
            MultipartBody::new()
                .text("title", "Untitled")
                .text("type", "42")
                .file("file", "a.png", b"data"),
        )
        .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn only_the_author_or_an_admin_deletes() {
    let app = TestApp::spawn().await;
    app.seed_user("heidi", Role::User).await;
    app.seed_user("ivan", Role::User).await;
    let heidi = app.login("heidi", USER_PASSWORD).await;
    let ivan = app.login("ivan", USER_PASSWORD).await;
    let admin = app.login_admin().await;

    let first = app.submit_exhibit(&heidi, "First").await;
    let second = app.submit_exhibit(&heidi, "Second").await;
    assert_eq!(app.storage.len(), 2);

    let anonymous = app
        .delete(&format!("/api/v1/user/exhibit/delete/{}", first), None)
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let stranger = app
        .delete(&format!("/api/v1/user/exhibit/delete/{}", first), Some(&ivan))
        .await;
    assert_eq!(stranger.status, StatusCode::FORBIDDEN);

    let owner = app
        .delete(&format!("/api/v1/user/exhibit/delete/{}", first), Some(&heidi))
        .await;
    assert_eq!(owner.status, StatusCode::NO_CONTENT);

    let by_admin = app
        .delete(&format!("/api/v1/user/exhibit/delete/{}", second), Some(&admin))
        .await;
    assert_eq!(by_admin.status, StatusCode::NO_CONTENT);

    assert!(app.storage.is_empty());
    let gone = app
        .get(&format!("/api/v1/exhibit/{}", first), Some(&admin))
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_ids_are_invalid_input() {
    let app = TestApp::spawn().await;

    let response = app.get("/api/v1/exhibit/abc", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let negative = app.get("/api/v1/exhibit/-3", None).await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);
}
