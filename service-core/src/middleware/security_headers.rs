use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

/// Path prefix under which user uploads are served verbatim.
pub const UPLOADED_MEDIA_PREFIX: &str = "/api/v1/storage/";

/// Hardening headers for a JSON API that also serves uploaded media.
///
/// Uploads are arbitrary user bytes, so they are additionally sandboxed: a
/// browser opening one directly gets no script execution and no same-origin
/// access.
pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let is_upload = req.uri().path().starts_with(UPLOADED_MEDIA_PREFIX);

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("no-referrer"),
    );

    let csp = if is_upload {
        "default-src 'none'; sandbox; frame-ancestors 'none'"
    } else {
        "default-src 'none'; frame-ancestors 'none'"
    };
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        header::HeaderValue::from_static(csp),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, middleware::from_fn, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/api/v1/exhibit", get(|| async { "ok" }))
            .route("/api/v1/storage/a.png", get(|| async { "png" }))
            .layer(from_fn(security_headers_middleware))
    }

    async fn csp_for(uri: &str) -> String {
        let response = app()
            .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        response.headers()[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn api_responses_get_strict_policy() {
        assert!(!csp_for("/api/v1/exhibit").await.contains("sandbox"));
    }

    #[tokio::test]
    async fn uploads_are_sandboxed() {
        assert!(csp_for("/api/v1/storage/a.png").await.contains("sandbox"));
    }
}
