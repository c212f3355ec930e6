use crate::config::ExhibitConfig;
use crate::db;
use crate::handlers::{admin, auth, exhibits, health, users};
use crate::services::identity::{ensure_bootstrap_admin, BootstrapAdmin};
use crate::services::{
    AssetStorage, Database, LocalStorage, ModerationService, TransitionPolicy,
};
use crate::utils::password::Password;
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: ExhibitConfig,
    pub moderation: ModerationService,
    pub login_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(config: ExhibitConfig, moderation: ModerationService) -> Self {
        let login_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        Self {
            config,
            moderation,
            login_limiter,
        }
    }
}

pub fn build_router(state: AppState, session_store: MemoryStore) -> Router {
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(state.config.session.secure_cookie)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            state.config.session.lifetime_hours,
        )));

    let login = Router::new()
        .route("/login", post(auth::login))
        .route_layer(from_fn_with_state(
            state.login_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let api = Router::new()
        .route("/sign-up", post(auth::sign_up))
        .route("/exhibit", get(exhibits::list_exhibits))
        .route("/exhibit/types", get(exhibits::list_exhibit_types))
        .route("/exhibit/:id", get(exhibits::get_exhibit))
        .route("/users/:username", get(users::get_user))
        // Authenticated
        .route("/user/logout", post(auth::logout))
        .route("/user/me", get(users::me))
        .route("/user/me/update-photo", patch(users::update_photo))
        .route("/user/exhibit/create", post(exhibits::create_exhibit))
        .route("/user/exhibit/delete/:id", delete(exhibits::delete_exhibit))
        .route("/user/exhibit/my", get(exhibits::my_exhibits))
        // Admin
        .route("/admin/exhibit/approve/:id", post(admin::approve_exhibit))
        .route("/admin/exhibit/reject/:id", post(admin::reject_exhibit))
        .route("/admin/users/all", get(admin::list_users))
        .route("/admin/user-role", get(admin::list_roles))
        .route("/admin/make-admin/:id", post(admin::make_admin))
        .route("/admin/remove-admin/:id", post(admin::remove_admin))
        .route("/admin/user/delete/:id", delete(admin::delete_user))
        .merge(login)
        .nest_service(
            "/storage",
            ServeDir::new(&state.config.storage.local_path),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .nest("/api/v1", api)
        .route_layer(from_fn(metrics_middleware))
        .layer(DefaultBodyLimit::max(state.config.storage.upload_max_bytes))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::extract::Request| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

type ServerFuture = Box<dyn Future<Output = std::io::Result<()>> + Send + Unpin>;

pub struct Application {
    port: u16,
    server: ServerFuture,
    state: AppState,
}

impl Application {
    /// Connect the store, apply migrations, make sure the bootstrap
    /// administrator exists and bind the listener.
    pub async fn build(
        config: ExhibitConfig,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<Self, AppError> {
        let pool = db::create_pool(&config.database).await.map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e))
        })?;
        db::run_migrations(&pool).await.map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e))
        })?;
        let database = Arc::new(Database::new(pool, config.database.statement_timeout));

        let storage: Arc<dyn AssetStorage> = Arc::new(
            LocalStorage::new(&config.storage.local_path)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        config.storage.local_path,
                        e
                    );
                    AppError::InternalError(anyhow::anyhow!(e))
                })?,
        );

        ensure_bootstrap_admin(
            database.as_ref(),
            BootstrapAdmin {
                username: config.bootstrap.username.clone(),
                email: config.bootstrap.email.clone(),
                password: Password::new(config.bootstrap.password.clone()),
            },
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to create bootstrap administrator: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e))
        })?;

        let moderation = ModerationService::new(
            database.clone(),
            database,
            storage,
            TransitionPolicy::from_strict_flag(config.moderation.strict_transitions),
        );
        let state = AppState::new(config.clone(), moderation);
        let app = build_router(state.clone(), MemoryStore::default());

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
