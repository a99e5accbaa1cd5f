use crate::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Read-only HTTP surface over the snapshot and differential tables.
pub struct ApiServer {
    pool: PgPool,
}

impl ApiServer {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds the router with all API routes.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(handlers::root))
            .route("/api/health", get(handlers::health))
            .route("/diffs", get(handlers::diffs))
            .route("/diffsFutures", get(handlers::diffs_futures))
            .route("/pairs", get(handlers::pairs))
            .route("/pairsFutures", get(handlers::pairs_futures))
            .route("/recreateTables", post(handlers::recreate_tables))
            .with_state(self.pool.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve
    /// requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("API server listening on {addr}");

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
