use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use dotenvy::dotenv;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod middleware;
mod utils;

use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::queries::accommodation::AccommodationDoc;
use crate::db::queries::catalog::CatalogDoc;
use crate::db::queries::facility::FacilityBookingDoc;
use crate::db::queries::food_order::FoodOrderDoc;
use crate::db::queries::notification::NotificationDoc;
use crate::db::queries::user::UserDoc;
use crate::middleware::auth::{create_permission_cache, jwt_middleware, rbac_middleware};
use crate::utils::events::EventBus;

#[tokio::main]
async fn main() {
    dotenv().ok();
    Config::init();

    std::fs::create_dir_all("logs").expect("Failed to create logs directory");
    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_writer(non_blocking)
        .init();

    let permission_cache = create_permission_cache();
    let event_bus = EventBus::new();

    let pool = db::pool::get_db_pool().await;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let merged_doc = AuthDoc::openapi()
        .merge_from(UserDoc::openapi())
        .merge_from(CatalogDoc::openapi())
        .merge_from(AccommodationDoc::openapi())
        .merge_from(FacilityBookingDoc::openapi())
        .merge_from(FoodOrderDoc::openapi())
        .merge_from(NotificationDoc::openapi());

    let public_routes = Router::new().merge(api::auth::auth_routes());

    let private_routes = Router::new()
        .merge(api::auth::secure_auth_routes())
        .merge(api::user::user_routes())
        .merge(api::catalog::catalog_routes())
        .merge(api::accommodation::accommodation_routes())
        .merge(api::facility::facility_routes())
        .merge(api::food_order::food_order_routes())
        .merge(api::notification::notification_routes())
        .route_layer(from_fn_with_state(pool.clone(), rbac_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(permission_cache.clone()))
        .layer(Extension(event_bus.clone()))
        .with_state(pool.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    run_server(app, shutdown_tx, pool).await;
    info!("Shutdown complete.");
}

async fn shutdown_signal(mut shutdown_rx: broadcast::Receiver<()>, pool: PgPool) {
    tokio::select! {
        _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down..."),
        _ = shutdown_rx.recv() => info!("Received shutdown signal."),
    }
    info!("Closing database pool...");
    pool.close().await;
    info!("Database pool closed. Server shutting down.");
}

async fn run_server(app: Router, shutdown_tx: broadcast::Sender<()>, pool: PgPool) {
    let addr = Config::get().server_addr;
    info!("Server running at http://{addr}");

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.subscribe(), pool))
        .await
        .expect("Server encountered an error");
}
