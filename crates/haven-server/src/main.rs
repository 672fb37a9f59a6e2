use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use haven_api::auth::{self, AppState, AppStateInner};
use haven_api::messages;
use haven_api::middleware::require_auth;
use haven_api::realms;
use haven_onboarding::Onboarding;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "haven=debug,haven_onboarding=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("HAVEN_JWT_SECRET").unwrap_or_else(|_| {
        warn!("HAVEN_JWT_SECRET not set, using the development secret");
        "dev-secret-change-me".into()
    });
    let db_path = std::env::var("HAVEN_DB_PATH").unwrap_or_else(|_| "haven.db".into());
    let host = std::env::var("HAVEN_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HAVEN_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let onboarding = Onboarding::from_env()?;

    // Init database
    let db = haven_db::Database::open(&PathBuf::from(&db_path))?;

    // Realms created before a bot was added to the configuration get it now
    onboarding.create_if_missing_realm_internal_bots(&db)?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner { db, jwt_secret, onboarding });

    // Routes
    let public_routes = Router::new()
        .route("/realms", post(realms::create_realm))
        .route("/realms/{realm_id}/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route(
            "/direct/{user_id}",
            get(messages::get_direct_messages).post(messages::send_direct_message),
        )
        .route("/channels/{channel_id}/messages", get(messages::get_channel_messages))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Haven server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
