use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    middleware::{Logger, NormalizePath},
    web::{Data, JsonConfig},
};
use anyhow::Context;
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

use crate::config::Config;
use crate::db::{ensure_admin, init_db, run_migrations};
use crate::error::json_error_handler;
use crate::service::{AccessControl, AttendanceService, clock::SystemClock};
use crate::store::MySqlStore;
use crate::utils::identity::IdentityIndex;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log plus stdout
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,actix_web=info")),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false),
        )
        .with(fmt::layer().with_target(false))
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config).await.context("failed to connect to MySQL")?;
    run_migrations(&pool).await.context("failed to run migrations")?;
    ensure_admin(&pool, config.admin.as_ref()).await?;

    let store = Arc::new(MySqlStore::new(pool.clone()));
    let access = Data::new(AccessControl::new(store.clone()));
    let attendance = Data::new(AttendanceService::new(store, Arc::new(SystemClock)));
    let identity = Data::new(IdentityIndex::default());

    let filter_index = identity.clone();
    let filter_pool = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = filter_index.warmup_filter(&filter_pool, 1_000).await {
            error!(error = ?e, "Failed to warm up identity filter");
        }
    });

    let cache_index = identity.clone();
    let cache_pool = pool.clone();
    actix_web::rt::spawn(async move {
        // users seen in the last 30 days
        if let Err(e) = cache_index.warmup_cache(&cache_pool, 30, 250).await {
            error!(error = ?e, "Failed to warm up identity cache");
        }
    });

    let server_addr = config.server_addr.clone();
    let openapi = docs::openapi_for(&config.api_prefix);
    let pool = Data::new(pool);
    let config = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi.clone()),
            )
            .app_data(JsonConfig::default().error_handler(json_error_handler))
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(access.clone())
            .app_data(attendance.clone())
            .app_data(identity.clone())
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
