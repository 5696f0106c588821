use std::time::Duration;

use anyhow::Context;
use sqlx::{MySqlPool, migrate::MigrateError, mysql::MySqlPoolOptions};
use tracing::{info, warn};

use crate::auth::password::hash_password;
use crate::config::{AdminBootstrap, Config};
use crate::utils::identity::normalize;

pub async fn init_db(config: &Config) -> Result<MySqlPool, sqlx::Error> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;

    info!(max_connections = config.db_max_connections, "Database pool ready");
    Ok(pool)
}

pub async fn run_migrations(pool: &MySqlPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Migrations applied");
    Ok(())
}

/// Creates the configured administrator unless an active ADMIN user already exists.
/// Returns whether a user was inserted.
pub async fn ensure_admin(pool: &MySqlPool, admin: Option<&AdminBootstrap>) -> anyhow::Result<bool> {
    let admins = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM `user` u
        JOIN role r ON r.id = u.role_id
        WHERE r.code = 'ADMIN' AND u.is_active = TRUE
        "#,
    )
    .fetch_one(pool)
    .await
    .context("failed to count administrators")?;

    if admins > 0 {
        return Ok(false);
    }
    let Some(admin) = admin else {
        warn!("No active administrator; set ADMIN_EMAIL and ADMIN_PASSWORD to create one");
        return Ok(false);
    };

    let hashed = hash_password(&admin.password).context("failed to hash ADMIN_PASSWORD")?;
    sqlx::query(
        r#"
        INSERT INTO `user` (username, email, password, role_id, is_active)
        SELECT ?, ?, ?, r.id, TRUE
        FROM role r
        WHERE r.code = 'ADMIN'
        "#,
    )
    .bind(normalize(&admin.username))
    .bind(normalize(&admin.email))
    .bind(&hashed)
    .execute(pool)
    .await
    .context("failed to create the initial administrator")?;

    info!(email = %admin.email, "Initial administrator created");
    Ok(true)
}
