use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    api::{created, ok},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::permission::Permission,
    service::{AccessControl, access::codes},
    utils::validation::validate_code,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePermission {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Export reports")]
    pub permission_name: String,
    /// Upper snake case; this is what handlers check against.
    #[validate(custom(function = "validate_code"))]
    #[schema(example = "EXPORT_REPORT")]
    pub code: String,
}

#[utoipa::path(
    get,
    path = "/api/permission",
    responses((status = 200, description = "All permissions", body = [Permission])),
    security(("bearer_auth" = [])),
    tag = "Role"
)]
pub async fn list_permissions(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_ROLE).await?;

    let permissions = sqlx::query_as::<_, Permission>(
        "SELECT id, permission_name, code FROM permission ORDER BY code",
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(ok(permissions))
}

#[utoipa::path(
    post,
    path = "/api/permission",
    request_body = CreatePermission,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "Code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Role"
)]
pub async fn create_permission(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePermission>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_ROLE).await?;
    payload.validate()?;

    let result = sqlx::query("INSERT INTO permission (permission_name, code) VALUES (?, ?)")
        .bind(payload.permission_name.trim())
        .bind(&payload.code)
        .execute(pool.get_ref())
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::conflict("Permission code already exists"),
            other => other,
        })?;

    let permission = sqlx::query_as::<_, Permission>(
        "SELECT id, permission_name, code FROM permission WHERE id = ?",
    )
    .bind(result.last_insert_id())
    .fetch_one(pool.get_ref())
    .await?;

    info!(permission_id = permission.id, code = %permission.code, "Permission created");
    Ok(created(permission))
}
