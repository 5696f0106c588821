use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    api::{created, message, ok},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::status::Status,
    service::{AccessControl, access::codes},
    utils::validation::validate_code,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StatusPayload {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Business trip")]
    pub status_name: String,
    #[validate(custom(function = "validate_code"))]
    #[schema(example = "TRIP")]
    pub code: String,
    #[schema(example = true, nullable = true)]
    pub is_active: Option<bool>,
}

async fn find_status(pool: &MySqlPool, id: u64) -> AppResult<Status> {
    sqlx::query_as::<_, Status>("SELECT id, status_name, code, is_active FROM status WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Status not found"))
}

/// Name and code must be unique across every row except `exclude_id`.
async fn ensure_unique(pool: &MySqlPool, payload: &StatusPayload, exclude_id: u64) -> AppResult<()> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM status WHERE (status_name = ? OR code = ?) AND id <> ?",
    )
    .bind(payload.status_name.trim())
    .bind(&payload.code)
    .bind(exclude_id)
    .fetch_one(pool)
    .await?;

    if count > 0 {
        return Err(AppError::conflict("Status name or code already exists"));
    }
    Ok(())
}

fn name_or_code_taken(e: sqlx::Error) -> AppError {
    match AppError::from(e) {
        AppError::Conflict(_) => AppError::conflict("Status name or code already exists"),
        other => other,
    }
}

#[utoipa::path(
    get,
    path = "/api/status",
    responses((status = 200, description = "All attendance statuses", body = [Status])),
    security(("bearer_auth" = [])),
    tag = "Status"
)]
pub async fn list_statuses(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_MASTER_DATA).await?;

    let statuses = sqlx::query_as::<_, Status>(
        "SELECT id, status_name, code, is_active FROM status ORDER BY id",
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(ok(statuses))
}

#[utoipa::path(
    get,
    path = "/api/status/{id}",
    params(("id" = u64, Path, description = "Status id")),
    responses(
        (status = 200, description = "Status", body = Status),
        (status = 404, description = "Status not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Status"
)]
pub async fn get_status(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_MASTER_DATA).await?;
    Ok(ok(find_status(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/status",
    request_body = StatusPayload,
    responses(
        (status = 201, description = "Status created", body = Status),
        (status = 409, description = "Status name or code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Status"
)]
pub async fn create_status(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    payload: web::Json<StatusPayload>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_MASTER_DATA).await?;
    payload.validate()?;
    ensure_unique(pool.get_ref(), &payload, 0).await?;

    let result = sqlx::query("INSERT INTO status (status_name, code, is_active) VALUES (?, ?, ?)")
        .bind(payload.status_name.trim())
        .bind(&payload.code)
        .bind(payload.is_active.unwrap_or(true))
        .execute(pool.get_ref())
        .await
        .map_err(name_or_code_taken)?;

    let status = find_status(pool.get_ref(), result.last_insert_id()).await?;
    info!(status_id = status.id, code = %status.code, "Status created");
    Ok(created(status))
}

#[utoipa::path(
    put,
    path = "/api/status/{id}",
    params(("id" = u64, Path, description = "Status id")),
    request_body = StatusPayload,
    responses(
        (status = 200, description = "Status updated", body = Status),
        (status = 404, description = "Status not found"),
        (status = 409, description = "Name or code used by another status")
    ),
    security(("bearer_auth" = [])),
    tag = "Status"
)]
pub async fn update_status(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<StatusPayload>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_MASTER_DATA).await?;
    payload.validate()?;

    let id = path.into_inner();
    let current = find_status(pool.get_ref(), id).await?;
    ensure_unique(pool.get_ref(), &payload, id).await?;

    sqlx::query("UPDATE status SET status_name = ?, code = ?, is_active = ? WHERE id = ?")
        .bind(payload.status_name.trim())
        .bind(&payload.code)
        .bind(payload.is_active.unwrap_or(current.is_active))
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(name_or_code_taken)?;

    info!(status_id = id, "Status updated");
    Ok(ok(find_status(pool.get_ref(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/status/{id}",
    params(("id" = u64, Path, description = "Status id")),
    responses(
        (status = 200, description = "Status deleted"),
        (status = 404, description = "Status not found"),
        (status = 409, description = "Status is used by attendance records")
    ),
    security(("bearer_auth" = [])),
    tag = "Status"
)]
pub async fn delete_status(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_MASTER_DATA).await?;

    let id = path.into_inner();
    find_status(pool.get_ref(), id).await?;

    let in_use = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance WHERE status_id = ?")
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;
    if in_use > 0 {
        return Err(AppError::conflict(
            "Status is used by attendance records; deactivate it instead",
        ));
    }

    sqlx::query("DELETE FROM status WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(status_id = id, "Status deleted");
    Ok(message("Status deleted"))
}
