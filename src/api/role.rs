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
    model::{
        permission::{Permission, RolePermission},
        role::Role,
    },
    service::{AccessControl, access::codes},
    utils::validation::validate_code,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRole {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Supervisor")]
    pub role_name: String,
    #[validate(custom(function = "validate_code"))]
    #[schema(example = "SUPERVISOR")]
    pub code: String,
    #[schema(example = true, nullable = true)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPermission {
    #[schema(example = 3)]
    pub permission_id: u64,
}

async fn find_role(pool: &MySqlPool, role_id: u64) -> AppResult<Role> {
    sqlx::query_as::<_, Role>("SELECT id, role_name, code, is_active FROM role WHERE id = ?")
        .bind(role_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Role not found"))
}

#[utoipa::path(
    get,
    path = "/api/role",
    responses((status = 200, description = "All roles", body = [Role])),
    security(("bearer_auth" = [])),
    tag = "Role"
)]
pub async fn list_roles(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_ROLE).await?;

    let roles =
        sqlx::query_as::<_, Role>("SELECT id, role_name, code, is_active FROM role ORDER BY id")
            .fetch_all(pool.get_ref())
            .await?;
    Ok(ok(roles))
}

#[utoipa::path(
    post,
    path = "/api/role",
    request_body = CreateRole,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 409, description = "Role name or code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Role"
)]
pub async fn create_role(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateRole>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_ROLE).await?;
    payload.validate()?;

    let result = sqlx::query("INSERT INTO role (role_name, code, is_active) VALUES (?, ?, ?)")
        .bind(payload.role_name.trim())
        .bind(&payload.code)
        .bind(payload.is_active.unwrap_or(true))
        .execute(pool.get_ref())
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::conflict("Role name or code already exists"),
            other => other,
        })?;

    let role = find_role(pool.get_ref(), result.last_insert_id()).await?;
    info!(role_id = role.id, code = %role.code, "Role created");
    Ok(created(role))
}

#[utoipa::path(
    get,
    path = "/api/role/{id}/permissions",
    params(("id" = u64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Permissions granted to the role", body = [Permission]),
        (status = 404, description = "Role not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Role"
)]
pub async fn role_permissions(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_ROLE).await?;
    let role = find_role(pool.get_ref(), path.into_inner()).await?;

    let permissions = sqlx::query_as::<_, Permission>(
        r#"
        SELECT p.id, p.permission_name, p.code
        FROM permission p
        JOIN role_permission rp ON rp.permission_id = p.id
        WHERE rp.role_id = ?
        ORDER BY p.code
        "#,
    )
    .bind(role.id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(ok(permissions))
}

#[utoipa::path(
    post,
    path = "/api/role/{id}/permissions",
    params(("id" = u64, Path, description = "Role id")),
    request_body = AssignPermission,
    responses(
        (status = 201, description = "Permission granted", body = RolePermission),
        (status = 404, description = "Role or permission not found"),
        (status = 409, description = "Permission already assigned")
    ),
    security(("bearer_auth" = [])),
    tag = "Role"
)]
pub async fn assign_permission(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AssignPermission>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_ROLE).await?;
    let role = find_role(pool.get_ref(), path.into_inner()).await?;

    let permission_exists =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM permission WHERE id = ?")
            .bind(payload.permission_id)
            .fetch_one(pool.get_ref())
            .await?;
    if permission_exists == 0 {
        return Err(AppError::not_found("Permission not found"));
    }

    sqlx::query("INSERT INTO role_permission (role_id, permission_id) VALUES (?, ?)")
        .bind(role.id)
        .bind(payload.permission_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::conflict("Permission already assigned to role"),
            other => other,
        })?;

    info!(role_id = role.id, permission_id = payload.permission_id, "Permission granted");
    Ok(created(RolePermission {
        role_id: role.id,
        permission_id: payload.permission_id,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/role/{id}/permissions/{permission_id}",
    params(
        ("id" = u64, Path, description = "Role id"),
        ("permission_id" = u64, Path, description = "Permission id")
    ),
    responses(
        (status = 200, description = "Permission revoked"),
        (status = 404, description = "Role does not hold the permission")
    ),
    security(("bearer_auth" = [])),
    tag = "Role"
)]
pub async fn remove_permission(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_ROLE).await?;
    let (role_id, permission_id) = path.into_inner();

    let result =
        sqlx::query("DELETE FROM role_permission WHERE role_id = ? AND permission_id = ?")
            .bind(role_id)
            .bind(permission_id)
            .execute(pool.get_ref())
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Role does not hold this permission"));
    }

    info!(role_id, permission_id, "Permission revoked");
    Ok(message("Permission removed from role"))
}
