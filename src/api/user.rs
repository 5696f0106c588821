use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidateEmail};

use crate::{
    api::{created, message, ok},
    auth::{auth::AuthUser, password::hash_password},
    error::{AppError, AppResult},
    model::user::UserDetail,
    service::{AccessControl, access::codes},
    utils::{
        identity::{IdentityIndex, IdentityKind, normalize},
        pagination::{Page, PageQuery},
        validation::validate_username,
    },
};

const USER_DETAIL_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.role_id, r.role_name, u.is_active
    FROM `user` u
    JOIN role r ON r.id = u.role_id
"#;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(custom(function = "validate_username"))]
    #[schema(example = "budi_santoso")]
    pub username: String,
    #[validate(email)]
    #[schema(example = "budi@company.com", format = "email")]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    #[schema(example = "s3cret-pass")]
    pub password: String,
    #[schema(example = 2)]
    pub role_id: u64,
    #[schema(example = true, nullable = true)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(custom(function = "validate_username"))]
    #[schema(nullable = true)]
    pub username: Option<String>,
    #[validate(email)]
    #[schema(format = "email", nullable = true)]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128))]
    #[schema(nullable = true)]
    pub password: Option<String>,
    #[schema(nullable = true)]
    pub role_id: Option<u64>,
    #[schema(nullable = true)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckUsername {
    #[schema(example = "budi_santoso")]
    pub username: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckEmail {
    #[schema(example = "budi@company.com")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Availability {
    #[schema(example = "budi_santoso")]
    pub value: String,
    pub available: bool,
}

pub(crate) async fn fetch_user_detail(pool: &MySqlPool, user_id: u64) -> AppResult<UserDetail> {
    let sql = format!("{USER_DETAIL_SELECT} WHERE u.id = ?");
    sqlx::query_as::<_, UserDetail>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

async fn ensure_role_exists(pool: &MySqlPool, role_id: u64) -> AppResult<()> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM role WHERE id = ?")
        .bind(role_id)
        .fetch_one(pool)
        .await?;

    if count == 0 {
        return Err(AppError::not_found("Role not found"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/user",
    params(PageQuery),
    responses(
        (status = 200, description = "Users with their role names", body = Object),
        (status = 403, description = "Missing VIEW_USER")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn list_users(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_USER).await?;
    let (_, per_page, offset) = query.resolve();

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM `user`")
        .fetch_one(pool.get_ref())
        .await?;

    let sql = format!("{USER_DETAIL_SELECT} ORDER BY u.id LIMIT ? OFFSET ?");
    let users = sqlx::query_as::<_, UserDetail>(&sql)
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Page::new(users, &query, total)))
}

#[utoipa::path(
    get,
    path = "/api/user/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserDetail),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn get_user(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_USER).await?;
    let user = fetch_user_detail(pool.get_ref(), path.into_inner()).await?;
    Ok(ok(user))
}

#[utoipa::path(
    post,
    path = "/api/user",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserDetail),
        (status = 400, description = "Invalid username, e-mail or password"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Username or e-mail already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
#[instrument(name = "user_create", skip_all, fields(username = %payload.username))]
pub async fn create_user(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    index: web::Data<IdentityIndex>,
    payload: web::Json<CreateUser>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_USER).await?;
    payload.validate()?;

    let username = normalize(&payload.username);
    let email = normalize(&payload.email);

    if !index.is_available(IdentityKind::Username, &username, pool.get_ref()).await? {
        return Err(AppError::conflict("Username already taken"));
    }
    if !index.is_available(IdentityKind::Email, &email, pool.get_ref()).await? {
        return Err(AppError::conflict("Email already registered"));
    }
    ensure_role_exists(pool.get_ref(), payload.role_id).await?;

    let hashed = hash_password(&payload.password)?;

    // The unique keys still decide a race between two creates.
    let result = sqlx::query(
        r#"
        INSERT INTO `user` (username, email, password, role_id, is_active)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&username)
    .bind(&email)
    .bind(&hashed)
    .bind(payload.role_id)
    .bind(payload.is_active.unwrap_or(true))
    .execute(pool.get_ref())
    .await?;

    index.record(IdentityKind::Username, &username).await;
    index.record(IdentityKind::Email, &email).await;

    let user = fetch_user_detail(pool.get_ref(), result.last_insert_id()).await?;
    info!(user_id = user.id, "User created");
    Ok(created(user))
}

#[utoipa::path(
    put,
    path = "/api/user/{id}",
    params(("id" = u64, Path, description = "User id")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = UserDetail),
        (status = 404, description = "User or role not found"),
        (status = 409, description = "Username or e-mail already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
#[instrument(name = "user_update", skip_all)]
pub async fn update_user(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    index: web::Data<IdentityIndex>,
    path: web::Path<u64>,
    payload: web::Json<UpdateUser>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_USER).await?;
    payload.validate()?;

    let user_id = path.into_inner();
    let current = fetch_user_detail(pool.get_ref(), user_id).await?;

    let username = payload.username.as_deref().map(normalize);
    let email = payload.email.as_deref().map(normalize);

    if let Some(username) = &username {
        if !index
            .is_available_except(IdentityKind::Username, username, user_id, pool.get_ref())
            .await?
        {
            return Err(AppError::conflict("Username already taken"));
        }
    }
    if let Some(email) = &email {
        if !index
            .is_available_except(IdentityKind::Email, email, user_id, pool.get_ref())
            .await?
        {
            return Err(AppError::conflict("Email already registered"));
        }
    }
    if let Some(role_id) = payload.role_id {
        ensure_role_exists(pool.get_ref(), role_id).await?;
    }

    let hashed = payload.password.as_deref().map(hash_password).transpose()?;

    sqlx::query(
        r#"
        UPDATE `user`
        SET username = COALESCE(?, username),
            email = COALESCE(?, email),
            password = COALESCE(?, password),
            role_id = COALESCE(?, role_id),
            is_active = COALESCE(?, is_active)
        WHERE id = ?
        "#,
    )
    .bind(&username)
    .bind(&email)
    .bind(&hashed)
    .bind(payload.role_id)
    .bind(payload.is_active)
    .bind(user_id)
    .execute(pool.get_ref())
    .await?;

    if let Some(username) = username.filter(|u| *u != normalize(&current.username)) {
        index.forget(IdentityKind::Username, &current.username).await;
        index.record(IdentityKind::Username, &username).await;
    }
    if let Some(email) = email.filter(|e| *e != normalize(&current.email)) {
        index.forget(IdentityKind::Email, &current.email).await;
        index.record(IdentityKind::Email, &email).await;
    }

    let user = fetch_user_detail(pool.get_ref(), user_id).await?;
    info!(user_id, "User updated");
    Ok(ok(user))
}

/// Only inactive users without employee or attendance rows can be removed.
#[utoipa::path(
    delete,
    path = "/api/user/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User is active or still referenced")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
#[instrument(name = "user_delete", skip_all)]
pub async fn delete_user(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    index: web::Data<IdentityIndex>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_USER).await?;

    let user_id = path.into_inner();
    let user = fetch_user_detail(pool.get_ref(), user_id).await?;
    if user.is_active {
        return Err(AppError::conflict("Deactivate the user before deleting it"));
    }

    let (employees, attendance) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM employee WHERE user_id = ?),
            (SELECT COUNT(*) FROM attendance WHERE user_id = ?)
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_one(pool.get_ref())
    .await?;

    if employees > 0 || attendance > 0 {
        return Err(AppError::conflict(
            "User still has an employee profile or attendance records",
        ));
    }

    sqlx::query("DELETE FROM `user` WHERE id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    index.forget(IdentityKind::Username, &user.username).await;
    index.forget(IdentityKind::Email, &user.email).await;

    info!(user_id, "User deleted");
    Ok(message("User deleted"))
}

#[utoipa::path(
    post,
    path = "/api/user/check-username",
    request_body = CheckUsername,
    responses((status = 200, description = "Availability of the username", body = Availability)),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn check_username(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    index: web::Data<IdentityIndex>,
    payload: web::Json<CheckUsername>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_USER).await?;

    let username = normalize(&payload.username);
    validate_username(&username).map_err(|e| {
        AppError::invalid(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Invalid username".to_string()),
        )
    })?;

    let available = index
        .is_available(IdentityKind::Username, &username, pool.get_ref())
        .await?;
    Ok(ok(Availability {
        value: username,
        available,
    }))
}

#[utoipa::path(
    post,
    path = "/api/user/check-email",
    request_body = CheckEmail,
    responses((status = 200, description = "Availability of the e-mail", body = Availability)),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn check_email(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    index: web::Data<IdentityIndex>,
    payload: web::Json<CheckEmail>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_USER).await?;

    let email = normalize(&payload.email);
    if !email.validate_email() {
        return Err(AppError::invalid("Invalid e-mail address"));
    }

    let available = index
        .is_available(IdentityKind::Email, &email, pool.get_ref())
        .await?;
    Ok(ok(Availability {
        value: email,
        available,
    }))
}
