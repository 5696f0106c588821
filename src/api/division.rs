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
    model::division::Division,
    service::{AccessControl, access::codes},
    utils::pagination::{Page, PageQuery},
};

const DIVISION_COLUMNS: &str = "id, division_name, is_active, created_at, updated_at";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DivisionPayload {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Engineering")]
    pub division_name: String,
    #[schema(example = true, nullable = true)]
    pub is_active: Option<bool>,
}

pub(crate) async fn find_division(pool: &MySqlPool, id: u64) -> AppResult<Division> {
    let sql = format!("SELECT {DIVISION_COLUMNS} FROM division WHERE id = ?");
    sqlx::query_as::<_, Division>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Division not found"))
}

fn name_taken(e: sqlx::Error) -> AppError {
    match AppError::from(e) {
        AppError::Conflict(_) => AppError::conflict("Division name already exists"),
        other => other,
    }
}

#[utoipa::path(
    get,
    path = "/api/division",
    params(PageQuery),
    responses((status = 200, description = "Paginated divisions", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Division"
)]
pub async fn list_divisions(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_MASTER_DATA).await?;
    let (_, per_page, offset) = query.resolve();

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM division")
        .fetch_one(pool.get_ref())
        .await?;

    let sql = format!("SELECT {DIVISION_COLUMNS} FROM division ORDER BY id LIMIT ? OFFSET ?");
    let divisions = sqlx::query_as::<_, Division>(&sql)
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Page::new(divisions, &query, total)))
}

#[utoipa::path(
    get,
    path = "/api/division/{id}",
    params(("id" = u64, Path, description = "Division id")),
    responses(
        (status = 200, description = "Division", body = Division),
        (status = 404, description = "Division not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Division"
)]
pub async fn get_division(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_MASTER_DATA).await?;
    Ok(ok(find_division(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/division",
    request_body = DivisionPayload,
    responses(
        (status = 201, description = "Division created", body = Division),
        (status = 409, description = "Division name already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Division"
)]
pub async fn create_division(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    payload: web::Json<DivisionPayload>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_MASTER_DATA).await?;
    payload.validate()?;

    let result = sqlx::query("INSERT INTO division (division_name, is_active) VALUES (?, ?)")
        .bind(payload.division_name.trim())
        .bind(payload.is_active.unwrap_or(true))
        .execute(pool.get_ref())
        .await
        .map_err(name_taken)?;

    let division = find_division(pool.get_ref(), result.last_insert_id()).await?;
    info!(division_id = division.id, "Division created");
    Ok(created(division))
}

#[utoipa::path(
    put,
    path = "/api/division/{id}",
    params(("id" = u64, Path, description = "Division id")),
    request_body = DivisionPayload,
    responses(
        (status = 200, description = "Division updated", body = Division),
        (status = 404, description = "Division not found"),
        (status = 409, description = "Division name already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Division"
)]
pub async fn update_division(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DivisionPayload>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_MASTER_DATA).await?;
    payload.validate()?;

    let id = path.into_inner();
    let current = find_division(pool.get_ref(), id).await?;

    sqlx::query("UPDATE division SET division_name = ?, is_active = ? WHERE id = ?")
        .bind(payload.division_name.trim())
        .bind(payload.is_active.unwrap_or(current.is_active))
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(name_taken)?;

    info!(division_id = id, "Division updated");
    Ok(ok(find_division(pool.get_ref(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/division/{id}",
    params(("id" = u64, Path, description = "Division id")),
    responses(
        (status = 200, description = "Division deleted"),
        (status = 404, description = "Division not found"),
        (status = 409, description = "Positions or employees still reference the division")
    ),
    security(("bearer_auth" = [])),
    tag = "Division"
)]
pub async fn delete_division(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_MASTER_DATA).await?;

    let id = path.into_inner();
    find_division(pool.get_ref(), id).await?;

    let (positions, employees) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM position WHERE division_id = ?),
            (SELECT COUNT(*) FROM employee WHERE division_id = ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .fetch_one(pool.get_ref())
    .await?;

    if positions > 0 || employees > 0 {
        return Err(AppError::conflict(
            "Division still has positions or employees",
        ));
    }

    sqlx::query("DELETE FROM division WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(division_id = id, "Division deleted");
    Ok(message("Division deleted"))
}
