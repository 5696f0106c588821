use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    api::{created, division::find_division, message, ok},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::position::Position,
    service::{AccessControl, access::codes},
    utils::pagination::{Page, PageQuery},
};

const POSITION_COLUMNS: &str = "id, position_name, division_id, created_at, updated_at";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PositionPayload {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Backend Engineer")]
    pub position_name: String,
    #[schema(example = 1)]
    pub division_id: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PositionFilter {
    /// Only positions of this division
    pub division_id: Option<u64>,
}

pub(crate) async fn find_position(pool: &MySqlPool, id: u64) -> AppResult<Position> {
    let sql = format!("SELECT {POSITION_COLUMNS} FROM position WHERE id = ?");
    sqlx::query_as::<_, Position>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Position not found"))
}

/// Employees store their division next to the position, so a held position stays put.
fn ensure_movable(current: &Position, division_id: u64, holders: i64) -> AppResult<()> {
    if current.division_id != division_id && holders > 0 {
        return Err(AppError::conflict(
            "Position is still assigned to employees; reassign them before moving it to another division",
        ));
    }
    Ok(())
}

fn name_taken(e: sqlx::Error) -> AppError {
    match AppError::from(e) {
        AppError::Conflict(_) => AppError::conflict("Position already exists in this division"),
        other => other,
    }
}

#[utoipa::path(
    get,
    path = "/api/position",
    params(PageQuery, PositionFilter),
    responses((status = 200, description = "Paginated positions", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Position"
)]
pub async fn list_positions(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    query: web::Query<PageQuery>,
    filter: web::Query<PositionFilter>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_MASTER_DATA).await?;
    let (_, per_page, offset) = query.resolve();

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM position WHERE (? IS NULL OR division_id = ?)",
    )
    .bind(filter.division_id)
    .bind(filter.division_id)
    .fetch_one(pool.get_ref())
    .await?;

    let sql = format!(
        "SELECT {POSITION_COLUMNS} FROM position WHERE (? IS NULL OR division_id = ?) \
         ORDER BY id LIMIT ? OFFSET ?"
    );
    let positions = sqlx::query_as::<_, Position>(&sql)
        .bind(filter.division_id)
        .bind(filter.division_id)
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Page::new(positions, &query, total)))
}

#[utoipa::path(
    get,
    path = "/api/position/{id}",
    params(("id" = u64, Path, description = "Position id")),
    responses(
        (status = 200, description = "Position", body = Position),
        (status = 404, description = "Position not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Position"
)]
pub async fn get_position(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_MASTER_DATA).await?;
    Ok(ok(find_position(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/position",
    request_body = PositionPayload,
    responses(
        (status = 201, description = "Position created", body = Position),
        (status = 404, description = "Division not found"),
        (status = 409, description = "Position already exists in this division")
    ),
    security(("bearer_auth" = [])),
    tag = "Position"
)]
pub async fn create_position(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PositionPayload>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_MASTER_DATA).await?;
    payload.validate()?;
    find_division(pool.get_ref(), payload.division_id).await?;

    let result = sqlx::query("INSERT INTO position (position_name, division_id) VALUES (?, ?)")
        .bind(payload.position_name.trim())
        .bind(payload.division_id)
        .execute(pool.get_ref())
        .await
        .map_err(name_taken)?;

    let position = find_position(pool.get_ref(), result.last_insert_id()).await?;
    info!(position_id = position.id, division_id = position.division_id, "Position created");
    Ok(created(position))
}

#[utoipa::path(
    put,
    path = "/api/position/{id}",
    params(("id" = u64, Path, description = "Position id")),
    request_body = PositionPayload,
    responses(
        (status = 200, description = "Position updated", body = Position),
        (status = 404, description = "Position or division not found"),
        (status = 409, description = "Name taken in the division, or employees still hold the position")
    ),
    security(("bearer_auth" = [])),
    tag = "Position"
)]
pub async fn update_position(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<PositionPayload>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_MASTER_DATA).await?;
    payload.validate()?;

    let id = path.into_inner();
    find_division(pool.get_ref(), payload.division_id).await?;

    let mut tx = pool.get_ref().begin().await?;

    let sql = format!("SELECT {POSITION_COLUMNS} FROM position WHERE id = ? FOR UPDATE");
    let current = sqlx::query_as::<_, Position>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Position not found"))?;

    let holders = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employee WHERE position_id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    ensure_movable(&current, payload.division_id, holders)?;

    sqlx::query("UPDATE position SET position_name = ?, division_id = ? WHERE id = ?")
        .bind(payload.position_name.trim())
        .bind(payload.division_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(name_taken)?;

    tx.commit().await?;

    info!(position_id = id, "Position updated");
    Ok(ok(find_position(pool.get_ref(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/position/{id}",
    params(("id" = u64, Path, description = "Position id")),
    responses(
        (status = 200, description = "Position deleted"),
        (status = 404, description = "Position not found"),
        (status = 409, description = "Employees still hold the position")
    ),
    security(("bearer_auth" = [])),
    tag = "Position"
)]
pub async fn delete_position(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_MASTER_DATA).await?;

    let id = path.into_inner();
    find_position(pool.get_ref(), id).await?;

    let holders = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employee WHERE position_id = ?")
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;
    if holders > 0 {
        return Err(AppError::conflict("Position is still assigned to employees"));
    }

    sqlx::query("DELETE FROM position WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(position_id = id, "Position deleted");
    Ok(message("Position deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn position_in(division_id: u64) -> Position {
        let ts = NaiveDateTime::parse_from_str("2026-01-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Position {
            id: 5,
            position_name: "Backend Engineer".into(),
            division_id,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn held_position_cannot_change_division() {
        let err = ensure_movable(&position_in(1), 2, 1).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn vacant_position_can_move() {
        assert!(ensure_movable(&position_in(1), 2, 0).is_ok());
    }

    #[test]
    fn renaming_in_place_ignores_holders() {
        assert!(ensure_movable(&position_in(1), 1, 12).is_ok());
    }
}
