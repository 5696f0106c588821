use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    api::{created, message, ok, position::find_position},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::employee::Employee,
    service::{AccessControl, access::codes},
    utils::pagination::{Page, PageQuery},
};

const EMPLOYEE_COLUMNS: &str = r#"
    id, user_id, full_name, phone, position_id, division_id, is_active, created_at, updated_at
"#;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = 7)]
    pub user_id: u64,
    #[validate(length(min = 1, max = 150))]
    #[schema(example = "Budi Santoso")]
    pub full_name: String,
    #[validate(length(max = 30))]
    #[schema(example = "+628123456789", nullable = true)]
    pub phone: Option<String>,
    #[schema(example = 3)]
    pub position_id: u64,
    #[schema(example = 1)]
    pub division_id: u64,
    #[schema(example = true, nullable = true)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateEmployee {
    #[validate(length(min = 1, max = 150))]
    #[schema(nullable = true)]
    pub full_name: Option<String>,
    /// An empty string clears the stored number.
    #[validate(length(max = 30))]
    #[schema(nullable = true)]
    pub phone: Option<String>,
    #[schema(nullable = true)]
    pub position_id: Option<u64>,
    #[schema(nullable = true)]
    pub division_id: Option<u64>,
    #[schema(nullable = true)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeFilter {
    pub division_id: Option<u64>,
    pub position_id: Option<u64>,
    /// Substring match on the full name
    pub search: Option<String>,
}

async fn find_employee(pool: &MySqlPool, id: u64) -> AppResult<Employee> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employee WHERE id = ?");
    sqlx::query_as::<_, Employee>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))
}

/// `None` keeps the stored phone; `Some(None)` clears it.
fn phone_change(phone: Option<&str>) -> Option<Option<String>> {
    phone.map(|p| Some(p.trim()).filter(|p| !p.is_empty()).map(str::to_string))
}

/// The position must exist and belong to `division_id`.
async fn ensure_placement(pool: &MySqlPool, position_id: u64, division_id: u64) -> AppResult<()> {
    let position = find_position(pool, position_id).await?;
    if position.division_id != division_id {
        return Err(AppError::invalid(format!(
            "Position {position_id} does not belong to division {division_id}"
        )));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(PageQuery, EmployeeFilter),
    responses((status = 200, description = "Paginated employees", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_employees(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    query: web::Query<PageQuery>,
    filter: web::Query<EmployeeFilter>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_EMPLOYEE).await?;
    let (_, per_page, offset) = query.resolve();

    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    const WHERE: &str = r#"
        WHERE (? IS NULL OR division_id = ?)
          AND (? IS NULL OR position_id = ?)
          AND (? IS NULL OR full_name LIKE ?)
    "#;

    debug!(?filter, "Listing employees");

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM employee {WHERE}"))
        .bind(filter.division_id)
        .bind(filter.division_id)
        .bind(filter.position_id)
        .bind(filter.position_id)
        .bind(&search)
        .bind(&search)
        .fetch_one(pool.get_ref())
        .await?;

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employee {WHERE} ORDER BY id LIMIT ? OFFSET ?");
    let employees = sqlx::query_as::<_, Employee>(&sql)
        .bind(filter.division_id)
        .bind(filter.division_id)
        .bind(filter.position_id)
        .bind(filter.position_id)
        .bind(&search)
        .bind(&search)
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Page::new(employees, &query, total)))
}

#[utoipa::path(
    get,
    path = "/api/employee/{id}",
    params(("id" = u64, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee", body = Employee),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_employee(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_EMPLOYEE).await?;
    Ok(ok(find_employee(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Position is not part of the division"),
        (status = 404, description = "User or position not found"),
        (status = 409, description = "User already has an employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
#[instrument(name = "employee_create", skip_all, fields(user_id = payload.user_id))]
pub async fn create_employee(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_EMPLOYEE).await?;
    payload.validate()?;

    let (users, profiles) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM `user` WHERE id = ?),
            (SELECT COUNT(*) FROM employee WHERE user_id = ?)
        "#,
    )
    .bind(payload.user_id)
    .bind(payload.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    if users == 0 {
        return Err(AppError::not_found("User not found"));
    }
    if profiles > 0 {
        return Err(AppError::conflict("User already has an employee profile"));
    }
    ensure_placement(pool.get_ref(), payload.position_id, payload.division_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO employee (user_id, full_name, phone, position_id, division_id, is_active)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.user_id)
    .bind(payload.full_name.trim())
    .bind(phone_change(payload.phone.as_deref()).flatten())
    .bind(payload.position_id)
    .bind(payload.division_id)
    .bind(payload.is_active.unwrap_or(true))
    .execute(pool.get_ref())
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::conflict("User already has an employee profile"),
        other => other,
    })?;

    let employee = find_employee(pool.get_ref(), result.last_insert_id()).await?;
    info!(employee_id = employee.id, "Employee created");
    Ok(created(employee))
}

#[utoipa::path(
    put,
    path = "/api/employee/{id}",
    params(("id" = u64, Path, description = "Employee id")),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Position is not part of the division"),
        (status = 404, description = "Employee or position not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
#[instrument(name = "employee_update", skip_all)]
pub async fn update_employee(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateEmployee>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_EMPLOYEE).await?;
    payload.validate()?;

    let id = path.into_inner();
    let current = find_employee(pool.get_ref(), id).await?;
    let phone = phone_change(payload.phone.as_deref());

    let position_id = payload.position_id.unwrap_or(current.position_id);
    let division_id = payload.division_id.unwrap_or(current.division_id);
    if payload.position_id.is_some() || payload.division_id.is_some() {
        ensure_placement(pool.get_ref(), position_id, division_id).await?;
    }

    sqlx::query(
        r#"
        UPDATE employee
        SET full_name = COALESCE(?, full_name),
            phone = IF(?, ?, phone),
            position_id = ?,
            division_id = ?,
            is_active = COALESCE(?, is_active)
        WHERE id = ?
        "#,
    )
    .bind(payload.full_name.as_deref().map(str::trim))
    .bind(phone.is_some())
    .bind(phone.flatten())
    .bind(position_id)
    .bind(division_id)
    .bind(payload.is_active)
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    info!(employee_id = id, "Employee updated");
    Ok(ok(find_employee(pool.get_ref(), id).await?))
}

/// Only allowed once the linked user is inactive and has no attendance rows.
#[utoipa::path(
    delete,
    path = "/api/employee/{id}",
    params(("id" = u64, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee deleted"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "User still active or has attendance records")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
#[instrument(name = "employee_delete", skip_all)]
pub async fn delete_employee(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::MANAGE_EMPLOYEE).await?;

    let id = path.into_inner();
    let employee = find_employee(pool.get_ref(), id).await?;

    let (user_active, attendance) = sqlx::query_as::<_, (bool, i64)>(
        r#"
        SELECT
            u.is_active,
            (SELECT COUNT(*) FROM attendance a WHERE a.user_id = u.id)
        FROM `user` u
        WHERE u.id = ?
        "#,
    )
    .bind(employee.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .unwrap_or((false, 0));

    if user_active {
        return Err(AppError::conflict("Deactivate the user before deleting the employee"));
    }
    if attendance > 0 {
        return Err(AppError::conflict("Employee's user still has attendance records"));
    }

    sqlx::query("DELETE FROM employee WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(employee_id = id, "Employee deleted");
    Ok(message("Employee deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_phone_keeps_the_stored_number() {
        assert_eq!(phone_change(None), None);
    }

    #[test]
    fn blank_phone_clears_the_stored_number() {
        assert_eq!(phone_change(Some("")), Some(None));
        assert_eq!(phone_change(Some("   ")), Some(None));
    }

    #[test]
    fn new_phone_is_trimmed() {
        assert_eq!(
            phone_change(Some(" +628123456789 ")),
            Some(Some("+628123456789".to_string()))
        );
    }
}
