use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::MySqlPool;
use tracing::{debug, error};

use super::{AttendanceStore, PermissionStore};
use crate::error::{AppError, AppResult};
use crate::model::{
    attendance::{Attendance, CheckOutUpdate, NewCheckIn},
    permission::Permission,
    role::Role,
    status::Status,
};

const ATTENDANCE_COLUMNS: &str = r#"
    id, user_id, status_id, work_date,
    clock_in, clock_in_photo, latitude_clock_in, longitude_clock_in,
    clock_out, clock_out_photo, latitude_clock_out, longitude_clock_out,
    description, is_clocked_in, is_clocked_out, created_at, updated_at
"#;

/// The day's unique key is the only conflict that means "already checked in".
fn check_in_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::conflict("Already checked in today");
        }
        if db_err.is_foreign_key_violation() {
            return AppError::not_found("User or status not found");
        }
    }
    AppError::from(e)
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn find_attendance(&self, id: u64) -> AppResult<Attendance> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
        sqlx::query_as::<_, Attendance>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)
    }
}

#[async_trait]
impl PermissionStore for MySqlStore {
    async fn find_role(&self, role_id: u64) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, Role>("SELECT id, role_name, code, is_active FROM role WHERE id = ?")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn find_permission_by_code(&self, code: &str) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, Permission>(
            "SELECT id, permission_name, code FROM permission WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn role_has_permission(&self, role_id: u64, permission_id: u64) -> AppResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM role_permission WHERE role_id = ? AND permission_id = ?",
        )
        .bind(role_id)
        .bind(permission_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn user_exists(&self, user_id: u64) -> AppResult<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM `user` WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn find_status(&self, status_id: u64) -> AppResult<Option<Status>> {
        sqlx::query_as::<_, Status>(
            "SELECT id, status_name, code, is_active FROM status WHERE id = ?",
        )
        .bind(status_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn find_for_day(&self, user_id: u64, day: NaiveDate) -> AppResult<Option<Attendance>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? AND work_date = ?"
        );
        sqlx::query_as::<_, Attendance>(&sql)
            .bind(user_id)
            .bind(day)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn insert_check_in(&self, new: &NewCheckIn) -> AppResult<Attendance> {
        // UNIQUE (user_id, work_date) decides concurrent check-ins for the same day.
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (user_id, status_id, work_date, clock_in, clock_in_photo,
                 latitude_clock_in, longitude_clock_in, description,
                 is_clocked_in, is_clocked_out, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, TRUE, FALSE, ?, ?)
            "#,
        )
        .bind(new.user_id)
        .bind(new.status_id)
        .bind(new.work_date)
        .bind(new.clock_in)
        .bind(&new.photo)
        .bind(new.location.latitude)
        .bind(new.location.longitude)
        .bind(&new.description)
        .bind(new.clock_in)
        .bind(new.clock_in)
        .execute(&self.pool)
        .await
        .map_err(check_in_error)?;

        debug!(id = result.last_insert_id(), user_id = new.user_id, "Attendance row inserted");
        self.find_attendance(result.last_insert_id()).await
    }

    async fn close_open_session(
        &self,
        user_id: u64,
        day: NaiveDate,
        update: &CheckOutUpdate,
    ) -> AppResult<Option<Attendance>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET clock_out = GREATEST(?, clock_in),
                clock_out_photo = ?,
                latitude_clock_out = ?,
                longitude_clock_out = ?,
                description = COALESCE(?, description),
                status_id = COALESCE(?, status_id),
                is_clocked_out = TRUE,
                updated_at = ?
            WHERE user_id = ?
              AND work_date = ?
              AND is_clocked_in = TRUE
              AND is_clocked_out = FALSE
            "#,
        )
        .bind(update.clock_out)
        .bind(&update.photo)
        .bind(update.location.latitude)
        .bind(update.location.longitude)
        .bind(&update.description)
        .bind(update.status_id)
        .bind(update.clock_out)
        .bind(user_id)
        .bind(day)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? AND work_date = ?"
        );
        let closed = sqlx::query_as::<_, Attendance>(&sql)
            .bind(user_id)
            .bind(day)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await.map_err(|e| {
            error!(error = %e, user_id, "Failed to commit check-out");
            AppError::from(e)
        })?;

        Ok(Some(closed))
    }

    async fn list_for_user(
        &self,
        user_id: u64,
        limit: u32,
        offset: u32,
    ) -> AppResult<(Vec<Attendance>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? \
             ORDER BY work_date DESC, id DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, Attendance>(&sql)
            .bind(user_id)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, error::Error as StdError, fmt};

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct KeyViolation {
        unique: bool,
    }

    impl fmt::Display for KeyViolation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message())
        }
    }

    impl StdError for KeyViolation {}

    impl DatabaseError for KeyViolation {
        fn message(&self) -> &str {
            if self.unique { "Duplicate entry" } else { "Cannot add or update a child row" }
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23000"))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.unique { ErrorKind::UniqueViolation } else { ErrorKind::ForeignKeyViolation }
        }
    }

    #[test]
    fn duplicate_day_is_already_checked_in() {
        let err = check_in_error(sqlx::Error::Database(Box::new(KeyViolation { unique: true })));
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Already checked in today"));
    }

    #[test]
    fn missing_reference_is_not_relabelled_as_duplicate() {
        let err = check_in_error(sqlx::Error::Database(Box::new(KeyViolation { unique: false })));
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn other_failures_stay_store_unavailable() {
        assert!(matches!(
            check_in_error(sqlx::Error::PoolTimedOut),
            AppError::StoreUnavailable(_)
        ));
    }
}
