//! Persistence seams for the access evaluator and the attendance state machine.
//!
//! Both components receive an `Arc<dyn _>` of these traits at construction
//! time. `MySqlStore` is the production implementation; tests use the
//! in-memory store.

pub mod mysql;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AppResult;
use crate::model::{
    attendance::{Attendance, CheckOutUpdate, NewCheckIn},
    permission::Permission,
    role::Role,
    status::Status,
};

pub use mysql::MySqlStore;

/// Read-only view of the role/permission graph.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn find_role(&self, role_id: u64) -> AppResult<Option<Role>>;
    async fn find_permission_by_code(&self, code: &str) -> AppResult<Option<Permission>>;
    async fn role_has_permission(&self, role_id: u64, permission_id: u64) -> AppResult<bool>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn user_exists(&self, user_id: u64) -> AppResult<bool>;

    async fn find_status(&self, status_id: u64) -> AppResult<Option<Status>>;

    async fn find_for_day(&self, user_id: u64, day: NaiveDate) -> AppResult<Option<Attendance>>;

    /// Inserts the row for `(user_id, work_date)`.
    ///
    /// Must fail with `AppError::Conflict` when a row for that pair already
    /// exists, decided atomically with the write.
    async fn insert_check_in(&self, new: &NewCheckIn) -> AppResult<Attendance>;

    /// Closes the open row for `(user_id, day)` in a single atomic step.
    ///
    /// Returns `Ok(None)` when no open row matched. The stored clock-out is
    /// never earlier than the row's clock-in.
    async fn close_open_session(
        &self,
        user_id: u64,
        day: NaiveDate,
        update: &CheckOutUpdate,
    ) -> AppResult<Option<Attendance>>;

    /// Newest first, with the total row count for the user.
    async fn list_for_user(
        &self,
        user_id: u64,
        limit: u32,
        offset: u32,
    ) -> AppResult<(Vec<Attendance>, i64)>;
}
