//! In-memory store backing the unit tests. Each operation takes the lock once,
//! so check-then-write steps are atomic just like the MySQL constraints.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{AttendanceStore, PermissionStore};
use crate::error::{AppError, AppResult};
use crate::model::{
    attendance::{Attendance, CheckOutUpdate, NewCheckIn},
    permission::{Permission, RolePermission},
    role::Role,
    status::Status,
};

#[derive(Default)]
struct Inner {
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    grants: Vec<RolePermission>,
    users: Vec<u64>,
    statuses: Vec<Status>,
    attendance: Vec<Attendance>,
    next_id: u64,
    unavailable: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn guard(&self) -> AppResult<MutexGuard<'_, Inner>> {
        let inner = self.lock();
        if inner.unavailable {
            return Err(AppError::internal("memory store marked unavailable"));
        }
        Ok(inner)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn add_role(&self, id: u64, code: &str, is_active: bool) {
        self.lock().roles.push(Role {
            id,
            role_name: code.to_lowercase(),
            code: code.to_string(),
            is_active,
        });
    }

    pub fn add_permission(&self, id: u64, code: &str) {
        self.lock().permissions.push(Permission {
            id,
            permission_name: code.to_lowercase(),
            code: code.to_string(),
        });
    }

    pub fn grant(&self, role_id: u64, permission_id: u64) {
        let mut inner = self.lock();
        let pair = RolePermission { role_id, permission_id };
        if !inner.grants.contains(&pair) {
            inner.grants.push(pair);
        }
    }

    pub fn add_user(&self, id: u64) {
        self.lock().users.push(id);
    }

    pub fn add_status(&self, id: u64, code: &str, is_active: bool) {
        self.lock().statuses.push(Status {
            id,
            status_name: code.to_lowercase(),
            code: code.to_string(),
            is_active,
        });
    }

    pub fn attendance_rows(&self) -> Vec<Attendance> {
        self.lock().attendance.clone()
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_role(&self, role_id: u64) -> AppResult<Option<Role>> {
        Ok(self.guard()?.roles.iter().find(|r| r.id == role_id).cloned())
    }

    async fn find_permission_by_code(&self, code: &str) -> AppResult<Option<Permission>> {
        Ok(self.guard()?.permissions.iter().find(|p| p.code == code).cloned())
    }

    async fn role_has_permission(&self, role_id: u64, permission_id: u64) -> AppResult<bool> {
        Ok(self
            .guard()?
            .grants
            .contains(&RolePermission { role_id, permission_id }))
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn user_exists(&self, user_id: u64) -> AppResult<bool> {
        Ok(self.guard()?.users.contains(&user_id))
    }

    async fn find_status(&self, status_id: u64) -> AppResult<Option<Status>> {
        Ok(self.guard()?.statuses.iter().find(|s| s.id == status_id).cloned())
    }

    async fn find_for_day(&self, user_id: u64, day: NaiveDate) -> AppResult<Option<Attendance>> {
        Ok(self
            .guard()?
            .attendance
            .iter()
            .find(|a| a.user_id == user_id && a.work_date == day)
            .cloned())
    }

    async fn insert_check_in(&self, new: &NewCheckIn) -> AppResult<Attendance> {
        let mut inner = self.guard()?;
        if inner
            .attendance
            .iter()
            .any(|a| a.user_id == new.user_id && a.work_date == new.work_date)
        {
            return Err(AppError::conflict("Already checked in today"));
        }

        inner.next_id += 1;
        let row = Attendance {
            id: inner.next_id,
            user_id: new.user_id,
            status_id: new.status_id,
            work_date: new.work_date,
            clock_in: new.clock_in,
            clock_in_photo: new.photo.clone(),
            latitude_clock_in: new.location.latitude,
            longitude_clock_in: new.location.longitude,
            clock_out: None,
            clock_out_photo: None,
            latitude_clock_out: None,
            longitude_clock_out: None,
            description: new.description.clone(),
            is_clocked_in: true,
            is_clocked_out: false,
            created_at: new.clock_in,
            updated_at: new.clock_in,
        };
        inner.attendance.push(row.clone());
        Ok(row)
    }

    async fn close_open_session(
        &self,
        user_id: u64,
        day: NaiveDate,
        update: &CheckOutUpdate,
    ) -> AppResult<Option<Attendance>> {
        let mut inner = self.guard()?;
        let Some(row) = inner
            .attendance
            .iter_mut()
            .find(|a| a.user_id == user_id && a.work_date == day && a.is_open())
        else {
            return Ok(None);
        };

        row.clock_out = Some(update.clock_out.max(row.clock_in));
        row.clock_out_photo = Some(update.photo.clone());
        row.latitude_clock_out = Some(update.location.latitude);
        row.longitude_clock_out = Some(update.location.longitude);
        if let Some(description) = &update.description {
            row.description = Some(description.clone());
        }
        if let Some(status_id) = update.status_id {
            row.status_id = status_id;
        }
        row.is_clocked_out = true;
        row.updated_at = update.clock_out;
        Ok(Some(row.clone()))
    }

    async fn list_for_user(
        &self,
        user_id: u64,
        limit: u32,
        offset: u32,
    ) -> AppResult<(Vec<Attendance>, i64)> {
        let inner = self.guard()?;
        let mut rows: Vec<Attendance> = inner
            .attendance
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.work_date.cmp(&a.work_date).then(b.id.cmp(&a.id)));
        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::Coordinates;
    use chrono::NaiveDateTime;

    fn new_check_in(user_id: u64, photo: &str) -> NewCheckIn {
        let clock_in =
            NaiveDateTime::parse_from_str("2026-10-18 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        NewCheckIn {
            user_id,
            status_id: 1,
            work_date: clock_in.date(),
            clock_in,
            photo: photo.into(),
            location: Coordinates::new(-6.2, 106.8).unwrap(),
            description: None,
        }
    }

    #[actix_web::test]
    async fn second_insert_for_the_same_day_is_a_conflict() {
        let store = MemoryStore::new();
        let first = store.insert_check_in(&new_check_in(7, "first.jpg")).await.unwrap();

        let err = store
            .insert_check_in(&new_check_in(7, "second.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert_eq!(store.attendance_rows(), vec![first]);
    }

    #[actix_web::test]
    async fn same_day_for_another_user_is_independent() {
        let store = MemoryStore::new();
        store.insert_check_in(&new_check_in(7, "a.jpg")).await.unwrap();
        store.insert_check_in(&new_check_in(8, "b.jpg")).await.unwrap();

        assert_eq!(store.attendance_rows().len(), 2);
    }
}
