//! Role-based access control.
//!
//! The evaluator answers "may role R use permission P" against the current
//! contents of the role/permission tables. It is fail-closed: anything it
//! cannot resolve is a denial, never an error that escapes.

use std::sync::Arc;

use strum::Display;
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult};
use crate::store::PermissionStore;

/// Permission codes checked by the HTTP handlers. Seeded by the initial migration.
pub mod codes {
    pub const VIEW_ATTENDANCE: &str = "VIEW_ATTENDANCE";
    pub const CREATE_ATTENDANCE: &str = "CREATE_ATTENDANCE";
    pub const MANAGE_ATTENDANCE: &str = "MANAGE_ATTENDANCE";
    pub const VIEW_USER: &str = "VIEW_USER";
    pub const MANAGE_USER: &str = "MANAGE_USER";
    pub const MANAGE_ROLE: &str = "MANAGE_ROLE";
    pub const VIEW_EMPLOYEE: &str = "VIEW_EMPLOYEE";
    pub const MANAGE_EMPLOYEE: &str = "MANAGE_EMPLOYEE";
    pub const VIEW_MASTER_DATA: &str = "VIEW_MASTER_DATA";
    pub const MANAGE_MASTER_DATA: &str = "MANAGE_MASTER_DATA";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DenyReason {
    /// The permission code resolves to nothing. A configuration error, still a denial.
    UnknownPermission,
    UnknownRole,
    InactiveRole,
    NotGranted,
    StoreUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn PermissionStore>,
}

impl AccessControl {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    pub async fn authorize(&self, role_id: u64, permission_code: &str) -> Decision {
        let decision = match self.evaluate(role_id, permission_code).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(error = %e, role_id, permission_code, "Permission lookup failed, denying");
                Decision::Deny(DenyReason::StoreUnavailable)
            }
        };

        match decision {
            Decision::Allow => debug!(role_id, permission_code, "Access granted"),
            Decision::Deny(reason) => {
                info!(role_id, permission_code, reason = %reason, "Access denied")
            }
        }

        decision
    }

    pub async fn is_allowed(&self, role_id: u64, permission_code: &str) -> bool {
        self.authorize(role_id, permission_code).await.is_allowed()
    }

    /// Guard for handlers: `Forbidden` unless the role holds the permission.
    pub async fn require(&self, role_id: u64, permission_code: &str) -> AppResult<()> {
        match self.authorize(role_id, permission_code).await {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::UnknownPermission) => {
                Err(AppError::forbidden("Permission not found"))
            }
            Decision::Deny(_) => Err(AppError::forbidden("Access denied")),
        }
    }

    async fn evaluate(&self, role_id: u64, permission_code: &str) -> AppResult<Decision> {
        let Some(permission) = self.store.find_permission_by_code(permission_code).await? else {
            return Ok(Decision::Deny(DenyReason::UnknownPermission));
        };

        match self.store.find_role(role_id).await? {
            None => return Ok(Decision::Deny(DenyReason::UnknownRole)),
            Some(role) if !role.is_active => return Ok(Decision::Deny(DenyReason::InactiveRole)),
            Some(_) => {}
        }

        if self.store.role_has_permission(role_id, permission.id).await? {
            Ok(Decision::Allow)
        } else {
            Ok(Decision::Deny(DenyReason::NotGranted))
        }
    }
}
