use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Permission {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "View attendance")]
    pub permission_name: String,
    /// Stable capability key checked by the access evaluator.
    #[schema(example = "VIEW_ATTENDANCE")]
    pub code: String,
}

/// One `(role_id, permission_id)` association. The pair is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RolePermission {
    #[schema(example = 2)]
    pub role_id: u64,
    #[schema(example = 1)]
    pub permission_id: u64,
}
